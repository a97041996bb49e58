// BiliSub - Bilibili metadata and subtitle client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Video metadata API
//!
//! # API Endpoints
//! - `GET /x/web-interface/view?bvid=…` (WBI signed) - title, owner, stats, parts
//! - `GET /x/player/pagelist?bvid=…` (unsigned) - part list only

use crate::api::client::{endpoints, BiliClient, Transport};
use crate::codec::VideoId;
use crate::error::{BiliError, Result};
use crate::wbi::ParamSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uploader of a video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub mid: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub face: String,
}

/// Public counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    #[serde(default)]
    pub view: u64,
    #[serde(default)]
    pub danmaku: u64,
    #[serde(default)]
    pub reply: u64,
    #[serde(default)]
    pub favorite: u64,
    #[serde(default)]
    pub coin: u64,
    #[serde(default)]
    pub share: u64,
    #[serde(default)]
    pub like: u64,
}

/// One part of a multi-part video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// Content id addressing this part's streams and subtitles
    pub cid: u64,
    /// 1-based part number
    #[serde(default)]
    pub page: u32,
    /// Part title
    #[serde(default)]
    pub part: String,
    /// Seconds
    #[serde(default)]
    pub duration: u64,
}

/// Video metadata from the view endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub aid: u64,
    pub bvid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    /// Total seconds across all parts
    #[serde(default)]
    pub duration: u64,
    /// Unix seconds
    #[serde(default)]
    pub pubdate: i64,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub stat: Stat,
    #[serde(default)]
    pub pages: Vec<PageDescriptor>,
}

impl VideoInfo {
    /// Publish time as a UTC timestamp
    pub fn published_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.pubdate, 0)
    }
}

impl<T: Transport> BiliClient<T> {
    /// Get video metadata
    ///
    /// Makes a WBI-signed request to `/x/web-interface/view` keyed by bvid.
    ///
    /// # Errors
    /// - `InvalidIdentifierFormat` - `id` does not normalize
    /// - `KeyFetchFailed` - signing keys unavailable
    /// - `RemoteApiError` - non-zero API code (e.g. `-404` for a missing video)
    /// - `Transport` - network, status or decoding failure
    pub async fn get_video_info(&self, id: &VideoId) -> Result<VideoInfo> {
        let (_, bvid) = id.normalize()?;

        let mut params = ParamSet::new();
        params.insert("bvid".to_string(), bvid);

        let data = self.get_data(endpoints::VIEW, params, true).await?;
        parse_data(data, "video info")
    }

    /// Get the part list of a video
    ///
    /// `/x/player/pagelist` does not require signing.
    pub async fn get_video_pages(&self, id: &VideoId) -> Result<Vec<PageDescriptor>> {
        let (_, bvid) = id.normalize()?;

        let mut params = ParamSet::new();
        params.insert("bvid".to_string(), bvid);

        let data = self.get_data(endpoints::PAGE_LIST, params, false).await?;
        parse_data(data, "page list")
    }
}

/// Deserialize a `data` payload, reporting failures as transport errors
pub(crate) fn parse_data<D: DeserializeOwned>(data: Value, what: &str) -> Result<D> {
    serde_json::from_value(data)
        .map_err(|e| BiliError::transport(format!("Failed to parse {}: {}", what, e), None, None))
}
