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


//! Player info API (subtitle track links)
//!
//! # Lookup Strategy
//! 1. `GET /x/player/wbi/v2?bvid=…&cid=…` (WBI signed), which returns the
//!    complete subtitle list for logged-in sessions
//! 2. On any failure of step 1, exactly one `GET /x/player/v2?aid=…&cid=…`
//!    (unsigned). Its outcome is final; the first error is only logged.

use crate::api::client::{endpoints, BiliClient, Transport};
use crate::api::video::parse_data;
use crate::codec::VideoId;
use crate::error::Result;
use crate::wbi::ParamSet;
use serde::{Deserialize, Serialize};

/// One subtitle track advertised by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    #[serde(default)]
    pub id: i64,
    /// Language tag, e.g. `zh-CN`, `ai-zh`, `en-US`
    #[serde(default)]
    pub lan: String,
    /// Human-readable language label
    #[serde(default)]
    pub lan_doc: String,
    /// Content URL, usually protocol-relative (`//aisubtitle.hdslb.com/…`)
    #[serde(default)]
    pub subtitle_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleInfo {
    #[serde(default)]
    pub allow_submit: bool,
    #[serde(default)]
    pub subtitles: Vec<SubtitleTrack>,
}

/// Player metadata for one part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    #[serde(default)]
    pub aid: u64,
    #[serde(default)]
    pub bvid: String,
    #[serde(default)]
    pub cid: u64,
    #[serde(default)]
    pub subtitle: SubtitleInfo,
}

impl<T: Transport> BiliClient<T> {
    /// Get player info for one part, falling back to the unsigned endpoint
    ///
    /// # Errors
    /// - `InvalidIdentifierFormat` - `id` does not normalize (no request is made)
    /// - otherwise the fallback request's error, if both attempts fail
    pub async fn get_player_info(&self, id: &VideoId, cid: u64) -> Result<PlayerInfo> {
        let (aid, bvid) = id.normalize()?;

        match self.get_player_info_signed(&bvid, cid).await {
            Ok(info) => Ok(info),
            Err(e) => {
                log::warn!("WBI player info failed for {} cid {}: {}; trying fallback", bvid, cid, e);
                self.get_player_info_fallback(aid, cid).await
            }
        }
    }

    async fn get_player_info_signed(&self, bvid: &str, cid: u64) -> Result<PlayerInfo> {
        let mut params = ParamSet::new();
        params.insert("bvid".to_string(), bvid.to_string());
        params.insert("cid".to_string(), cid.to_string());

        let data = self.get_data(endpoints::PLAYER_WBI, params, true).await?;
        parse_data(data, "player info")
    }

    async fn get_player_info_fallback(&self, aid: u64, cid: u64) -> Result<PlayerInfo> {
        let mut params = ParamSet::new();
        params.insert("aid".to_string(), aid.to_string());
        params.insert("cid".to_string(), cid.to_string());

        let data = self.get_data(endpoints::PLAYER, params, false).await?;
        parse_data(data, "player info")
    }

    /// Subtitle tracks for one part; empty when the part has none
    pub async fn get_subtitle_tracks(&self, id: &VideoId, cid: u64) -> Result<Vec<SubtitleTrack>> {
        let info = self.get_player_info(id, cid).await?;
        Ok(info.subtitle.subtitles)
    }
}
