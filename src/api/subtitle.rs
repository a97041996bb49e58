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


//! Subtitle download and flattening
//!
//! Subtitle files are JSON documents on the CDN:
//!
//! ```json
//! { "font_size": 0.4, "body": [ { "from": 0.5, "to": 2.1, "location": 2, "content": "…" } ] }
//! ```
//!
//! [`BiliClient::get_subtitle_text`] chains the whole lookup: part list ->
//! cid -> player info -> track selection -> download -> flattened text.

use crate::api::client::{check_code, BiliClient, Transport};
use crate::api::player::SubtitleTrack;
use crate::codec::VideoId;
use crate::error::{BiliError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One timed line of a subtitle track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleFragment {
    /// Start, seconds
    #[serde(default)]
    pub from: f64,
    /// End, seconds
    #[serde(default)]
    pub to: f64,
    #[serde(default)]
    pub location: i64,
    #[serde(default)]
    pub content: String,
}

/// Make a subtitle URL absolute
///
/// `//host/path` gets `https:`, `/path` is resolved against the API base.
pub fn normalize_subtitle_url(url: &str, api_base: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else if url.starts_with('/') {
        format!("{}{}", api_base.trim_end_matches('/'), url)
    } else {
        url.to_string()
    }
}

/// Trim every fragment and join the non-empty ones with newlines
pub fn flatten_fragments(fragments: &[SubtitleFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.content.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First track whose language tag contains `lang`, else the first track
///
/// Matching is a case-sensitive substring test, so `zh` matches `ai-zh`
/// and `zh-CN`.
pub fn select_track<'a>(tracks: &'a [SubtitleTrack], lang: &str) -> Option<&'a SubtitleTrack> {
    tracks
        .iter()
        .find(|track| track.lan.contains(lang))
        .or_else(|| tracks.first())
}

/// Render fragments as SubRip
pub fn to_srt(fragments: &[SubtitleFragment]) -> String {
    let mut output = String::new();
    let mut counter = 1;

    for fragment in fragments {
        let text = fragment.content.trim();
        if text.is_empty() {
            continue;
        }
        output.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            counter,
            format_timestamp(fragment.from),
            format_timestamp(fragment.to),
            text
        ));
        counter += 1;
    }
    output
}

/// Seconds to `HH:MM:SS,mmm`
fn format_timestamp(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let secs = ms / 1000;
    let minutes = secs / 60;
    let hours = minutes / 60;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes % 60, secs % 60, ms % 1000)
}

fn take_body(body: &mut Value) -> Result<Value> {
    check_code(body)?;
    body.get_mut("body")
        .map(Value::take)
        .ok_or_else(|| BiliError::transport("Subtitle file has no body array", None, None))
}

fn parse_fragments(mut body: Value) -> Result<Vec<SubtitleFragment>> {
    let fragments = take_body(&mut body)?;
    serde_json::from_value(fragments)
        .map_err(|e| BiliError::transport(format!("Failed to parse subtitle body: {}", e), None, None))
}

/// `content` of every body item that has one; items without it are skipped
fn content_lines(mut body: Value) -> Result<Vec<String>> {
    let items = take_body(&mut body)?;
    let items = items
        .as_array()
        .ok_or_else(|| BiliError::transport("Subtitle body is not an array", None, None))?;

    Ok(items
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

impl<T: Transport> BiliClient<T> {
    /// Download a subtitle file and return its timed fragments
    pub async fn download_subtitle_body(&self, url: &str) -> Result<Vec<SubtitleFragment>> {
        let url = normalize_subtitle_url(url, &self.config().api_base);
        let body = self.get_raw(&url).await?;
        parse_fragments(body)
    }

    /// Download a subtitle file and join every line's text
    pub async fn get_subtitle_content(&self, url: &str) -> Result<String> {
        let url = normalize_subtitle_url(url, &self.config().api_base);
        let body = self.get_raw(&url).await?;
        let joined = content_lines(body)?.join("\n");
        Ok(joined.trim().to_string())
    }

    /// Resolve `page` (1-based) of `id` to its cid and pick a subtitle track
    pub async fn find_subtitle_track(&self, id: &VideoId, page: usize, lang: &str) -> Result<SubtitleTrack> {
        let pages = self.get_video_pages(id).await?;
        if page == 0 || page > pages.len() {
            return Err(BiliError::InvalidPageNumber {
                page,
                available: pages.len(),
            });
        }
        let cid = pages[page - 1].cid;

        let tracks = self.get_subtitle_tracks(id, cid).await?;
        let track = select_track(&tracks, lang).ok_or(BiliError::NoSubtitlesAvailable)?;

        if !track.lan.contains(lang) {
            log::info!(
                "No '{}' subtitles for {} page {}; using {} ({})",
                lang,
                id,
                page,
                track.lan_doc,
                track.lan
            );
        }
        if track.subtitle_url.is_empty() {
            return Err(BiliError::NoSubtitlesAvailable);
        }
        Ok(track.clone())
    }

    /// Timed fragments for `page` of `id` in `lang` (or the first track)
    pub async fn get_subtitle_fragments(
        &self,
        id: &VideoId,
        page: usize,
        lang: &str,
    ) -> Result<Vec<SubtitleFragment>> {
        let track = self.find_subtitle_track(id, page, lang).await?;
        self.download_subtitle_body(&track.subtitle_url).await
    }

    /// Full subtitle text for `page` of `id`
    ///
    /// # Errors
    /// - `InvalidPageNumber` - `page` outside `1..=pages`
    /// - `NoSubtitlesAvailable` - no tracks, or the chosen track is empty
    /// - any error from the underlying lookups, unchanged
    pub async fn get_subtitle_text(&self, id: &VideoId, page: usize, lang: &str) -> Result<String> {
        let fragments = self.get_subtitle_fragments(id, page, lang).await?;
        let text = flatten_fragments(&fragments);
        if text.is_empty() {
            return Err(BiliError::NoSubtitlesAvailable);
        }
        Ok(text)
    }
}
