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


//! Bilibili web API client
//!
//! # Endpoints
//! - `/x/web-interface/nav` - WBI key distribution
//! - `/x/web-interface/view` - video info (signed)
//! - `/x/player/pagelist` - part list
//! - `/x/player/wbi/v2` - player info with subtitle links (signed)
//! - `/x/player/v2` - player info fallback
//! - subtitle files on the CDN, linked from player info

pub mod auth;
pub mod client;
pub mod player;
pub mod subtitle;
pub mod video;

// Re-export commonly used types
pub use auth::{CredentialStatus, Credentials};
pub use client::{BiliClient, ClientConfig, HttpTransport, Transport};
pub use player::{PlayerInfo, SubtitleTrack};
pub use subtitle::SubtitleFragment;
pub use video::{PageDescriptor, VideoInfo};
