//! Bilibili video metadata and subtitle client
//!
//! - [`codec`] converts between av and BV video ids
//! - [`wbi`] signs request parameters for WBI-protected endpoints
//! - [`api`] wraps the web API behind [`api::BiliClient`]

pub mod api;
pub mod codec;
pub mod error;
pub mod wbi;

pub use api::{BiliClient, ClientConfig, Credentials};
pub use codec::{aid_to_bvid, bvid_to_aid, VideoId};
pub use error::{BiliError, Result};
