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


//! Error types for BiliSub
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Every fallible operation in the crate returns [`Result<T>`], so callers always
//! get either a populated value or one inspectable [`BiliError`].
//!
//! ## Categories
//!
//! ### Construction
//! - `MissingCredentials` - one or more session tokens were empty
//! - `InvalidConfiguration` - header values or the HTTP client could not be built
//!
//! ### Input
//! - `InvalidIdentifierFormat` - a video id that is neither a valid BV nor av id
//! - `InvalidPageNumber` - page index outside `1..=pages`
//!
//! ### Remote
//! - `KeyFetchFailed` - the WBI key lookup (`/x/web-interface/nav`) failed
//! - `RemoteApiError` - the API answered with a non-zero `code`
//! - `Transport` - network failure, non-2xx status or an undecodable body
//! - `NoSubtitlesAvailable` - the part exists but carries no subtitle tracks

use thiserror::Error;

/// Result type alias using our BiliError type
pub type Result<T> = std::result::Result<T, BiliError>;

/// Main error type for BiliSub
#[derive(Error, Debug)]
pub enum BiliError {
    // ===== Construction Errors =====

    /// One or more credential tokens were empty; lists every missing cookie name
    #[error("All credentials are required. Missing: {}", .missing.join(", "))]
    MissingCredentials {
        missing: Vec<String>,
    },

    /// Client configuration is invalid or the HTTP client could not be built
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ===== Input Errors =====

    /// Malformed video identifier (bad prefix, length, alphabet or range)
    #[error("Invalid video identifier: {0}")]
    InvalidIdentifierFormat(String),

    /// Requested page is outside the video's part list
    #[error("Invalid page number {page} (video has {available} page(s))")]
    InvalidPageNumber {
        page: usize,
        available: usize,
    },

    // ===== Remote Errors =====

    /// The WBI signing keys could not be fetched
    #[error("Failed to fetch WBI signing keys: {0}")]
    KeyFetchFailed(String),

    /// API envelope carried a non-zero `code`
    #[error("API returned error {code}: {message}")]
    RemoteApiError {
        code: i64,
        message: String,
    },

    /// Network/HTTP-layer failure, including non-2xx status and malformed JSON
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status code if a response was received
        status_code: Option<u16>,
        /// URL that failed
        url: Option<String>,
    },

    /// The selected part has no subtitle tracks at all
    #[error("No subtitles available for this video part")]
    NoSubtitlesAvailable,
}

impl From<reqwest::Error> for BiliError {
    fn from(err: reqwest::Error) -> Self {
        BiliError::Transport {
            message: format!("HTTP client error: {}", err),
            status_code: err.status().map(|s| s.as_u16()),
            url: err.url().map(|u| u.to_string()),
        }
    }
}

impl From<serde_json::Error> for BiliError {
    fn from(err: serde_json::Error) -> Self {
        BiliError::transport(format!("JSON decode error: {}", err), None, None)
    }
}

// Helper methods for creating common errors
impl BiliError {
    /// Create a Transport error
    pub fn transport<S: Into<String>>(
        message: S,
        status_code: Option<u16>,
        url: Option<String>,
    ) -> Self {
        BiliError::Transport {
            message: message.into(),
            status_code,
            url,
        }
    }

    /// Create a RemoteApiError
    pub fn remote<S: Into<String>>(code: i64, message: S) -> Self {
        BiliError::RemoteApiError {
            code,
            message: message.into(),
        }
    }

    /// Create an InvalidIdentifierFormat error
    pub fn invalid_id<S: Into<String>>(message: S) -> Self {
        BiliError::InvalidIdentifierFormat(message.into())
    }

    /// Check if a caller-side retry could plausibly succeed
    ///
    /// Nothing in this crate retries on its own. A retry of a signed call must
    /// re-sign, since `wts` is part of the signature.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BiliError::KeyFetchFailed(_)
                | BiliError::Transport { status_code: None, .. }
                | BiliError::Transport { status_code: Some(500..=599), .. }
                | BiliError::Transport { status_code: Some(429), .. }
        )
    }

    /// Check if error means the session cookies are missing or rejected
    ///
    /// `-101` is "not logged in", `-111` is a csrf mismatch.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            BiliError::MissingCredentials { .. }
                | BiliError::RemoteApiError { code: -101, .. }
                | BiliError::RemoteApiError { code: -111, .. }
                | BiliError::Transport { status_code: Some(401), .. }
                | BiliError::Transport { status_code: Some(403), .. }
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            BiliError::MissingCredentials { missing } => {
                format!(
                    "Missing credentials: {}. Copy them from the bilibili.com cookies in your browser.",
                    missing.join(", ")
                )
            }
            BiliError::RemoteApiError { code: -101, .. } => {
                "Your session is not logged in. Please refresh SESSDATA and try again.".to_string()
            }
            BiliError::RemoteApiError { code: -404, .. } => {
                "The video does not exist or is not visible to this account.".to_string()
            }
            BiliError::InvalidPageNumber { page, available } => {
                format!("Page {} does not exist; this video has {} page(s).", page, available)
            }
            BiliError::NoSubtitlesAvailable => {
                "This video part has no subtitles.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_lists_all_names() {
        let err = BiliError::MissingCredentials {
            missing: vec!["SESSDATA".to_string(), "buvid3".to_string()],
        };
        assert_eq!(err.to_string(), "All credentials are required. Missing: SESSDATA, buvid3");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BiliError::KeyFetchFailed("timeout".into()).is_retryable());
        assert!(BiliError::transport("reset", None, None).is_retryable());
        assert!(BiliError::transport("bad gateway", Some(502), None).is_retryable());
        assert!(!BiliError::transport("not found", Some(404), None).is_retryable());
        assert!(!BiliError::remote(-400, "bad request").is_retryable());
        assert!(!BiliError::NoSubtitlesAvailable.is_retryable());
    }

    #[test]
    fn test_auth_classification() {
        assert!(BiliError::remote(-101, "账号未登录").is_auth_error());
        assert!(BiliError::MissingCredentials { missing: vec![] }.is_auth_error());
        assert!(!BiliError::remote(-404, "啥都木有").is_auth_error());
    }

    #[test]
    fn test_user_message_for_page_error() {
        let err = BiliError::InvalidPageNumber { page: 4, available: 2 };
        assert_eq!(err.user_message(), "Page 4 does not exist; this video has 2 page(s).");
    }

    #[test]
    fn test_serde_error_maps_to_transport() {
        let err: BiliError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, BiliError::Transport { status_code: None, .. }));
    }
}
