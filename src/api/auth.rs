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


//! Session credentials
//!
//! Subtitle links are only returned to logged-in sessions, so every client is
//! built from the three browser cookies below. They are copied by hand from
//! the browser's cookie storage for `bilibili.com`:
//!
//! | Cookie     | Meaning                       |
//! |------------|-------------------------------|
//! | `SESSDATA` | session token                 |
//! | `bili_jct` | csrf token                    |
//! | `buvid3`   | device token                  |
//!
//! A [`Credentials`] value is immutable once built and can be shared freely
//! between concurrent calls.

use crate::error::{BiliError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const SESSDATA: &str = "SESSDATA";
pub const BILI_JCT: &str = "bili_jct";
pub const BUVID3: &str = "buvid3";

/// The three session cookies, validated non-empty
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    sessdata: String,
    bili_jct: String,
    buvid3: String,
}

impl Credentials {
    /// Validate and store the three tokens
    ///
    /// # Errors
    /// `MissingCredentials` naming every empty token, in cookie order
    pub fn new<S: Into<String>>(sessdata: S, bili_jct: S, buvid3: S) -> Result<Self> {
        let sessdata = sessdata.into();
        let bili_jct = bili_jct.into();
        let buvid3 = buvid3.into();

        let missing: Vec<String> = [(SESSDATA, &sessdata), (BILI_JCT, &bili_jct), (BUVID3, &buvid3)]
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(BiliError::MissingCredentials { missing });
        }

        Ok(Self {
            sessdata,
            bili_jct,
            buvid3,
        })
    }

    /// Same as [`Credentials::new`] but treats `None` as empty
    pub fn from_options(
        sessdata: Option<String>,
        bili_jct: Option<String>,
        buvid3: Option<String>,
    ) -> Result<Self> {
        Self::new(
            sessdata.unwrap_or_default(),
            bili_jct.unwrap_or_default(),
            buvid3.unwrap_or_default(),
        )
    }

    pub fn sessdata(&self) -> &str {
        &self.sessdata
    }

    pub fn bili_jct(&self) -> &str {
        &self.bili_jct
    }

    pub fn buvid3(&self) -> &str {
        &self.buvid3
    }

    /// Render as a `Cookie` header value
    pub fn cookie_header(&self) -> String {
        format!(
            "{}={}; {}={}; {}={}",
            SESSDATA, self.sessdata, BILI_JCT, self.bili_jct, BUVID3, self.buvid3
        )
    }

    /// Cookie name -> masked value, safe to print
    pub fn masked_cookies(&self) -> BTreeMap<String, String> {
        [
            (SESSDATA, &self.sessdata),
            (BILI_JCT, &self.bili_jct),
            (BUVID3, &self.buvid3),
        ]
        .iter()
        .map(|(name, value)| (name.to_string(), mask(value)))
        .collect()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("sessdata", &mask(&self.sessdata))
            .field("bili_jct", &mask(&self.bili_jct))
            .field("buvid3", &mask(&self.buvid3))
            .finish()
    }
}

/// Summary of what the configured credentials allow
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub has_credentials: bool,
    pub can_access_subtitles: bool,
    /// Masked cookie values
    pub cookies: BTreeMap<String, String>,
}

impl CredentialStatus {
    pub fn for_credentials(credentials: &Credentials) -> Self {
        // Construction already guarantees all three tokens
        Self {
            has_credentials: true,
            can_access_subtitles: true,
            cookies: credentials.masked_cookies(),
        }
    }
}

/// Mask a string for safe logging
///
/// Shows first 2 and last 2 characters, replaces middle with asterisks
fn mask(s: &str) -> String {
    if s.is_empty() {
        "[empty]".to_string()
    } else if s.chars().count() <= 4 {
        "****".to_string()
    } else {
        let chars: Vec<char> = s.chars().collect();
        let first_two: String = chars.iter().take(2).collect();
        let last_two: String = chars.iter().skip(chars.len() - 2).collect();
        format!("{}{}{}", first_two, "*".repeat(chars.len() - 4), last_two)
    }
}
