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


//! WBI request signing
//!
//! Several web endpoints (`/x/web-interface/view`, `/x/player/wbi/v2`) reject
//! requests that do not carry a `wts`/`w_rid` pair. The signature is computed
//! from two opaque key fragments published by the nav endpoint.
//!
//! # Signing steps
//! 1. `GET /x/web-interface/nav` and take the file stems of
//!    `data.wbi_img.img_url` and `data.wbi_img.sub_url`
//! 2. Permute `img_key + sub_key` through [`MIXIN_KEY_ENC_TAB`] and keep the
//!    first 32 characters (the mixin key)
//! 3. Add `wts` (unix seconds), sort by key, strip `!'()*` from every value
//! 4. `w_rid = md5(query_string + mixin_key)` as lowercase hex
//!
//! The nav endpoint answers `-101` when the session is not logged in but still
//! includes `wbi_img`; the envelope code is not checked there.

use crate::api::client::Transport;
use crate::error::{BiliError, Result};
use md5::{Digest, Md5};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// Ordered request parameters; iteration order is the canonical key order
pub type ParamSet = BTreeMap<String, String>;

/// Key mixing permutation, each entry is a source index into `img_key + sub_key`
pub const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25,
    54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

const MIXIN_KEY_LEN: usize = 32;

/// Characters removed from every value before signing
const STRIPPED_CHARS: [char; 5] = ['!', '\'', '(', ')', '*'];

/// The two server-issued key fragments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbiKeys {
    pub img_key: String,
    pub sub_key: String,
}

impl WbiKeys {
    pub fn new<S: Into<String>>(img_key: S, sub_key: S) -> Self {
        Self {
            img_key: img_key.into(),
            sub_key: sub_key.into(),
        }
    }

    /// Build keys from the two nav URLs, e.g.
    /// `https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png`
    pub fn from_urls(img_url: &str, sub_url: &str) -> Result<Self> {
        Ok(Self {
            img_key: key_from_url(img_url)?,
            sub_key: key_from_url(sub_url)?,
        })
    }

    /// Extract keys from a nav response body
    pub fn from_nav_response(body: &Value) -> Result<Self> {
        let wbi_img = body
            .get("data")
            .and_then(|d| d.get("wbi_img"))
            .ok_or_else(|| BiliError::KeyFetchFailed("nav response has no data.wbi_img".to_string()))?;

        let field = |name: &str| {
            wbi_img
                .get(name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| BiliError::KeyFetchFailed(format!("nav response has no wbi_img.{}", name)))
        };

        Self::from_urls(field("img_url")?, field("sub_url")?)
    }

    /// Derive the 32-character mixin key
    pub fn mixin_key(&self) -> Result<String> {
        let orig: Vec<char> = self.img_key.chars().chain(self.sub_key.chars()).collect();
        if orig.len() < MIXIN_KEY_ENC_TAB.len() {
            return Err(BiliError::KeyFetchFailed(format!(
                "key fragments are too short ({} chars, need {})",
                orig.len(),
                MIXIN_KEY_ENC_TAB.len()
            )));
        }

        Ok(MIXIN_KEY_ENC_TAB
            .iter()
            .take(MIXIN_KEY_LEN)
            .map(|&i| orig[i])
            .collect())
    }
}

/// File stem of the last path segment: `/bfs/wbi/abc.png` -> `abc`
fn key_from_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)
        .map_err(|e| BiliError::KeyFetchFailed(format!("invalid key URL '{}': {}", raw, e)))?;

    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();

    if stem.is_empty() {
        return Err(BiliError::KeyFetchFailed(format!("key URL '{}' has no file name", raw)));
    }
    Ok(stem.to_string())
}

/// Strip the reserved characters from every value; keys are already ordered
pub fn canonicalize(params: ParamSet) -> ParamSet {
    params
        .into_iter()
        .map(|(k, v)| {
            let cleaned: String = v.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
            (k, cleaned)
        })
        .collect()
}

/// Form-encode parameters in key order (`+` for spaces, uppercase escapes)
pub fn encode_query(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", form_encode(k), form_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn form_encode(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

/// Sign `params` with fixed keys and timestamp
///
/// Returns the canonicalized parameters plus `wts` and `w_rid`.
pub fn sign_with_keys(mut params: ParamSet, keys: &WbiKeys, wts: i64) -> Result<ParamSet> {
    let mixin_key = keys.mixin_key()?;

    params.insert("wts".to_string(), wts.to_string());
    let mut params = canonicalize(params);

    let query = encode_query(&params);
    let mut hasher = Md5::new();
    hasher.update(query.as_bytes());
    hasher.update(mixin_key.as_bytes());
    let w_rid = hex::encode(hasher.finalize());

    params.insert("w_rid".to_string(), w_rid);
    Ok(params)
}

/// Fetches WBI keys and signs parameter sets
///
/// With `cache_ttl == None` every signature triggers a fresh key lookup.
#[derive(Debug)]
pub struct WbiSigner {
    nav_url: String,
    cache_ttl: Option<Duration>,
    cached: Mutex<Option<(WbiKeys, Instant)>>,
}

impl WbiSigner {
    pub fn new(nav_url: String, cache_ttl: Option<Duration>) -> Self {
        Self {
            nav_url,
            cache_ttl,
            cached: Mutex::new(None),
        }
    }

    /// Current keys, from the cache when it is enabled and fresh
    pub async fn keys<T: Transport + ?Sized>(&self, transport: &T) -> Result<WbiKeys> {
        if let Some(ttl) = self.cache_ttl {
            let cached = self.cached.lock().await;
            if let Some((keys, fetched_at)) = cached.as_ref() {
                if fetched_at.elapsed() < ttl {
                    log::debug!("Using cached WBI keys");
                    return Ok(keys.clone());
                }
            }
        }

        log::debug!("Fetching WBI keys from {}", self.nav_url);
        let fetched = match transport.get_json(&self.nav_url, &[]).await {
            Ok(body) => WbiKeys::from_nav_response(&body),
            Err(e) => Err(BiliError::KeyFetchFailed(e.to_string())),
        };

        match fetched {
            Ok(keys) => {
                if self.cache_ttl.is_some() {
                    *self.cached.lock().await = Some((keys.clone(), Instant::now()));
                }
                Ok(keys)
            }
            Err(e) => {
                self.invalidate().await;
                Err(e)
            }
        }
    }

    /// Fetch keys and sign `params` with the current unix time
    pub async fn sign<T: Transport + ?Sized>(&self, transport: &T, params: ParamSet) -> Result<ParamSet> {
        let keys = self.keys(transport).await?;
        sign_with_keys(params, &keys, chrono::Utc::now().timestamp())
    }

    /// Drop cached keys so the next signature re-fetches
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMG_KEY: &str = "7cd084941338484aae1ad9425b84077c";
    const SUB_KEY: &str = "4932caff0ff746eab6f01bf08b70ac45";
    const WTS: i64 = 1702204169;

    fn keys() -> WbiKeys {
        WbiKeys::new(IMG_KEY, SUB_KEY)
    }

    fn params(pairs: &[(&str, &str)]) -> ParamSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mixin_key() {
        assert_eq!(keys().mixin_key().unwrap(), "ea1db124af3c7062474693fa704f4ff8");
    }

    #[test]
    fn test_mixin_key_rejects_short_fragments() {
        let short = WbiKeys::new("abc", "def");
        assert!(matches!(short.mixin_key(), Err(BiliError::KeyFetchFailed(_))));
    }

    #[test]
    fn test_permutation_table_is_a_permutation() {
        let mut seen = [false; 64];
        for &i in MIXIN_KEY_ENC_TAB.iter() {
            assert!(!seen[i], "index {} appears twice", i);
            seen[i] = true;
        }
    }

    #[test]
    fn test_known_signature() {
        let signed = sign_with_keys(
            params(&[("foo", "114"), ("bar", "514"), ("zab", "1919810")]),
            &keys(),
            WTS,
        )
        .unwrap();

        assert_eq!(signed["wts"], "1702204169");
        assert_eq!(signed["w_rid"], "8f6f2b5b3d485fe1886cec6a0be8c5d4");
    }

    #[test]
    fn test_signature_for_player_request() {
        let signed = sign_with_keys(
            params(&[("bvid", "BV1GJ411x7h7"), ("cid", "137649199")]),
            &keys(),
            WTS,
        )
        .unwrap();
        assert_eq!(signed["w_rid"], "ac2d84becc68af33a093efe5f45b2f96");
    }

    #[test]
    fn test_canonicalization_orders_and_strips() {
        let signed = sign_with_keys(params(&[("b", "x"), ("a", "y!z")]), &keys(), WTS).unwrap();

        let order: Vec<&str> = signed.keys().map(|k| k.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "w_rid", "wts"]);
        assert_eq!(signed["a"], "yz");
        assert_eq!(signed["w_rid"], "c731997e8cde32fd6af4a170bfdbf804");
    }

    #[test]
    fn test_spaces_and_reserved_characters() {
        let signed = sign_with_keys(params(&[("q", "hello world~(x)")]), &keys(), WTS).unwrap();
        assert_eq!(signed["q"], "hello world~x");
        assert_eq!(signed["w_rid"], "2f7703a4d2060756f7a289957cbba1a1");
    }

    #[test]
    fn test_signature_is_deterministic_and_sensitive() {
        let a = sign_with_keys(params(&[("bvid", "BV1GJ411x7h7")]), &keys(), WTS).unwrap();
        let b = sign_with_keys(params(&[("bvid", "BV1GJ411x7h7")]), &keys(), WTS).unwrap();
        let c = sign_with_keys(params(&[("bvid", "BV1GJ411x7h8")]), &keys(), WTS).unwrap();
        let d = sign_with_keys(params(&[("bvid", "BV1GJ411x7h7")]), &keys(), WTS + 1).unwrap();

        assert_eq!(a["w_rid"], b["w_rid"]);
        assert_ne!(a["w_rid"], c["w_rid"]);
        assert_ne!(a["w_rid"], d["w_rid"]);
    }

    #[test]
    fn test_encode_query() {
        let p = params(&[("q", "a b/é"), ("k", "v")]);
        assert_eq!(encode_query(&p), "k=v&q=a+b%2F%C3%A9");
    }

    #[test]
    fn test_key_from_url() {
        assert_eq!(
            key_from_url("https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png").unwrap(),
            IMG_KEY
        );
        assert!(key_from_url("not a url").is_err());
        assert!(key_from_url("https://i0.hdslb.com/").is_err());
    }

    #[test]
    fn test_keys_from_nav_response() {
        let body = serde_json::json!({
            "code": -101,
            "message": "账号未登录",
            "data": {
                "isLogin": false,
                "wbi_img": {
                    "img_url": "https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png",
                    "sub_url": "https://i0.hdslb.com/bfs/wbi/4932caff0ff746eab6f01bf08b70ac45.png"
                }
            }
        });
        assert_eq!(WbiKeys::from_nav_response(&body).unwrap(), keys());
    }

    #[test]
    fn test_nav_response_without_keys() {
        let body = serde_json::json!({ "code": 0, "data": {} });
        assert!(matches!(
            WbiKeys::from_nav_response(&body),
            Err(BiliError::KeyFetchFailed(_))
        ));
    }
}
