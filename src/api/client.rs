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


//! HTTP client for the Bilibili web API
//!
//! # Architecture
//!
//! ## Client Structure
//! [`BiliClient`] owns:
//! - the validated [`Credentials`], sent as a `Cookie` header on every request
//! - a [`ClientConfig`] (timeout, browser header set, API base URL)
//! - a [`WbiSigner`] for the endpoints that require `wts`/`w_rid`
//! - a [`Transport`] that performs the actual GET and JSON decoding
//!
//! The default transport is [`HttpTransport`], one pooled `reqwest::Client`.
//! Tests swap in a scripted transport.
//!
//! ## Response Envelope
//! API responses look like `{"code": 0, "message": "0", "data": ...}`.
//! `code != 0` becomes [`BiliError::RemoteApiError`]. Subtitle files served
//! from the CDN have no envelope and are read raw.
//!
//! ## Retries
//! None. Every failure goes straight back to the caller; a caller that retries
//! a signed call gets a fresh signature because signing happens per call.

use crate::api::auth::{CredentialStatus, Credentials};
use crate::error::{BiliError, Result};
use crate::wbi::{ParamSet, WbiSigner};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_API_BASE: &str = "https://api.bilibili.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://www.bilibili.com/";

/// Endpoint paths relative to the API base
pub mod endpoints {
    /// WBI key distribution (unsigned)
    pub const NAV: &str = "/x/web-interface/nav";
    /// Video info (signed, `bvid`)
    pub const VIEW: &str = "/x/web-interface/view";
    /// Part list (unsigned, `bvid`)
    pub const PAGE_LIST: &str = "/x/player/pagelist";
    /// Player info with subtitle links (signed, `bvid` + `cid`)
    pub const PLAYER_WBI: &str = "/x/player/wbi/v2";
    /// Player info fallback (unsigned, `aid` + `cid`)
    pub const PLAYER: &str = "/x/player/v2";
}

/// Browser-emulation headers sent with every request
///
/// `user-agent` and `referer` are configured separately.
const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"),
    ("accept-language", "zh-CN,zh;q=0.9"),
    ("cache-control", "no-cache"),
    ("dnt", "1"),
    ("pragma", "no-cache"),
    ("sec-ch-ua", "\"Not A(Brand\";v=\"99\", \"Google Chrome\";v=\"121\", \"Chromium\";v=\"121\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
];

/// Configuration for BiliClient
/// Provides a builder pattern for client customization
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub referer: String,
    pub api_base: String,
    pub extra_headers: Vec<(String, String)>,
    /// Reuse WBI keys for this long; `None` fetches them for every signed call
    pub key_cache_ttl: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            extra_headers: BROWSER_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            key_cache_ttl: None,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Absolute URL for an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn referer<S: Into<String>>(mut self, referer: S) -> Self {
        self.config.referer = referer.into();
        self
    }

    pub fn api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.config.api_base = api_base.into();
        self
    }

    /// Add or replace one browser-emulation header
    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        let name = name.into();
        self.config
            .extra_headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.config.extra_headers.push((name, value.into()));
        self
    }

    pub fn key_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.config.key_cache_ttl = ttl;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// One GET request returning decoded JSON
///
/// Implementations must map network failures, non-2xx statuses and
/// undecodable bodies to [`BiliError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value>;
}

/// reqwest-backed transport with a pooled connection set
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the underlying client with headers, cookies and timeout baked in
    pub fn new(config: &ClientConfig, credentials: &Credentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                BiliError::InvalidConfiguration(format!("Invalid header name '{}': {}", name, e))
            })?;
            headers.insert(name, header_value(value, "header")?);
        }
        headers.insert(USER_AGENT, header_value(&config.user_agent, "user agent")?);
        headers.insert(REFERER, header_value(&config.referer, "referer")?);

        let mut cookie = header_value(&credentials.cookie_header(), "cookie")?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| BiliError::InvalidConfiguration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| BiliError::InvalidConfiguration(format!("Invalid {}: {}", what, e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| BiliError::transport(format!("Request failed: {}", e), None, Some(url.to_string())))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let snippet: String = error_body.chars().take(200).collect();
            return Err(BiliError::transport(
                format!("HTTP {}: {}", status.as_u16(), snippet),
                Some(status.as_u16()),
                Some(final_url),
            ));
        }

        let text = response.text().await.map_err(|e| {
            BiliError::transport(
                format!("Failed to read response body: {}", e),
                Some(status.as_u16()),
                Some(final_url.clone()),
            )
        })?;

        serde_json::from_str(&text).map_err(|e| {
            let snippet: String = text.chars().take(200).collect();
            BiliError::transport(
                format!("Malformed JSON at line {} col {}: {}. Body: {}", e.line(), e.column(), e, snippet),
                Some(status.as_u16()),
                Some(final_url),
            )
        })
    }
}

/// Main client for the Bilibili web API
///
/// Operations live in [`crate::api::video`], [`crate::api::player`] and
/// [`crate::api::subtitle`].
///
/// # Example
/// ```rust,no_run
/// use bilisub_core::api::{BiliClient, Credentials};
/// use bilisub_core::codec::VideoId;
///
/// # async fn example() -> bilisub_core::error::Result<()> {
/// let credentials = Credentials::new("SESSDATA", "bili_jct", "buvid3")?;
/// let client = BiliClient::new(credentials)?;
///
/// let id = VideoId::parse("BV1GJ411x7h7")?;
/// let text = client.get_subtitle_text(&id, 1, "zh").await?;
/// println!("{}", text);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BiliClient<T: Transport = HttpTransport> {
    transport: T,
    credentials: Credentials,
    config: ClientConfig,
    signer: WbiSigner,
}

impl BiliClient<HttpTransport> {
    /// Create a client with default configuration
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_config(credentials, ClientConfig::default())
    }

    /// Validate the three tokens and create a client
    ///
    /// # Errors
    /// `MissingCredentials` naming every empty token
    pub fn from_tokens<S: Into<String>>(sessdata: S, bili_jct: S, buvid3: S) -> Result<Self> {
        Self::new(Credentials::new(sessdata, bili_jct, buvid3)?)
    }

    /// Create a client with custom configuration
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config, &credentials)?;
        Ok(Self::with_transport(credentials, config, transport))
    }
}

impl<T: Transport> BiliClient<T> {
    /// Create a client over an arbitrary transport
    pub fn with_transport(credentials: Credentials, config: ClientConfig, transport: T) -> Self {
        let signer = WbiSigner::new(config.endpoint(endpoints::NAV), config.key_cache_ttl);
        Self {
            transport,
            credentials,
            config,
            signer,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Report which capabilities the held credentials unlock
    pub fn credentials_status(&self) -> CredentialStatus {
        CredentialStatus::for_credentials(&self.credentials)
    }

    /// GET an API endpoint and unwrap its `data` payload
    ///
    /// Signed calls fetch WBI keys first; key failures surface as
    /// `KeyFetchFailed` without touching the endpoint. A failed signed
    /// call drops any cached keys.
    pub(crate) async fn get_data(&self, path: &str, params: ParamSet, signed: bool) -> Result<Value> {
        let url = self.config.endpoint(path);
        let params = if signed {
            self.signer.sign(&self.transport, params).await?
        } else {
            params
        };

        log::debug!("GET {} (signed: {})", url, signed);
        let query: Vec<(String, String)> = params.into_iter().collect();
        let result = self.transport.get_json(&url, &query).await.and_then(unwrap_envelope);

        if signed && result.is_err() {
            self.signer.invalidate().await;
        }
        result
    }

    /// GET an absolute URL without envelope handling
    pub(crate) async fn get_raw(&self, url: &str) -> Result<Value> {
        log::debug!("GET {}", url);
        self.transport.get_json(url, &[]).await
    }

}

/// Check `code` and take `data` out of an API envelope
///
/// Unlike [`check_code`], a missing or non-integer `code` is an error.
pub(crate) fn unwrap_envelope(mut body: Value) -> Result<Value> {
    if body.get("code").and_then(Value::as_i64).is_none() {
        return Err(BiliError::transport("Response has no integer code", None, None));
    }
    check_code(&body)?;

    match body.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => Err(BiliError::transport(
            "Response has no data payload",
            None,
            None,
        )),
        Some(data) => Ok(data),
    }
}

/// Fail with `RemoteApiError` when the body carries a non-zero `code`
///
/// Bodies without a `code` pass; CDN subtitle files have none.
pub(crate) fn check_code(body: &Value) -> Result<()> {
    match body.get("code").and_then(Value::as_i64) {
        Some(0) | None => Ok(()),
        Some(code) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            Err(BiliError::remote(code, message))
        }
    }
}

// ===== TESTS =====
