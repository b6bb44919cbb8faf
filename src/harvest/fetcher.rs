//! Page fetching
//!
//! This module handles retrieving rendered page content, including:
//! - The `PageFetcher` trait the orchestrator depends on
//! - An HTTP implementation with a per-instance client session
//! - Classification of failures into timeout / not found / blocked / transport

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Rendered content of one page visit
#[derive(Debug, Clone)]
pub struct PageContent {
    /// The address that was requested
    pub requested: Url,

    /// Final address after redirects
    pub final_url: Url,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Page body
    pub body: String,
}

impl PageContent {
    /// Creates page content for `address` with no redirect and no content type
    pub fn new(address: Url, body: impl Into<String>) -> Self {
        Self {
            final_url: address.clone(),
            requested: address,
            content_type: None,
            body: body.into(),
        }
    }
}

/// Why a page could not be retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Timeout,
    NotFound,
    Blocked,
    Transport,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::NotFound => "not found",
            Self::Blocked => "blocked",
            Self::Transport => "transport error",
        };
        f.write_str(s)
    }
}

/// A failed page retrieval
#[derive(Debug, Clone, Error)]
#[error("{kind} fetching {address}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub address: Url,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, address: &Url, message: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.clone(),
            message: message.into(),
        }
    }

    /// The operation did not finish within `after`
    pub fn timeout(address: &Url, after: Duration) -> Self {
        Self::new(
            FetchErrorKind::Timeout,
            address,
            format!("no response within {:?}", after),
        )
    }
}

/// Retrieves rendered page content
///
/// Implementations perform exactly one retrieval per call; retrying is the
/// caller's responsibility.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, address: &Url) -> Result<PageContent, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// Each client keeps its own cookie store, so one client is one session.
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::UserAgentConfig;
/// use catalog_harvest::harvest::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "CatalogHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(60)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP page fetcher owning one client session
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config, timeout)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Fetches a page
    ///
    /// | Condition | Kind |
    /// |-----------|------|
    /// | Request timeout | Timeout |
    /// | HTTP 404, 410 | NotFound |
    /// | HTTP 401, 403, 429, 503 | Blocked |
    /// | Other non-2xx, connection error, unreadable body | Transport |
    async fn fetch(&self, address: &Url) -> Result<PageContent, FetchError> {
        let response = self
            .client
            .get(address.clone())
            .send()
            .await
            .map_err(|e| classify_request_error(address, &e))?;

        let status = response.status();
        if let Some(kind) = classify_status(status) {
            return Err(FetchError::new(kind, address, format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(address, &e))?;

        tracing::debug!("Fetched {} ({} bytes)", final_url, body.len());

        Ok(PageContent {
            requested: address.clone(),
            final_url,
            content_type,
            body,
        })
    }
}

/// Maps an HTTP status to a failure kind; `None` for success
pub fn classify_status(status: StatusCode) -> Option<FetchErrorKind> {
    if status.is_success() {
        return None;
    }
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Some(FetchErrorKind::NotFound),
        StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::SERVICE_UNAVAILABLE => Some(FetchErrorKind::Blocked),
        _ => Some(FetchErrorKind::Transport),
    }
}

fn classify_request_error(address: &Url, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::new(FetchErrorKind::Timeout, address, "request timeout")
    } else if err.is_connect() {
        FetchError::new(FetchErrorKind::Transport, address, format!("connection failed: {}", err))
    } else {
        FetchError::new(FetchErrorKind::Transport, address, err.to_string())
    }
}
