//! Client for the hh.ru vacancy search endpoint.
//!
//! Requests go through a [`SearchTransport`] so the retry policy can be driven
//! without a network in tests. [`HttpTransport`] is the reqwest-backed one used
//! by the binary.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

pub const API_URL: &str = "https://api.hh.ru/vacancies";
pub const SEARCH_KEYWORDS: &[&str] = &["python", "java", "frontend", "javascript"];
pub const FALLBACK_KEYWORD: &str = "python";

pub const MAX_PAGE_ATTEMPTS: u32 = 6;
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

pub type Query = Vec<(&'static str, String)>;

/// Status, `Retry-After` header and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub retry_after: Option<String>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn get(&self, query: &[(&'static str, String)]) -> Result<HttpReply, TransportError>;
}

/// One shared reqwest client carrying the User-Agent and Accept headers.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).context("Invalid characters in User-Agent")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: API_URL.to_string(),
        })
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn get(&self, query: &[(&'static str, String)]) -> Result<HttpReply, TransportError> {
        let response = self.client.get(&self.url).query(query).send().await?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.text().await?;
        Ok(HttpReply {
            status,
            retry_after,
            body,
        })
    }
}

pub fn build_user_agent(contact: &str) -> String {
    format!("it-vacancies/1.0 (contact: {})", contact)
}

pub fn search_text() -> String {
    SEARCH_KEYWORDS.join(" OR ")
}

pub fn search_query(page: u32, per_page: u32) -> Query {
    vec![
        ("text", search_text()),
        ("per_page", per_page.to_string()),
        ("page", page.to_string()),
        ("search_field", "name".to_string()),
        ("order_by", "publication_time".to_string()),
        ("only_with_salary", "false".to_string()),
    ]
}

pub fn fallback_query(page: u32, per_page: u32) -> Query {
    vec![
        ("text", FALLBACK_KEYWORD.to_string()),
        ("per_page", per_page.to_string()),
        ("page", page.to_string()),
    ]
}

/// One page of search results. Items stay as raw JSON until normalized.
///
/// Missing and `null` fields both read as empty or zero.
#[derive(Debug, Default, Deserialize)]
pub struct RawPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub found: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pages: u32,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page {page} failed after {attempts} attempts: {last}")]
    Exhausted {
        page: u32,
        attempts: u32,
        last: String,
    },
    #[error("page {page} rejected with 400 and fallback query failed: {reason}")]
    FallbackFailed { page: u32, reason: String },
}

/// Exponential backoff schedule: 1s, 2s, 4s ... capped at 60s.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            current: INITIAL_BACKOFF,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn advance(&mut self) {
        self.current = (self.current * 2).min(MAX_BACKOFF);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a numeric `Retry-After` value. HTTP-date values are ignored.
pub fn retry_after_delay(value: Option<&str>) -> Option<Duration> {
    let value = value?.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

pub struct SearchClient<T> {
    transport: T,
}

impl<T: SearchTransport> SearchClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches one page, retrying rate limits and transient failures.
    pub async fn fetch_page(&self, page: u32, per_page: u32) -> Result<RawPage, FetchError> {
        let query = search_query(page, per_page);
        let mut backoff = Backoff::new();
        let mut last = String::from("no attempt made");

        for attempt in 1..=MAX_PAGE_ATTEMPTS {
            info!(page, per_page, attempt, "GET vacancies page");

            let (failure, retry_after) = match self.transport.get(&query).await {
                Ok(reply) if reply.status == StatusCode::BAD_REQUEST => {
                    error!(page, body = %snippet(&reply.body), "400 Bad Request, retrying with fallback query");
                    return self.fetch_fallback(page, per_page).await;
                }
                Ok(reply) if reply.status == StatusCode::TOO_MANY_REQUESTS => (
                    "429 Too Many Requests".to_string(),
                    retry_after_delay(reply.retry_after.as_deref()),
                ),
                Ok(reply) if reply.status.is_success() => {
                    match serde_json::from_str::<RawPage>(&reply.body) {
                        Ok(parsed) => return Ok(parsed),
                        Err(e) => (format!("invalid response body: {}", e), None),
                    }
                }
                Ok(reply) => (format!("HTTP {}", reply.status), None),
                Err(e) => (e.to_string(), None),
            };

            last = failure;
            if attempt == MAX_PAGE_ATTEMPTS {
                warn!(page, attempt, error = %last, "Request failed");
                break;
            }

            // Rate limits honour Retry-After; everything else follows the backoff.
            let wait = retry_after.unwrap_or_else(|| backoff.current());
            warn!(
                page,
                attempt,
                error = %last,
                wait_secs = wait.as_secs_f64(),
                "Request failed, retrying"
            );
            tokio::time::sleep(wait).await;
            backoff.advance();
        }

        error!(page, attempts = MAX_PAGE_ATTEMPTS, "Failed to fetch page");
        Err(FetchError::Exhausted {
            page,
            attempts: MAX_PAGE_ATTEMPTS,
            last,
        })
    }

    async fn fetch_fallback(&self, page: u32, per_page: u32) -> Result<RawPage, FetchError> {
        let query = fallback_query(page, per_page);
        let reply = self
            .transport
            .get(&query)
            .await
            .map_err(|e| FetchError::FallbackFailed {
                page,
                reason: e.to_string(),
            })?;
        if !reply.status.is_success() {
            return Err(FetchError::FallbackFailed {
                page,
                reason: format!("HTTP {}", reply.status),
            });
        }
        serde_json::from_str(&reply.body).map_err(|e| FetchError::FallbackFailed {
            page,
            reason: format!("invalid response body: {}", e),
        })
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(512).collect()
}
