//! Article search collaborator.
//!
//! The pipeline only sees the [`ArticleSearch`] trait. [`NewsApiClient`] is the
//! production implementation: one `GET` against a NewsAPI-compatible endpoint
//! with `q` and `apiKey` query parameters, returning the `articles` array in
//! provider order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use researchflow_shared::{
    ArticleRecord, Credentials, ResearchError, Result, SearchConfig, Topic,
};

/// Default timeout in seconds for one search request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum response size we accept (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("researchflow/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// ArticleSearch
// ---------------------------------------------------------------------------

/// Anything that can turn a topic into an ordered list of articles.
#[async_trait]
pub trait ArticleSearch: Send + Sync {
    /// Run one search. Every failure is reported as [`ResearchError::Retrieval`].
    async fn search(&self, topic: &Topic) -> Result<Vec<ArticleRecord>>;
}

// ---------------------------------------------------------------------------
// Search options
// ---------------------------------------------------------------------------

/// HTTP settings for [`NewsApiClient`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Timeout for the request in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// NewsApiClient
// ---------------------------------------------------------------------------

/// HTTP client for a NewsAPI-compatible `everything` endpoint.
pub struct NewsApiClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl std::fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl NewsApiClient {
    /// Build a client for `endpoint`. Without `api_key` the request carries no
    /// `apiKey` parameter and most providers will answer 401.
    pub fn new(endpoint: &str, api_key: Option<String>, opts: &SearchOptions) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ResearchError::config(format!("invalid search endpoint '{endpoint}': {e}"))
        })?;

        Ok(Self {
            client: build_client(opts)?,
            endpoint,
            api_key,
        })
    }

    /// Build from the `[search]` config section and resolved credentials.
    pub fn from_config(config: &SearchConfig, credentials: &Credentials) -> Result<Self> {
        let opts = SearchOptions {
            timeout_secs: config.timeout_secs,
        };
        Self::new(&config.endpoint, credentials.search_api_key.clone(), &opts)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_url(&self, topic: &Topic) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", topic.as_str());
            if let Some(key) = &self.api_key {
                query.append_pair("apiKey", key);
            }
        }
        url
    }
}

#[async_trait]
impl ArticleSearch for NewsApiClient {
    #[instrument(skip_all, fields(topic = %topic, endpoint = %self.endpoint))]
    async fn search(&self, topic: &Topic) -> Result<Vec<ArticleRecord>> {
        let url = self.request_url(topic);

        debug!(authenticated = self.api_key.is_some(), "sending search request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResearchError::retrieval(None, format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::retrieval(
                Some(status.as_u16()),
                format!("{}: HTTP {status}", self.endpoint),
            ));
        }

        // Check content-length if available
        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(ResearchError::retrieval(
                    Some(status.as_u16()),
                    format!("response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"),
                ));
            }
        }

        let body = response.text().await.map_err(|e| {
            ResearchError::retrieval(Some(status.as_u16()), format!("failed to read body: {e}"))
        })?;

        let articles = parse_articles(&body)
            .map_err(|e| ResearchError::retrieval(Some(status.as_u16()), e))?;

        info!(count = articles.len(), "articles retrieved");
        Ok(articles)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &SearchOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| ResearchError::config(format!("failed to build HTTP client: {e}")))
}

/// Extract the `articles` array from a search response body.
///
/// A missing or non-array `articles` value is an empty result, not an error.
/// Only a body that is not JSON at all is rejected.
pub fn parse_articles(body: &str) -> std::result::Result<Vec<ArticleRecord>, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("response is not valid JSON: {e}"))?;

    let articles = match value.get("articles") {
        Some(Value::Array(items)) => items.iter().map(ArticleRecord::from_json).collect(),
        Some(other) => {
            debug!(kind = json_kind(other), "`articles` is not an array, treating as empty");
            Vec::new()
        }
        None => Vec::new(),
    };

    Ok(articles)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
