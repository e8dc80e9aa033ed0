//! Text completion collaborator.
//!
//! [`TextCompletion`] is the seam the summarization stage talks to;
//! [`OpenAiCompletions`] speaks the OpenAI-compatible `POST /completions` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use researchflow_shared::{CompletionConfig, Credentials, ResearchError, Result};

/// Default timeout in seconds for one completion request.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("researchflow/", env!("CARGO_PKG_VERSION"));

/// How much of an error body ends up in the error message.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// One prompt plus its generation cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
}

/// The generated text and whatever usage the provider reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Anything that can complete a prompt.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete one prompt. Every failure is reported as
    /// [`ResearchError::Summarization`].
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

// Wire types -----------------------------------------------------------------

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// OpenAiCompletions
// ---------------------------------------------------------------------------

/// Client for an OpenAI-compatible text completion endpoint.
pub struct OpenAiCompletions {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiCompletions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletions")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompletions {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ResearchError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Build from the `[completion]` config section and resolved credentials.
    pub fn from_config(config: &CompletionConfig, credentials: &Credentials) -> Result<Self> {
        Self::new(
            credentials.completion_api_key.clone(),
            config.base_url.clone(),
            config.model.clone(),
            config.timeout_secs,
        )
    }

    /// Client with the default timeout.
    pub fn with_defaults(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        Self::new(api_key, base_url, model, DEFAULT_TIMEOUT_SECS)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextCompletion for OpenAiCompletions {
    #[instrument(skip_all, fields(model = %self.model, max_tokens = request.max_tokens))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let url = format!("{}/completions", self.base_url);

        debug!(prompt_len = request.prompt.len(), "sending completion request");

        let body = WireRequest {
            model: &self.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::summarization(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ResearchError::summarization(format!(
                "completion API error ({status}): {}",
                preview(&text)
            )));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::summarization(format!("invalid completion response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text.trim().to_string())
            .ok_or_else(|| ResearchError::summarization("completion response had no choices"))?;

        let (tokens_in, tokens_out) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(Completion {
            text,
            tokens_in,
            tokens_out,
        })
    }
}

/// First few hundred bytes of `text`, cut on a char boundary.
fn preview(text: &str) -> &str {
    if text.len() <= ERROR_BODY_PREVIEW {
        return text;
    }
    let mut end = ERROR_BODY_PREVIEW;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt.into(),
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn complete_posts_prompt_and_cap() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "test-instruct",
                "prompt": "Summarize the following article:\n\nA",
                "max_tokens": 100,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "text": "\n\n summary-A  " }],
                "usage": { "prompt_tokens": 12, "completion_tokens": 3 },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            OpenAiCompletions::with_defaults("sk-test", format!("{}/v1/", server.uri()), "test-instruct")
                .unwrap();
        let completion = client
            .complete(&request("Summarize the following article:\n\nA"))
            .await
            .unwrap();

        assert_eq!(completion.text, "summary-A");
        assert_eq!(completion.tokens_in, 12);
        assert_eq!(completion.tokens_out, 3);
    }

    #[tokio::test]
    async fn missing_usage_is_zero() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "choices": [{ "text": "ok" }] })),
            )
            .mount(&server)
            .await;

        let client = OpenAiCompletions::with_defaults("sk", server.uri(), "m").unwrap();
        let completion = client.complete(&request("p")).await.unwrap();
        assert_eq!(completion, Completion { text: "ok".into(), tokens_in: 0, tokens_out: 0 });
    }

    #[tokio::test]
    async fn api_error_is_summarization_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = OpenAiCompletions::with_defaults("sk", server.uri(), "m").unwrap();
        let err = client.complete(&request("p")).await.unwrap_err();

        assert!(matches!(err, ResearchError::Summarization { .. }));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn empty_choices_is_summarization_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = OpenAiCompletions::with_defaults("sk", server.uri(), "m").unwrap();
        let err = client.complete(&request("p")).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let long = "é".repeat(300);
        let cut = preview(&long);
        assert!(cut.len() <= ERROR_BODY_PREVIEW);
        assert!(cut.chars().all(|c| c == 'é'));
        assert_eq!(preview("short"), "short");
    }
}
