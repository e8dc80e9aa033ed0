//! Summarization: one completion request per article, in order.
//!
//! Failures are per article. A failed article is logged and skipped; the
//! batch carries on. Each [`SummaryRecord`] keeps the index of its source
//! article, so gaps stay visible to anyone who needs alignment.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use researchflow_completion::{CompletionRequest, TextCompletion};
use researchflow_shared::{ArticleRecord, ResearchError, Result, SummaryRecord};

use crate::stage::{Stage, StageData, perceived, unexpected};

const NAME: &str = "summarization";

/// Instruction placed in front of every article body.
pub const SUMMARY_PROMPT_PREFIX: &str = "Summarize the following article:\n\n";

/// Default generation cap per summary.
pub const DEFAULT_MAX_TOKENS: u32 = 100;

/// Article bodies longer than this are cut before prompting.
const MAX_CONTENT_CHARS: usize = 12_000;

/// Outcome of summarizing one batch of articles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryBatch {
    /// Successful summaries, in article order.
    pub summaries: Vec<SummaryRecord>,
    /// Number of articles whose completion failed.
    pub failed: usize,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Summarizes each perceived article through a [`TextCompletion`] provider.
pub struct SummarizationStage {
    completion: Arc<dyn TextCompletion>,
    max_tokens: u32,
    input: Option<StageData>,
}

impl SummarizationStage {
    pub fn new(completion: Arc<dyn TextCompletion>) -> Self {
        Self::with_max_tokens(completion, DEFAULT_MAX_TOKENS)
    }

    pub fn with_max_tokens(completion: Arc<dyn TextCompletion>, max_tokens: u32) -> Self {
        Self {
            completion,
            max_tokens,
            input: None,
        }
    }

    async fn summarize(&self, index: usize, article: &ArticleRecord) -> Result<(SummaryRecord, u64, u64)> {
        let request = CompletionRequest {
            prompt: summary_prompt(&article.content),
            max_tokens: self.max_tokens,
        };

        let completion = self.completion.complete(&request).await?;
        debug!(index, tokens_out = completion.tokens_out, "article summarized");

        let record = SummaryRecord {
            article_index: index,
            text: completion.text.trim().to_string(),
        };
        Ok((record, completion.tokens_in, completion.tokens_out))
    }
}

#[async_trait]
impl Stage for SummarizationStage {
    type Decision = SummaryBatch;

    fn name(&self) -> &'static str {
        NAME
    }

    fn perceive(&mut self, input: StageData) {
        self.input = Some(input);
    }

    async fn decide(&self) -> Result<SummaryBatch> {
        let articles = match perceived(&self.input, NAME)? {
            StageData::Articles(articles) => articles,
            other => return Err(unexpected(NAME, "articles", other)),
        };

        let mut batch = SummaryBatch::default();

        for (index, article) in articles.iter().enumerate() {
            match self.summarize(index, article).await {
                Ok((record, tokens_in, tokens_out)) => {
                    batch.tokens_in += tokens_in;
                    batch.tokens_out += tokens_out;
                    batch.summaries.push(record);
                }
                Err(e @ ResearchError::Summarization { .. }) => {
                    warn!(index, title = %article.title, error = %e, "summarization failed, skipping article");
                    batch.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(batch)
    }

    async fn act(&mut self) -> Result<StageData> {
        let batch = self.decide().await?;

        for (n, summary) in batch.summaries.iter().enumerate() {
            info!(
                n = n + 1,
                article = summary.article_index,
                summary = %summary.text,
                "summary generated"
            );
        }

        info!(
            summaries = batch.summaries.len(),
            failed = batch.failed,
            tokens_in = batch.tokens_in,
            tokens_out = batch.tokens_out,
            "summarization complete"
        );

        Ok(StageData::Summaries(batch.summaries))
    }
}

/// Build the completion prompt for one article body.
pub fn summary_prompt(content: &str) -> String {
    format!("{SUMMARY_PROMPT_PREFIX}{}", truncate_content(content, MAX_CONTENT_CHARS))
}

/// Cut `content` to at most `max_chars` characters.
fn truncate_content(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubCompletion, article};

    fn articles(contents: &[&str]) -> StageData {
        StageData::Articles(
            contents
                .iter()
                .enumerate()
                .map(|(i, c)| article(&format!("article {i}"), c))
                .collect(),
        )
    }

    fn texts(data: &StageData) -> Vec<&str> {
        match data {
            StageData::Summaries(s) => s.iter().map(|r| r.text.as_str()).collect(),
            other => panic!("expected summaries, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn summarizes_every_article_in_order() {
        let completion = Arc::new(StubCompletion::default());
        let mut stage = SummarizationStage::new(completion.clone());
        stage.perceive(articles(&["A", "B", "C"]));

        let out = stage.act().await.unwrap();
        assert_eq!(texts(&out), ["summary-A", "summary-B", "summary-C"]);
        assert_eq!(completion.calls(), 3);
    }

    #[tokio::test]
    async fn sends_fixed_template_and_cap() {
        let completion = Arc::new(StubCompletion::default());
        let mut stage = SummarizationStage::new(completion.clone());
        stage.perceive(articles(&["Hospitals adopt AI triage."]));
        stage.act().await.unwrap();

        let requests = completion.requests.lock().unwrap();
        assert_eq!(
            requests[0].prompt,
            "Summarize the following article:\n\nHospitals adopt AI triage."
        );
        assert_eq!(requests[0].max_tokens, 100);
    }

    #[tokio::test]
    async fn failed_articles_are_dropped_keeping_order() {
        let completion = Arc::new(StubCompletion::failing_for(&["B", "D"]));
        let mut stage = SummarizationStage::new(completion.clone());
        stage.perceive(articles(&["A", "B", "C", "D", "E"]));

        let batch = stage.decide().await.unwrap();
        assert_eq!(batch.failed, 2);
        let indexes: Vec<_> = batch.summaries.iter().map(|s| s.article_index).collect();
        assert_eq!(indexes, [0, 2, 4]);

        let out = stage.act().await.unwrap();
        assert_eq!(texts(&out), ["summary-A", "summary-C", "summary-E"]);
    }

    #[tokio::test]
    async fn all_failures_yield_empty_not_error() {
        let completion = Arc::new(StubCompletion::failing_for(&["A", "B"]));
        let mut stage = SummarizationStage::new(completion);
        stage.perceive(articles(&["A", "B"]));

        let out = stage.act().await.unwrap();
        assert_eq!(out, StageData::Summaries(vec![]));
    }

    #[tokio::test]
    async fn no_articles_makes_no_calls() {
        let completion = Arc::new(StubCompletion::default());
        let mut stage = SummarizationStage::new(completion.clone());
        stage.perceive(StageData::Articles(vec![]));

        assert_eq!(stage.act().await.unwrap(), StageData::Summaries(vec![]));
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn act_before_perceive_is_fatal() {
        let mut stage = SummarizationStage::new(Arc::new(StubCompletion::default()));
        let err = stage.act().await.unwrap_err();
        assert!(matches!(err, ResearchError::NotInitialized { stage: "summarization" }));
    }

    #[test]
    fn long_content_is_truncated_on_char_boundary() {
        let content = "ü".repeat(MAX_CONTENT_CHARS + 50);
        let prompt = summary_prompt(&content);
        let body = prompt.strip_prefix(SUMMARY_PROMPT_PREFIX).unwrap();
        assert_eq!(body.chars().count(), MAX_CONTENT_CHARS);

        assert_eq!(truncate_content("short", 10), "short");
    }
}
