//! Deterministic collaborator stubs for stage and pipeline tests.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use researchflow_completion::{Completion, CompletionRequest, TextCompletion};
use researchflow_search::ArticleSearch;
use researchflow_shared::{ArticleRecord, ResearchError, Result, Topic};

use crate::summarization::SUMMARY_PROMPT_PREFIX;

/// Unique scratch directory under the system temp dir.
pub(crate) fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rf-{label}-test-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub(crate) fn article(title: &str, content: &str) -> ArticleRecord {
    ArticleRecord {
        title: title.into(),
        content: content.into(),
        ..Default::default()
    }
}

/// Search stub returning a fixed answer and recording every topic it saw.
pub(crate) struct StubSearch {
    answer: std::result::Result<Vec<ArticleRecord>, u16>,
    pub(crate) topics: Mutex<Vec<String>>,
}

impl StubSearch {
    pub(crate) fn returning(articles: Vec<ArticleRecord>) -> Self {
        Self {
            answer: Ok(articles),
            topics: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(status: u16) -> Self {
        Self {
            answer: Err(status),
            topics: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn seen(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArticleSearch for StubSearch {
    async fn search(&self, topic: &Topic) -> Result<Vec<ArticleRecord>> {
        self.topics.lock().unwrap().push(topic.to_string());
        match &self.answer {
            Ok(articles) => Ok(articles.clone()),
            Err(status) => Err(ResearchError::retrieval(Some(*status), format!("HTTP {status}"))),
        }
    }
}

/// Completion stub: answers `summary-<content>` and fails for chosen contents.
#[derive(Default)]
pub(crate) struct StubCompletion {
    fail_for: HashSet<String>,
    pub(crate) requests: Mutex<Vec<CompletionRequest>>,
}

impl StubCompletion {
    pub(crate) fn failing_for(contents: &[&str]) -> Self {
        Self {
            fail_for: contents.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TextCompletion for StubCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request.clone());

        let content = request
            .prompt
            .strip_prefix(SUMMARY_PROMPT_PREFIX)
            .unwrap_or(&request.prompt);

        if self.fail_for.contains(content) {
            return Err(ResearchError::summarization(format!("stub refused `{content}`")));
        }

        Ok(Completion {
            text: format!("summary-{content}"),
            tokens_in: 10,
            tokens_out: 2,
        })
    }
}
