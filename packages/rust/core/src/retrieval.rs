//! Article retrieval: topic in, ordered articles out.
//!
//! A failed search is not fatal. The stage logs it and hands an empty list
//! downstream, so the run still completes (with zero summaries).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use researchflow_search::ArticleSearch;
use researchflow_shared::{ArticleRecord, ResearchError, Result};

use crate::stage::{Stage, StageData, perceived, unexpected};

const NAME: &str = "retrieval";

/// Searches for articles about the perceived topic.
pub struct RetrievalStage {
    search: Arc<dyn ArticleSearch>,
    input: Option<StageData>,
}

impl RetrievalStage {
    pub fn new(search: Arc<dyn ArticleSearch>) -> Self {
        Self {
            search,
            input: None,
        }
    }
}

#[async_trait]
impl Stage for RetrievalStage {
    type Decision = Vec<ArticleRecord>;

    fn name(&self) -> &'static str {
        NAME
    }

    fn perceive(&mut self, input: StageData) {
        self.input = Some(input);
    }

    async fn decide(&self) -> Result<Vec<ArticleRecord>> {
        let topic = match perceived(&self.input, NAME)? {
            StageData::Topic(topic) => topic,
            other => return Err(unexpected(NAME, "topic", other)),
        };
        self.search.search(topic).await
    }

    async fn act(&mut self) -> Result<StageData> {
        let articles = match self.decide().await {
            Ok(articles) => articles,
            Err(e @ ResearchError::Retrieval { .. }) => {
                warn!(error = %e, "failed to retrieve articles, continuing with none");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        info!(count = articles.len(), "retrieved articles");
        Ok(StageData::Articles(articles))
    }
}
