//! Topic intake: turns raw text into a validated [`Topic`].

use async_trait::async_trait;
use tracing::info;

use researchflow_shared::{Result, Topic};

use crate::stage::{Stage, StageData, perceived, unexpected};

const NAME: &str = "intake";

/// First stage of every research run.
#[derive(Debug, Default)]
pub struct IntakeStage {
    input: Option<StageData>,
}

impl IntakeStage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Stage for IntakeStage {
    type Decision = Topic;

    fn name(&self) -> &'static str {
        NAME
    }

    fn perceive(&mut self, input: StageData) {
        self.input = Some(input);
    }

    async fn decide(&self) -> Result<Topic> {
        match perceived(&self.input, NAME)? {
            StageData::Input(raw) => Topic::new(raw),
            StageData::Topic(topic) => Ok(topic.clone()),
            other => Err(unexpected(NAME, "topic", other)),
        }
    }

    async fn act(&mut self) -> Result<StageData> {
        let topic = self.decide().await?;
        info!(%topic, "proceeding with research");
        Ok(StageData::Topic(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use researchflow_shared::ResearchError;

    #[tokio::test]
    async fn passes_trimmed_topic_through() {
        let mut stage = IntakeStage::new();
        stage.perceive(StageData::Input("  AI in Healthcare  ".into()));

        let out = stage.act().await.unwrap();
        match out {
            StageData::Topic(topic) => assert_eq!(topic.as_str(), "AI in Healthcare"),
            other => panic!("expected topic, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_topic_is_invalid_input() {
        let mut stage = IntakeStage::new();
        stage.perceive(StageData::Input("   ".into()));

        let err = stage.act().await.unwrap_err();
        assert!(matches!(err, ResearchError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn decide_before_perceive_fails() {
        let stage = IntakeStage::new();
        let err = stage.decide().await.unwrap_err();
        assert!(matches!(err, ResearchError::NotInitialized { stage: "intake" }));
    }

    #[tokio::test]
    async fn rejects_articles() {
        let mut stage = IntakeStage::new();
        stage.perceive(StageData::Articles(vec![]));
        let err = stage.decide().await.unwrap_err();
        assert!(matches!(err, ResearchError::UnexpectedInput { found: "articles", .. }));
    }
}
