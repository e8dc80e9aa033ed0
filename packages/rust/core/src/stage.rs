//! The stage contract shared by every pipeline step.
//!
//! A stage is driven in three steps:
//! 1. [`Stage::perceive`] stores the handoff value (never fails)
//! 2. [`Stage::decide`] validates it and computes the stage result
//! 3. [`Stage::act`] runs side effects and returns the next handoff value
//!
//! [`PipelineStage`] is the object-safe view the orchestrator holds; every
//! [`Stage`] gets it through a blanket impl.

use async_trait::async_trait;
use serde::Serialize;

use researchflow_shared::{
    ArticleRecord, PersistReceipt, ResearchError, Result, SummaryRecord, Topic,
};

// ---------------------------------------------------------------------------
// StageData
// ---------------------------------------------------------------------------

/// The value handed from one stage to the next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageData {
    /// Raw topic text, as given to [`Pipeline::run`](crate::pipeline::Pipeline::run).
    Input(String),
    /// A validated topic.
    Topic(Topic),
    /// Retrieved articles, in provider order.
    Articles(Vec<ArticleRecord>),
    /// Generated summaries, in article order.
    Summaries(Vec<SummaryRecord>),
    /// The output artifact was written.
    Persisted(PersistReceipt),
}

impl StageData {
    /// Short name of the variant, for logs and contract errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Topic(_) => "topic",
            Self::Articles(_) => "articles",
            Self::Summaries(_) => "summaries",
            Self::Persisted(_) => "persisted",
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of a research pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// What [`decide`](Stage::decide) produces before side effects run.
    type Decision: Send;

    /// Stable stage name used in logs, progress, and errors.
    fn name(&self) -> &'static str;

    /// Store the input for a later `decide`/`act`.
    fn perceive(&mut self, input: StageData);

    /// Compute the stage result from the perceived input.
    ///
    /// Fails with [`ResearchError::NotInitialized`] before `perceive`, and with
    /// [`ResearchError::UnexpectedInput`] when given the wrong kind of data.
    async fn decide(&self) -> Result<Self::Decision>;

    /// Run side effects and return the value for the next stage.
    async fn act(&mut self) -> Result<StageData>;
}

/// Object-safe view of a [`Stage`], used by the orchestrator.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn perceive(&mut self, input: StageData);
    async fn act(&mut self) -> Result<StageData>;
}

#[async_trait]
impl<S: Stage> PipelineStage for S {
    fn name(&self) -> &'static str {
        Stage::name(self)
    }

    fn perceive(&mut self, input: StageData) {
        Stage::perceive(self, input);
    }

    async fn act(&mut self) -> Result<StageData> {
        Stage::act(self).await
    }
}

// ---------------------------------------------------------------------------
// Helpers for stage implementations
// ---------------------------------------------------------------------------

/// The perceived input, or `NotInitialized` if there is none yet.
pub(crate) fn perceived<'a>(
    input: &'a Option<StageData>,
    stage: &'static str,
) -> Result<&'a StageData> {
    input
        .as_ref()
        .ok_or(ResearchError::NotInitialized { stage })
}

/// Contract error for a handoff value of the wrong kind.
pub(crate) fn unexpected(stage: &'static str, expected: &'static str, found: &StageData) -> ResearchError {
    ResearchError::UnexpectedInput {
        stage,
        expected,
        found: found.kind(),
    }
}
