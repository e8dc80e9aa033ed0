//! Research pipeline: topic → intake → retrieval → summarization → persistence.
//!
//! The orchestrator feeds each stage's `act()` output into the next stage's
//! `perceive()`. Stages absorb their recoverable failures themselves; the
//! first error that escapes a stage halts the run and leaves the pipeline in
//! [`PipelineState::Failed`].

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument};
use uuid::Uuid;

use researchflow_shared::{PersistReceipt, Result};

use crate::context::ResearchContext;
use crate::intake::IntakeStage;
use crate::persistence::PersistenceStage;
use crate::retrieval::RetrievalStage;
use crate::stage::{PipelineStage, StageData};
use crate::summarization::SummarizationStage;

// ---------------------------------------------------------------------------
// State and report
// ---------------------------------------------------------------------------

/// Lifecycle of a pipeline: `Idle → Running → {Completed, Failed}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    /// A stage raised an unhandled error; later stages did not run.
    Failed { stage: &'static str, error: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// Timing for one stage of a run.
#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed: Duration,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identifier for this run (UUID v7, time-sortable).
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// What the last stage returned.
    pub output: StageData,
    /// Per-stage timings, in execution order.
    pub stages: Vec<StageTiming>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl RunReport {
    /// The persistence receipt, when the last stage wrote the artifact.
    pub fn receipt(&self) -> Option<&PersistReceipt> {
        match &self.output {
            StageData::Persisted(receipt) => Some(receipt),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a stage perceives its input.
    fn stage_started(&self, name: &str, current: usize, total: usize);
    /// Called after a stage's `act()` returned successfully.
    fn stage_finished(&self, name: &str, elapsed: Duration);
    /// Called when every stage completed.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn stage_finished(&self, _name: &str, _elapsed: Duration) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// An ordered sequence of stages driven one at a time.
pub struct Pipeline {
    stages: Vec<Box<dyn PipelineStage>>,
    state: PipelineState,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// An empty pipeline in the `Idle` state.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            state: PipelineState::Idle,
        }
    }

    /// The standard four-stage research pipeline.
    pub fn research(ctx: &ResearchContext) -> Self {
        Self::new()
            .with_stage(IntakeStage::new())
            .with_stage(RetrievalStage::new(ctx.search.clone()))
            .with_stage(SummarizationStage::with_max_tokens(
                ctx.completion.clone(),
                ctx.max_tokens,
            ))
            .with_stage(PersistenceStage::new(ctx.output_path.clone()))
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: impl PipelineStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage on `topic` without progress reporting.
    pub async fn run(&mut self, topic: impl Into<String>) -> Result<RunReport> {
        self.run_with_progress(topic, &SilentProgress).await
    }

    /// Run every stage on `topic`, in order.
    ///
    /// Returns the first unhandled stage error; the pipeline is then in
    /// [`PipelineState::Failed`] naming that stage. Calling this again after a
    /// terminal state starts a fresh run.
    #[instrument(skip_all, fields(stages = self.stages.len()))]
    pub async fn run_with_progress(
        &mut self,
        topic: impl Into<String>,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let start = Instant::now();
        let total = self.stages.len();

        self.state = PipelineState::Running;
        info!(%run_id, "starting research pipeline");

        let mut current = StageData::Input(topic.into());
        let mut timings = Vec::with_capacity(total);

        for (i, stage) in self.stages.iter_mut().enumerate() {
            let name = stage.name();
            progress.stage_started(name, i + 1, total);

            let stage_start = Instant::now();
            stage.perceive(current);

            current = match stage.act().await {
                Ok(next) => next,
                Err(e) => {
                    error!(%run_id, stage = name, error = %e, "pipeline failed");
                    self.state = PipelineState::Failed {
                        stage: name,
                        error: e.to_string(),
                    };
                    return Err(e);
                }
            };

            let elapsed = stage_start.elapsed();
            progress.stage_finished(name, elapsed);
            timings.push(StageTiming {
                stage: name,
                elapsed,
            });
        }

        self.state = PipelineState::Completed;

        let report = RunReport {
            run_id,
            started_at,
            output: current,
            stages: timings,
            elapsed: start.elapsed(),
        };

        progress.done(&report);

        info!(
            %run_id,
            output = report.output.kind(),
            elapsed_ms = report.elapsed.as_millis(),
            "workflow completed"
        );

        Ok(report)
    }
}
