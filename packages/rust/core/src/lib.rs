//! Core pipeline orchestration and stage logic for researchflow.
//!
//! This crate wires the search and completion clients into four stages
//! (intake, retrieval, summarization, persistence) and drives them through
//! a [`Pipeline`](pipeline::Pipeline).

pub mod context;
pub mod intake;
pub mod persistence;
pub mod pipeline;
pub mod retrieval;
pub mod stage;
pub mod summarization;

#[cfg(test)]
mod testing;

pub use context::ResearchContext;
pub use pipeline::{Pipeline, PipelineState, ProgressReporter, RunReport, SilentProgress, StageTiming};
pub use stage::{PipelineStage, Stage, StageData};
