//! Core data types for the Vellum proposal generation engine.
//!
//! This crate provides the records shared by every other crate: model
//! configuration, proposal versions and their lifecycle, batch aggregates and
//! progress events.

mod batch;
mod content;
mod ids;
mod model;
mod observability;
mod progress;
mod proposal;
mod version;

pub use batch::{BatchHandle, BatchMember, BatchStatus, BatchSummary};
pub use content::{SUMMARY_PREVIEW_CHARS, parse_content};
pub use ids::{BatchId, ModelId, ProposalId, VersionId};
pub use model::{
    Credentials, GenerationOutput, GenerationParams, GenerationParamsBuilder, ModelConfig,
    ModelConfigBuilder, ModelLimits, ModelStats, ProviderKind,
};
pub use observability::{LogFormat, MetricsExporter, MetricsGuard, init_observability, init_tracing};
pub use progress::{ProgressEvent, ProgressStage};
pub use proposal::{Proposal, ProposalRequest, ProposalStatus};
pub use version::{ProposalVersion, Rating, VersionContent, VersionStatus};
