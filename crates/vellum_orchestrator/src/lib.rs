//! Generation orchestration for Vellum.
//!
//! The [`Orchestrator`] turns one proposal request into a batch of versions,
//! one per selected model, generated concurrently in the background. It also
//! hosts the read and curation operations over stored versions (listing,
//! lineage, rating, selection) and the [`compare`](Orchestrator::compare)
//! view.

mod comparison;
mod metrics;
mod orchestrator;
mod prompt;
mod settings;
mod unit;

pub use comparison::{ComparedVersion, ComparisonReport, ComparisonSummary, SimilarityEntry};
#[cfg(feature = "metrics")]
pub use metrics::GenerationMetrics;
pub use orchestrator::{DispatchedBatch, Orchestrator};
pub use prompt::render_prompt;
pub use settings::{OrchestratorSettings, OrchestratorSettingsBuilder};
