//! Trait definitions for the Vellum proposal generation engine.
//!
//! The orchestrator only talks to its collaborators through these traits:
//! provider backends, the version store, the proposal source owned by the
//! CRUD layer, the model catalog and the progress sink.

mod catalog;
mod progress;
mod proposal;
mod provider;
mod store;

pub use catalog::ModelCatalog;
pub use progress::ProgressSink;
pub use proposal::ProposalSource;
pub use provider::ProviderAdapter;
pub use store::{NewBatch, NewVersion, VersionCompletion, VersionStore};
