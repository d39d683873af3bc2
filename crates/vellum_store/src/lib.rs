//! In-memory implementations of the Vellum persistence traits.
//!
//! Useful for tests, demos and single-process deployments. All data is lost
//! when the store is dropped.

mod proposals;
mod versions;

pub use proposals::InMemoryProposalSource;
pub use versions::InMemoryVersionStore;
