//! Model registry for the Vellum proposal generation engine.
//!
//! Holds every configured model with its provider adapter, admission limiter
//! and running statistics. Statistics are atomic counters and can be written
//! through to a [`vellum_interface::ModelCatalog`].

mod limiter;
mod registry;
mod stats;

pub use limiter::{AdmissionGuard, ModelLimiter};
pub use registry::{ConnectionCheck, ModelRegistry, ResolvedModel};
pub use stats::AtomicStats;
