//! HTTP surface of the Vellum proposal generation engine.
//!
//! [`create_router`] exposes dispatch, iteration, curation, comparison,
//! model administration and a Server-Sent Events progress stream. [`EngineSettings`]
//! layers a TOML file and `VELLUM__*` environment variables.

mod api;
mod app;
mod error;
mod settings;

pub use api::{
    ApiState, CompareRequest, ConnectionTestRequest, DEFAULT_TEST_PROMPT, GenerateRequest,
    IterateRequest, ModelUpdate, ModelView, RateRequest, SESSION_HEADER, VersionsQuery,
    create_router,
};
pub use app::{build_in_memory, build_postgres};
pub use error::{ApiError, status_for};
pub use settings::{
    DatabaseSettings, EngineSettings, GenerationSettings, ProgressSettings, ServerSettings,
};
