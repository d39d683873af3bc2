//! PostgreSQL persistence for Vellum.
//!
//! Provides diesel-backed implementations of [`VersionStore`],
//! [`ProposalSource`] and [`ModelCatalog`]. Blocking diesel calls run on
//! `spawn_blocking`; version numbering and selection go through the
//! `version_heads` row of each proposal inside a transaction.
//!
//! [`VersionStore`]: vellum_interface::VersionStore
//! [`ProposalSource`]: vellum_interface::ProposalSource
//! [`ModelCatalog`]: vellum_interface::ModelCatalog

mod catalog;
mod connection;
mod proposals;
mod rows;
pub mod schema;
mod versions;

pub use catalog::PostgresModelCatalog;
pub use connection::{
    MIGRATIONS, PgPool, PgPooledConnection, create_pool, create_pool_from_env, run_migrations,
};
pub use proposals::PostgresProposalSource;
pub use rows::{
    ModelConfigRow, NewModelConfigRow, NewProposalRow, NewProposalRowBuilder, NewVersionRow,
    ProposalRow, VersionRow,
};
pub use versions::PostgresVersionStore;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, vellum_error::DatabaseError>;
