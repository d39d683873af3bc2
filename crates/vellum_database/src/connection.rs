//! Database connection utilities.

use crate::DatabaseResult;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::instrument;
use vellum_error::{BackendError, DatabaseError, DatabaseErrorKind, VellumResult};

/// Migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Shared PostgreSQL connection pool.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Connection checked out of a [`PgPool`].
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Create a connection pool for the given database URL.
///
/// # Errors
///
/// Returns an error if the pool cannot open its initial connections.
#[instrument(name = "database.create_pool", skip(database_url))]
pub fn create_pool(database_url: &str, max_size: u32) -> DatabaseResult<PgPool> {
    tracing::debug!(max_size, "Creating PostgreSQL connection pool");
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    Pool::builder().max_size(max_size).build(manager).map_err(|e| {
        tracing::error!(error = %e, "Failed to create connection pool");
        DatabaseError::new(DatabaseErrorKind::Connection(e.to_string()))
    })
}

/// Create a connection pool from the `DATABASE_URL` environment variable.
///
/// # Errors
///
/// Returns an error if:
/// - `DATABASE_URL` environment variable is not set
/// - Pool creation fails
#[instrument(name = "database.create_pool_from_env")]
pub fn create_pool_from_env() -> DatabaseResult<PgPool> {
    let database_url = std::env::var("DATABASE_URL").map_err(|_| {
        tracing::error!("DATABASE_URL environment variable not set");
        DatabaseError::new(DatabaseErrorKind::Connection(
            "DATABASE_URL environment variable not set".to_string(),
        ))
    })?;
    create_pool(&database_url, 10)
}

/// Apply every pending embedded migration.
#[instrument(name = "database.run_migrations", skip(pool))]
pub fn run_migrations(pool: &PgPool) -> DatabaseResult<()> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))?;
    tracing::info!(count = applied.len(), "Applied database migrations");
    Ok(())
}

/// Run a blocking diesel closure on the blocking thread pool.
pub(crate) async fn with_conn<T, F>(pool: &PgPool, f: F) -> VellumResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> VellumResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(DatabaseError::from)?;
        f(&mut conn)
    })
    .await
    .map_err(|e| BackendError::new(format!("Database task join error: {}", e)))?
}
