//! PostgreSQL implementation of ModelCatalog.

use crate::connection::{PgPool, with_conn};
use crate::rows::{ModelConfigRow, NewModelConfigRow, signed};
use crate::schema::model_configs;
use async_trait::async_trait;
use diesel::prelude::*;
use tracing::{debug, instrument};
use vellum_core::{ModelConfig, ModelId, ModelStats};
use vellum_error::{NotFoundError, NotFoundErrorKind, VellumResult};
use vellum_interface::ModelCatalog;

/// Model configurations and counters stored in `model_configs`.
#[derive(Clone)]
pub struct PostgresModelCatalog {
    pool: PgPool,
}

impl PostgresModelCatalog {
    /// Create a catalog over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelCatalog for PostgresModelCatalog {
    #[instrument(skip(self))]
    async fn load_models(&self) -> VellumResult<Vec<(ModelConfig, ModelStats)>> {
        let models = with_conn(&self.pool, |conn| {
            let rows = model_configs::table
                .order(model_configs::id.asc())
                .select(ModelConfigRow::as_select())
                .load(conn)?;
            rows.into_iter()
                .map(|row| row.into_domain().map_err(Into::into))
                .collect::<VellumResult<Vec<_>>>()
        })
        .await?;
        debug!(count = models.len(), "Loaded model catalog");
        Ok(models)
    }

    #[instrument(skip(self, config), fields(model_id = %config.id()))]
    async fn save_model(&self, config: &ModelConfig) -> VellumResult<()> {
        let row = NewModelConfigRow::try_from(config)?;
        with_conn(&self.pool, move |conn| {
            diesel::insert_into(model_configs::table)
                .values(&row)
                .on_conflict(model_configs::id)
                .do_update()
                .set((&row, model_configs::updated_at.eq(diesel::dsl::now)))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(model_id = %id))]
    async fn record_outcome(
        &self,
        id: ModelId,
        success: bool,
        tokens_used: u64,
        duration_ms: u64,
    ) -> VellumResult<()> {
        let successes = i64::from(success);
        let tokens = if success { signed(tokens_used) } else { 0 };
        let duration = signed(duration_ms);
        with_conn(&self.pool, move |conn| {
            // Relative updates keep concurrent writers from losing increments.
            let updated = diesel::update(model_configs::table.find(id.0))
                .set((
                    model_configs::total_calls.eq(model_configs::total_calls + 1),
                    model_configs::success_calls.eq(model_configs::success_calls + successes),
                    model_configs::total_tokens.eq(model_configs::total_tokens + tokens),
                    model_configs::total_duration_ms
                        .eq(model_configs::total_duration_ms + duration),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Err(NotFoundError::new(NotFoundErrorKind::Model(id.0)).into());
            }
            Ok(())
        })
        .await
    }
}
