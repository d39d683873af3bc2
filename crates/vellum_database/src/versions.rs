//! PostgreSQL implementation of VersionStore.

use crate::connection::{PgPool, with_conn};
use crate::rows::{NewVersionRow, VersionRow, signed};
use crate::schema::{proposal_versions, version_heads};
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::{debug, instrument};
use vellum_core::{
    BatchId, ProposalId, ProposalVersion, Rating, VersionId, VersionStatus,
};
use vellum_error::{
    DatabaseError, NotFoundError, NotFoundErrorKind, ValidationError, VellumError, VellumResult,
};
use vellum_interface::{NewBatch, VersionCompletion, VersionStore};

fn load(conn: &mut PgConnection, id: VersionId) -> VellumResult<ProposalVersion> {
    let row = proposal_versions::table
        .find(id.0)
        .select(VersionRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Version(id.0)))?;
    Ok(ProposalVersion::try_from(row)?)
}

fn load_for_update(conn: &mut PgConnection, id: VersionId) -> VellumResult<ProposalVersion> {
    let row = proposal_versions::table
        .find(id.0)
        .select(VersionRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Version(id.0)))?;
    Ok(ProposalVersion::try_from(row)?)
}

fn into_versions(rows: Vec<VersionRow>) -> VellumResult<Vec<ProposalVersion>> {
    rows.into_iter()
        .map(|row| ProposalVersion::try_from(row).map_err(VellumError::from))
        .collect()
}

/// Version store backed by the `proposal_versions` and `version_heads` tables.
#[derive(Clone)]
pub struct PostgresVersionStore {
    pool: PgPool,
}

impl PostgresVersionStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run a status transition under a row lock.
    async fn transition<F>(&self, id: VersionId, next: VersionStatus, apply: F) -> VellumResult<ProposalVersion>
    where
        F: FnOnce(&mut PgConnection, VersionId) -> QueryResult<VersionRow> + Send + 'static,
    {
        with_conn(&self.pool, move |conn| {
            conn.transaction::<_, VellumError, _>(|conn| {
                load_for_update(conn, id)?.ensure_transition(next)?;
                let row = apply(conn, id)?;
                Ok(ProposalVersion::try_from(row)?)
            })
        })
        .await
    }
}

#[async_trait]
impl VersionStore for PostgresVersionStore {
    #[instrument(
        skip(self, batch),
        fields(proposal_id = %batch.proposal_id(), batch_id = %batch.batch_id(), count = batch.versions().len())
    )]
    async fn create_batch(&self, batch: NewBatch) -> VellumResult<Vec<ProposalVersion>> {
        if batch.versions().is_empty() {
            return Err(ValidationError::new("A batch needs at least one model").into());
        }
        let request = serde_json::to_value(batch.request()).map_err(DatabaseError::from)?;

        let created = with_conn(&self.pool, move |conn| {
            conn.transaction::<_, VellumError, _>(|conn| {
                let proposal_id = *batch.proposal_id();
                if let Some(parent) = batch.parent_version_id() {
                    load(conn, *parent)?.ensure_can_parent(proposal_id)?;
                }

                let count = i32::try_from(batch.versions().len())
                    .map_err(|_| ValidationError::new("Batch is too large"))?;
                // Upserting the head row serializes allocation per proposal.
                let last: i32 = diesel::insert_into(version_heads::table)
                    .values((
                        version_heads::proposal_id.eq(proposal_id.0),
                        version_heads::last_version_number.eq(count),
                    ))
                    .on_conflict(version_heads::proposal_id)
                    .do_update()
                    .set((
                        version_heads::last_version_number
                            .eq(version_heads::last_version_number + count),
                        version_heads::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(version_heads::last_version_number)
                    .get_result(conn)?;
                let first = last - count + 1;

                let rows: Vec<NewVersionRow> = batch
                    .versions()
                    .iter()
                    .zip(first..)
                    .map(|(version, number)| NewVersionRow {
                        proposal_id: proposal_id.0,
                        version_number: number,
                        batch_id: batch.batch_id().0,
                        model_id: version.model_id.0,
                        model_name: version.model_name.clone(),
                        provider: version.provider.to_string(),
                        status: VersionStatus::Pending.to_string(),
                        parent_version_id: batch.parent_version_id().map(|p| p.0),
                        iteration_feedback: batch.iteration_feedback().clone(),
                        request: request.clone(),
                    })
                    .collect();

                let inserted = diesel::insert_into(proposal_versions::table)
                    .values(&rows)
                    .returning(VersionRow::as_returning())
                    .get_results(conn)?;
                let mut versions = into_versions(inserted)?;
                versions.sort_by_key(|v| v.version_number);
                Ok(versions)
            })
        })
        .await?;

        debug!(
            first = created.first().map(|v| v.version_number),
            last = created.last().map(|v| v.version_number),
            "Created batch"
        );
        Ok(created)
    }

    #[instrument(skip(self), fields(version_id = %id))]
    async fn get_version(&self, id: VersionId) -> VellumResult<ProposalVersion> {
        with_conn(&self.pool, move |conn| load(conn, id)).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_versions(&self, ids: &[VersionId]) -> VellumResult<Vec<ProposalVersion>> {
        let ids = ids.to_vec();
        with_conn(&self.pool, move |conn| {
            let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
            let found = into_versions(
                proposal_versions::table
                    .filter(proposal_versions::id.eq_any(raw))
                    .select(VersionRow::as_select())
                    .load(conn)?,
            )?;
            ids.iter()
                .map(|id| {
                    found
                        .iter()
                        .find(|v| v.id == *id)
                        .cloned()
                        .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Version(id.0)).into())
                })
                .collect()
        })
        .await
    }

    #[instrument(skip(self), fields(proposal_id = %proposal_id))]
    async fn list_versions(&self, proposal_id: ProposalId) -> VellumResult<Vec<ProposalVersion>> {
        with_conn(&self.pool, move |conn| {
            into_versions(
                proposal_versions::table
                    .filter(proposal_versions::proposal_id.eq(proposal_id.0))
                    .order(proposal_versions::version_number.asc())
                    .select(VersionRow::as_select())
                    .load(conn)?,
            )
        })
        .await
    }

    #[instrument(skip(self), fields(batch_id = %batch_id))]
    async fn batch_versions(&self, batch_id: BatchId) -> VellumResult<Vec<ProposalVersion>> {
        let members = with_conn(&self.pool, move |conn| {
            into_versions(
                proposal_versions::table
                    .filter(proposal_versions::batch_id.eq(batch_id.0))
                    .order(proposal_versions::version_number.asc())
                    .select(VersionRow::as_select())
                    .load(conn)?,
            )
        })
        .await?;
        if members.is_empty() {
            return Err(NotFoundError::new(NotFoundErrorKind::Batch(batch_id.to_string())).into());
        }
        Ok(members)
    }

    #[instrument(skip(self), fields(version_id = %id))]
    async fn mark_generating(&self, id: VersionId) -> VellumResult<ProposalVersion> {
        self.transition(id, VersionStatus::Generating, |conn, id| {
            diesel::update(proposal_versions::table.find(id.0))
                .set((
                    proposal_versions::status.eq(VersionStatus::Generating.to_string()),
                    proposal_versions::started_at.eq(Some(Utc::now())),
                ))
                .returning(VersionRow::as_returning())
                .get_result(conn)
        })
        .await
    }

    #[instrument(skip(self, completion), fields(version_id = %id, tokens = completion.tokens_used))]
    async fn complete_version(
        &self,
        id: VersionId,
        completion: VersionCompletion,
    ) -> VellumResult<ProposalVersion> {
        self.transition(id, VersionStatus::Completed, move |conn, id| {
            let content = completion.content;
            diesel::update(proposal_versions::table.find(id.0))
                .set((
                    proposal_versions::status.eq(VersionStatus::Completed.to_string()),
                    proposal_versions::finished_at.eq(Some(Utc::now())),
                    proposal_versions::duration_ms.eq(Some(signed(completion.duration_ms))),
                    proposal_versions::tokens_used.eq(Some(signed(completion.tokens_used))),
                    proposal_versions::summary.eq(Some(content.summary)),
                    proposal_versions::solution_overview.eq(Some(content.solution_overview)),
                    proposal_versions::full_content.eq(Some(content.full_content)),
                ))
                .returning(VersionRow::as_returning())
                .get_result(conn)
        })
        .await
    }

    #[instrument(skip(self, error), fields(version_id = %id))]
    async fn fail_version(
        &self,
        id: VersionId,
        error: String,
        duration_ms: Option<u64>,
    ) -> VellumResult<ProposalVersion> {
        self.transition(id, VersionStatus::Failed, move |conn, id| {
            diesel::update(proposal_versions::table.find(id.0))
                .set((
                    proposal_versions::status.eq(VersionStatus::Failed.to_string()),
                    proposal_versions::finished_at.eq(Some(Utc::now())),
                    proposal_versions::duration_ms.eq(duration_ms.map(signed)),
                    proposal_versions::error.eq(Some(error)),
                ))
                .returning(VersionRow::as_returning())
                .get_result(conn)
        })
        .await
    }

    #[instrument(skip(self), fields(version_id = %id, rating = %rating))]
    async fn rate_version(&self, id: VersionId, rating: Rating) -> VellumResult<ProposalVersion> {
        with_conn(&self.pool, move |conn| {
            conn.transaction::<_, VellumError, _>(|conn| {
                load_for_update(conn, id)?.ensure_ratable()?;
                let row = diesel::update(proposal_versions::table.find(id.0))
                    .set(proposal_versions::rating.eq(Some(i16::from(rating.value()))))
                    .returning(VersionRow::as_returning())
                    .get_result(conn)?;
                Ok(ProposalVersion::try_from(row)?)
            })
        })
        .await
    }

    #[instrument(skip(self), fields(version_id = %id))]
    async fn select_version(&self, id: VersionId) -> VellumResult<ProposalVersion> {
        with_conn(&self.pool, move |conn| {
            conn.transaction::<_, VellumError, _>(|conn| {
                let proposal_id = load(conn, id)?.proposal_id;
                // The head row lock serializes selections of one proposal.
                version_heads::table
                    .find(proposal_id.0)
                    .select(version_heads::selected_version_id)
                    .for_update()
                    .first::<Option<i64>>(conn)?;
                load(conn, id)?.ensure_selectable()?;

                diesel::update(
                    proposal_versions::table
                        .filter(proposal_versions::proposal_id.eq(proposal_id.0))
                        .filter(proposal_versions::selected.eq(true)),
                )
                .set(proposal_versions::selected.eq(false))
                .execute(conn)?;
                let row = diesel::update(proposal_versions::table.find(id.0))
                    .set(proposal_versions::selected.eq(true))
                    .returning(VersionRow::as_returning())
                    .get_result(conn)?;
                diesel::update(version_heads::table.find(proposal_id.0))
                    .set((
                        version_heads::selected_version_id.eq(Some(id.0)),
                        version_heads::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;
                Ok(ProposalVersion::try_from(row)?)
            })
        })
        .await
    }

    #[instrument(skip(self), fields(proposal_id = %proposal_id))]
    async fn selected_version(
        &self,
        proposal_id: ProposalId,
    ) -> VellumResult<Option<ProposalVersion>> {
        with_conn(&self.pool, move |conn| {
            let selected = version_heads::table
                .find(proposal_id.0)
                .select(version_heads::selected_version_id)
                .first::<Option<i64>>(conn)
                .optional()?
                .flatten();
            selected
                .map(|id| load(conn, VersionId(id)))
                .transpose()
        })
        .await
    }

    #[instrument(skip(self), fields(version_id = %id))]
    async fn children(&self, id: VersionId) -> VellumResult<Vec<ProposalVersion>> {
        with_conn(&self.pool, move |conn| {
            load(conn, id)?;
            into_versions(
                proposal_versions::table
                    .filter(proposal_versions::parent_version_id.eq(id.0))
                    .order(proposal_versions::version_number.asc())
                    .select(VersionRow::as_select())
                    .load(conn)?,
            )
        })
        .await
    }
}
