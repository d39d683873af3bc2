//! PostgreSQL implementation of ProposalSource.

use crate::connection::{PgPool, with_conn};
use crate::rows::ProposalRow;
use crate::schema::proposals;
use async_trait::async_trait;
use diesel::prelude::*;
use tracing::instrument;
use vellum_core::{Proposal, ProposalId, ProposalStatus};
use vellum_error::{NotFoundError, NotFoundErrorKind, VellumResult};
use vellum_interface::ProposalSource;

/// Reads proposals and updates their status in the `proposals` table.
#[derive(Clone)]
pub struct PostgresProposalSource {
    pool: PgPool,
}

impl PostgresProposalSource {
    /// Create a source over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProposalSource for PostgresProposalSource {
    #[instrument(skip(self), fields(proposal_id = %id))]
    async fn get_proposal(&self, id: ProposalId) -> VellumResult<Proposal> {
        with_conn(&self.pool, move |conn| {
            let row = proposals::table
                .find(id.0)
                .select(ProposalRow::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Proposal(id.0)))?;
            Ok(Proposal::try_from(row)?)
        })
        .await
    }

    #[instrument(skip(self), fields(proposal_id = %id, status = %status))]
    async fn set_status(&self, id: ProposalId, status: ProposalStatus) -> VellumResult<()> {
        with_conn(&self.pool, move |conn| {
            let updated = diesel::update(proposals::table.find(id.0))
                .set((
                    proposals::status.eq(status.to_string()),
                    proposals::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Err(NotFoundError::new(NotFoundErrorKind::Proposal(id.0)).into());
            }
            Ok(())
        })
        .await
    }
}
