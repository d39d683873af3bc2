//! In-memory proposal source.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use vellum_core::{Proposal, ProposalId, ProposalStatus};
use vellum_error::{NotFoundError, NotFoundErrorKind, VellumResult};
use vellum_interface::ProposalSource;

/// Proposal records kept in a HashMap.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProposalSource {
    proposals: Arc<RwLock<HashMap<ProposalId, Proposal>>>,
}

impl InMemoryProposalSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a proposal.
    pub async fn insert(&self, proposal: Proposal) {
        self.proposals.write().await.insert(proposal.id, proposal);
    }
}

#[async_trait]
impl ProposalSource for InMemoryProposalSource {
    async fn get_proposal(&self, id: ProposalId) -> VellumResult<Proposal> {
        self.proposals
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Proposal(id.0)).into())
    }

    async fn set_status(&self, id: ProposalId, status: ProposalStatus) -> VellumResult<()> {
        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::new(NotFoundErrorKind::Proposal(id.0)))?;
        debug!(proposal_id = %id, from = %proposal.status, to = %status, "Proposal status changed");
        proposal.status = status;
        Ok(())
    }
}
