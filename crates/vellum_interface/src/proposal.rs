//! Access to proposal records owned by the CRUD layer.

use async_trait::async_trait;
use vellum_core::{Proposal, ProposalId, ProposalStatus};
use vellum_error::VellumResult;

/// Read and status-update access to proposals.
#[async_trait]
pub trait ProposalSource: Send + Sync {
    /// Load a proposal, `NotFound` when it does not exist.
    async fn get_proposal(&self, id: ProposalId) -> VellumResult<Proposal>;

    /// Update the status of a proposal.
    async fn set_status(&self, id: ProposalId, status: ProposalStatus) -> VellumResult<()>;
}
