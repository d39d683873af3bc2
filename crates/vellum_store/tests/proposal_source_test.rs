//! Tests for the in-memory proposal source.

use vellum_core::{Proposal, ProposalId, ProposalStatus};
use vellum_interface::ProposalSource;
use vellum_store::InMemoryProposalSource;

#[tokio::test]
async fn test_status_updates_are_visible() {
    let source = InMemoryProposalSource::new();
    source
        .insert(Proposal::new(
            ProposalId(1),
            "Payments hub".into(),
            "Acme".into(),
            "Real-time settlement".into(),
            ProposalStatus::Draft,
        ))
        .await;

    source
        .set_status(ProposalId(1), ProposalStatus::Generating)
        .await
        .expect("Updates");

    let proposal = source.get_proposal(ProposalId(1)).await.expect("Exists");
    assert_eq!(proposal.status, ProposalStatus::Generating);
}

#[tokio::test]
async fn test_missing_proposal_is_not_found() {
    let source = InMemoryProposalSource::new();
    assert!(source.get_proposal(ProposalId(5)).await.expect_err("Missing").is_not_found());
    assert!(
        source
            .set_status(ProposalId(5), ProposalStatus::Failed)
            .await
            .expect_err("Missing")
            .is_not_found()
    );
}
