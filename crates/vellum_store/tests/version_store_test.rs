//! Tests for the in-memory version store invariants.

use futures::future::join_all;
use vellum_core::{
    BatchId, ModelId, ProposalId, ProposalRequest, ProposalVersion, ProviderKind, Rating,
    VersionContent, VersionStatus,
};
use vellum_error::{ConflictErrorKind, VellumErrorKind};
use vellum_interface::{NewBatch, NewVersion, VersionCompletion, VersionStore};
use vellum_store::InMemoryVersionStore;

fn batch(proposal: i64, models: usize) -> NewBatch {
    let versions = (0..models)
        .map(|i| NewVersion::new(ModelId(i as i64 + 1), format!("m{}", i + 1), ProviderKind::DeepSeek))
        .collect();
    NewBatch::new(
        ProposalId(proposal),
        BatchId::new_v4(),
        ProposalRequest::default(),
        versions,
    )
}

async fn complete(store: &InMemoryVersionStore, version: &ProposalVersion) -> ProposalVersion {
    store.mark_generating(version.id).await.expect("Starts");
    store
        .complete_version(
            version.id,
            VersionCompletion::new(
                VersionContent::new("s".into(), "o".into(), "full".into()),
                10,
                100,
            ),
        )
        .await
        .expect("Completes")
}

fn conflict_kind(err: &vellum_error::VellumError) -> Option<&ConflictErrorKind> {
    match err.kind() {
        VellumErrorKind::Conflict(e) => Some(&e.kind),
        _ => None,
    }
}

#[tokio::test]
async fn test_batch_numbers_are_contiguous_and_pending() {
    let store = InMemoryVersionStore::new();

    let first = store.create_batch(batch(1, 3)).await.expect("Creates");
    let second = store.create_batch(batch(1, 2)).await.expect("Creates");
    let other = store.create_batch(batch(2, 1)).await.expect("Creates");

    let numbers: Vec<_> = first.iter().chain(&second).map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(other[0].version_number, 1);
    assert!(first.iter().all(|v| v.status == VersionStatus::Pending));
    assert!(first.iter().all(|v| v.batch_id == first[0].batch_id));
    assert_ne!(first[0].batch_id, second[0].batch_id);
}

#[tokio::test]
async fn test_concurrent_batches_never_share_numbers() {
    let store = InMemoryVersionStore::new();

    let results = join_all((0..20).map(|_| {
        let store = store.clone();
        async move { store.create_batch(batch(7, 3)).await.expect("Creates") }
    }))
    .await;

    for created in &results {
        let numbers: Vec<_> = created.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers[1], numbers[0] + 1);
        assert_eq!(numbers[2], numbers[0] + 2);
    }
    let mut all: Vec<_> = store
        .list_versions(ProposalId(7))
        .await
        .expect("Lists")
        .iter()
        .map(|v| v.version_number)
        .collect();
    all.dedup();
    assert_eq!(all, (1..=60).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let store = InMemoryVersionStore::new();
    let err = store.create_batch(batch(1, 0)).await.expect_err("Empty");
    assert!(err.is_validation());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_non_terminal_parent_creates_nothing() {
    let store = InMemoryVersionStore::new();
    let parent = store.create_batch(batch(1, 1)).await.expect("Creates").remove(0);
    store.mark_generating(parent.id).await.expect("Starts");

    let err = store
        .create_batch(batch(1, 2).with_parent(parent.id, Some("more detail".into())))
        .await
        .expect_err("Parent in flight");

    assert!(matches!(
        conflict_kind(&err),
        Some(ConflictErrorKind::ParentNotTerminal { .. })
    ));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_parent_must_belong_to_proposal() {
    let store = InMemoryVersionStore::new();
    let parent = store.create_batch(batch(1, 1)).await.expect("Creates").remove(0);
    complete(&store, &parent).await;

    let err = store
        .create_batch(batch(2, 1).with_parent(parent.id, None))
        .await
        .expect_err("Wrong proposal");
    assert!(matches!(
        conflict_kind(&err),
        Some(ConflictErrorKind::ParentProposalMismatch { expected: 2, actual: 1, .. })
    ));

    let missing = store
        .create_batch(batch(1, 1).with_parent(vellum_core::VersionId(999), None))
        .await
        .expect_err("Missing parent");
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn test_child_records_parent_and_feedback() {
    let store = InMemoryVersionStore::new();
    let parent = store.create_batch(batch(1, 1)).await.expect("Creates").remove(0);
    store
        .fail_version(parent.id, "timeout".into(), Some(5))
        .await
        .expect("Fails");

    let child = store
        .create_batch(batch(1, 1).with_parent(parent.id, Some("shorter".into())))
        .await
        .expect("Failed parents can be iterated")
        .remove(0);

    assert_eq!(child.parent_version_id, Some(parent.id));
    assert_eq!(child.iteration_feedback.as_deref(), Some("shorter"));
    assert_eq!(child.version_number, 2);

    let children = store.children(parent.id).await.expect("Children");
    assert_eq!(children.len(), 1);
    let lineage = store.lineage(child.id).await.expect("Lineage");
    assert_eq!(
        lineage.iter().map(|v| v.id).collect::<Vec<_>>(),
        vec![parent.id, child.id]
    );
}

#[tokio::test]
async fn test_terminal_versions_cannot_change_status() {
    let store = InMemoryVersionStore::new();
    let version = store.create_batch(batch(1, 1)).await.expect("Creates").remove(0);
    complete(&store, &version).await;

    let err = store
        .fail_version(version.id, "late".into(), None)
        .await
        .expect_err("Already completed");
    assert!(matches!(
        conflict_kind(&err),
        Some(ConflictErrorKind::InvalidTransition { .. })
    ));
    assert!(store.mark_generating(version.id).await.is_err());

    let pending = store.create_batch(batch(1, 1)).await.expect("Creates").remove(0);
    let err = store
        .complete_version(
            pending.id,
            VersionCompletion::new(VersionContent::default(), 0, 0),
        )
        .await
        .expect_err("Pending cannot complete directly");
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_select_moves_single_selection() {
    let store = InMemoryVersionStore::new();
    let created = store.create_batch(batch(1, 3)).await.expect("Creates");
    let a = complete(&store, &created[0]).await;
    let b = complete(&store, &created[1]).await;

    store.select_version(a.id).await.expect("Selects a");
    store.select_version(b.id).await.expect("Selects b");

    let selected: Vec<_> = store
        .list_versions(ProposalId(1))
        .await
        .expect("Lists")
        .into_iter()
        .filter(|v| v.selected)
        .map(|v| v.id)
        .collect();
    assert_eq!(selected, vec![b.id]);
    assert_eq!(
        store.selected_version(ProposalId(1)).await.expect("Reads").map(|v| v.id),
        Some(b.id)
    );

    let again = store.select_version(b.id).await.expect_err("Already selected");
    assert!(matches!(conflict_kind(&again), Some(ConflictErrorKind::AlreadySelected(_))));

    let pending = store.select_version(created[2].id).await.expect_err("Pending");
    assert!(matches!(conflict_kind(&pending), Some(ConflictErrorKind::NotSelectable { .. })));
}

#[tokio::test]
async fn test_concurrent_selects_leave_one_selected() {
    let store = InMemoryVersionStore::new();
    let created = store.create_batch(batch(3, 8)).await.expect("Creates");
    for version in &created {
        complete(&store, version).await;
    }

    join_all(created.iter().map(|v| {
        let store = store.clone();
        let id = v.id;
        async move { store.select_version(id).await }
    }))
    .await;

    let selected = store
        .list_versions(ProposalId(3))
        .await
        .expect("Lists")
        .into_iter()
        .filter(|v| v.selected)
        .count();
    assert_eq!(selected, 1);
}

#[tokio::test]
async fn test_rating_requires_terminal_and_overwrites() {
    let store = InMemoryVersionStore::new();
    let version = store.create_batch(batch(1, 1)).await.expect("Creates").remove(0);

    let err = store
        .rate_version(version.id, Rating::new(3).expect("Valid"))
        .await
        .expect_err("Pending");
    assert!(matches!(conflict_kind(&err), Some(ConflictErrorKind::NotRatable { .. })));

    complete(&store, &version).await;
    store.rate_version(version.id, Rating::new(2).expect("Valid")).await.expect("Rates");
    let rated = store
        .rate_version(version.id, Rating::new(5).expect("Valid"))
        .await
        .expect("Re-rates");
    assert_eq!(rated.rating.map(|r| r.value()), Some(5));
}

#[tokio::test]
async fn test_lookups() {
    let store = InMemoryVersionStore::new();
    let created = store.create_batch(batch(1, 2)).await.expect("Creates");

    let reversed = store
        .get_versions(&[created[1].id, created[0].id])
        .await
        .expect("Both exist");
    assert_eq!(reversed[0].id, created[1].id);

    assert!(
        store
            .get_versions(&[created[0].id, vellum_core::VersionId(404)])
            .await
            .expect_err("One missing")
            .is_not_found()
    );

    let members = store.batch_versions(created[0].batch_id).await.expect("Batch");
    assert_eq!(members.len(), 2);
    assert!(store.batch_versions(BatchId::new_v4()).await.expect_err("Unknown").is_not_found());
    assert!(store.children(vellum_core::VersionId(404)).await.expect_err("Missing").is_not_found());
    assert_eq!(store.selected_version(ProposalId(1)).await.expect("Reads"), None);
}
