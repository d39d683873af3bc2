//! Delivery semantics of the progress hub.

use futures::StreamExt;
use std::time::Duration;
use vellum_core::{ProgressEvent, ProgressStage, ProposalId};
use vellum_error::PublishErrorKind;
use vellum_interface::ProgressSink;
use vellum_progress::{DisabledPublisher, ProgressHub};

fn event(proposal: i64, stage: ProgressStage, progress: u8) -> ProgressEvent {
    ProgressEvent::new(ProposalId(proposal), stage, progress, stage.to_string())
}

#[tokio::test]
async fn test_every_subscriber_receives_events_in_order() {
    let hub = ProgressHub::new();
    let mut first = hub.subscribe(ProposalId(1));
    let mut second = hub.subscribe_as("session-a", ProposalId(1));

    let delivered = hub
        .publish(event(1, ProgressStage::Connecting, 0))
        .await
        .expect("Both connected");
    assert_eq!(delivered, 2);
    hub.publish(event(1, ProgressStage::Generating, 5))
        .await
        .expect("Both connected");

    for subscription in [&mut first, &mut second] {
        assert_eq!(
            subscription.next().await.map(|e| e.stage),
            Some(ProgressStage::Connecting)
        );
        assert_eq!(
            subscription.next().await.map(|e| e.stage),
            Some(ProgressStage::Generating)
        );
    }
}

#[tokio::test]
async fn test_events_are_scoped_to_their_proposal() {
    let hub = ProgressHub::new();
    let mut other = hub.subscribe(ProposalId(2));

    let delivered = hub
        .publish(event(1, ProgressStage::Processing, 50))
        .await
        .expect("No subscribers is fine");
    assert_eq!(delivered, 0);
    assert!(other.try_recv().is_none());
}

#[tokio::test]
async fn test_late_subscribers_get_no_replay() {
    let hub = ProgressHub::new();
    hub.publish(event(1, ProgressStage::Connecting, 0))
        .await
        .expect("Publishes");

    let mut late = hub.subscribe(ProposalId(1));
    hub.publish(event(1, ProgressStage::Completed, 100))
        .await
        .expect("Publishes");

    let received = tokio::time::timeout(Duration::from_secs(1), late.recv())
        .await
        .expect("Event queued")
        .expect("Hub alive");
    assert_eq!(received.stage, ProgressStage::Completed);
    assert!(late.try_recv().is_none());
}

#[tokio::test]
async fn test_dropping_subscription_unsubscribes() {
    let hub = ProgressHub::new();
    let kept = hub.subscribe(ProposalId(1));
    let dropped = hub.subscribe(ProposalId(1));
    assert_eq!(hub.subscriber_count(ProposalId(1)), 2);

    drop(dropped);
    assert_eq!(hub.subscriber_count(ProposalId(1)), 1);

    let delivered = hub
        .publish(event(1, ProgressStage::Processing, 40))
        .await
        .expect("Dropped subscriber already removed");
    assert_eq!(delivered, 1);
    drop(kept);
    assert_eq!(hub.subscriber_count(ProposalId(1)), 0);
}

#[tokio::test]
async fn test_subscription_outliving_hub_ends_stream() {
    let hub = ProgressHub::new();
    let mut subscription = hub.subscribe(ProposalId(9));
    drop(hub);
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn test_slow_subscriber_does_not_block_publisher() {
    let hub = ProgressHub::new();
    let mut slow = hub.subscribe(ProposalId(1));

    for progress in 0..1000u32 {
        hub.publish(event(1, ProgressStage::Processing, (progress % 100) as u8))
            .await
            .expect("Unbounded queue");
    }
    let mut received = 0;
    while slow.try_recv().is_some() {
        received += 1;
    }
    assert_eq!(received, 1000);
}

#[tokio::test]
async fn test_disabled_publisher_accepts_everything() {
    let publisher = DisabledPublisher;
    let delivered = publisher
        .publish(event(1, ProgressStage::Error, 100))
        .await
        .expect("Never fails");
    assert_eq!(delivered, 0);
}

#[test]
fn test_subscriber_closed_error_names_proposal() {
    let kind = PublishErrorKind::SubscriberClosed {
        proposal: 4,
        subscriber: 11,
    };
    assert!(kind.to_string().contains("proposal 4"));
}

#[tokio::test]
async fn test_closed_subscriber_is_pruned_and_reported() {
    let hub = ProgressHub::new();
    let mut open = hub.subscribe(ProposalId(3));
    let mut closed = hub.subscribe(ProposalId(3));
    closed.close();

    let err = hub
        .publish(event(3, ProgressStage::Generating, 5))
        .await
        .expect_err("Closed subscriber reported");
    assert!(matches!(
        err.kind,
        PublishErrorKind::SubscriberClosed { proposal: 3, subscriber } if subscriber == closed.id()
    ));
    assert_eq!(hub.subscriber_count(ProposalId(3)), 1);
    assert!(open.try_recv().is_some());

    let delivered = hub
        .publish(event(3, ProgressStage::Completed, 100))
        .await
        .expect("Pruned on previous publish");
    assert_eq!(delivered, 1);
}
