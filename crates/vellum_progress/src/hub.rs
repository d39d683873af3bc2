//! In-process subscription hub.

use async_trait::async_trait;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, instrument, warn};
use vellum_core::{ProgressEvent, ProposalId};
use vellum_error::{PublishError, PublishErrorKind};
use vellum_interface::ProgressSink;

#[derive(Debug)]
struct Subscriber {
    id: u64,
    session: Option<String>,
    sender: UnboundedSender<ProgressEvent>,
}

#[derive(Debug, Default)]
struct HubInner {
    subscribers: Mutex<HashMap<ProposalId, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<ProposalId, Vec<Subscriber>>> {
        // Critical sections never panic, a poisoned map is still consistent.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, proposal_id: ProposalId, id: u64) {
        let mut subscribers = self.lock();
        if let Some(list) = subscribers.get_mut(&proposal_id) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subscribers.remove(&proposal_id);
            }
        }
    }
}

/// Fan-out of progress events to per-proposal subscribers.
///
/// # Examples
///
/// ```
/// use vellum_core::ProposalId;
/// use vellum_progress::ProgressHub;
///
/// let hub = ProgressHub::new();
/// let subscription = hub.subscribe(ProposalId(1));
/// assert_eq!(hub.subscriber_count(ProposalId(1)), 1);
/// drop(subscription);
/// assert_eq!(hub.subscriber_count(ProposalId(1)), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProgressHub {
    inner: Arc<HubInner>,
}

impl ProgressHub {
    /// Create a hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event published for `proposal_id` from now on.
    pub fn subscribe(&self, proposal_id: ProposalId) -> ProgressSubscription {
        self.register(proposal_id, None)
    }

    /// Subscribe on behalf of an authenticated session.
    pub fn subscribe_as(
        &self,
        session: impl Into<String>,
        proposal_id: ProposalId,
    ) -> ProgressSubscription {
        self.register(proposal_id, Some(session.into()))
    }

    /// Connected subscribers for a proposal.
    pub fn subscriber_count(&self, proposal_id: ProposalId) -> usize {
        self.inner
            .lock()
            .get(&proposal_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn register(&self, proposal_id: ProposalId, session: Option<String>) -> ProgressSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        debug!(proposal_id = %proposal_id, subscriber = id, session = ?session, "Subscribed to progress");
        self.inner
            .lock()
            .entry(proposal_id)
            .or_default()
            .push(Subscriber {
                id,
                session,
                sender,
            });
        ProgressSubscription {
            id,
            proposal_id,
            receiver,
            hub: Arc::downgrade(&self.inner),
        }
    }
}

#[async_trait]
impl ProgressSink for ProgressHub {
    #[instrument(skip(self, event), fields(proposal_id = %event.proposal_id, stage = %event.stage))]
    async fn publish(&self, event: ProgressEvent) -> Result<usize, PublishError> {
        let proposal_id = event.proposal_id;
        let mut subscribers = self.inner.lock();
        let Some(list) = subscribers.get_mut(&proposal_id) else {
            return Ok(0);
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for subscriber in list.iter() {
            if subscriber.sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!(subscriber = subscriber.id, session = ?subscriber.session, "Pruning closed subscriber");
                closed.push(subscriber.id);
            }
        }
        list.retain(|s| !closed.contains(&s.id));
        if list.is_empty() {
            subscribers.remove(&proposal_id);
        }

        match closed.first() {
            Some(&subscriber) => Err(PublishError::new(PublishErrorKind::SubscriberClosed {
                proposal: proposal_id.0,
                subscriber,
            })),
            None => Ok(delivered),
        }
    }
}

/// Stream of progress events for one proposal.
///
/// Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct ProgressSubscription {
    id: u64,
    proposal_id: ProposalId,
    receiver: UnboundedReceiver<ProgressEvent>,
    hub: Weak<HubInner>,
}

impl ProgressSubscription {
    /// Subscriber identifier, unique within its hub.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Proposal this subscription is scoped to.
    pub fn proposal_id(&self) -> ProposalId {
        self.proposal_id
    }

    /// Wait for the next event. Returns `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Refuse further events. Queued ones can still be drained; the hub
    /// prunes this subscriber on its next publish.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Take an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for ProgressSubscription {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.proposal_id, self.id);
            debug!(proposal_id = %self.proposal_id, subscriber = self.id, "Unsubscribed from progress");
        }
    }
}
