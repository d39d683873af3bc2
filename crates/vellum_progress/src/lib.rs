//! Progress fan-out for proposal generation.
//!
//! [`ProgressHub`] keeps one unbounded queue per subscriber, scoped by
//! proposal. Publishing never blocks on a slow subscriber, and a subscriber
//! that went away is pruned on the next publish. [`DisabledPublisher`]
//! discards every event.

mod disabled;
mod hub;

pub use disabled::DisabledPublisher;
pub use hub::{ProgressHub, ProgressSubscription};
