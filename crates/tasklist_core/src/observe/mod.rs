//! Push-based observation of query results.
//!
//! # Responsibility
//! - Fan out freshly computed query results to every live subscriber.
//! - Give callers explicit cancellation over what they subscribed to.
//!
//! # Invariants
//! - A subscriber always receives the current value first.
//! - Emissions on one subscription arrive in publish order.

mod subject;

pub use subject::{Detacher, Subject, Subscription, SubscriptionId};
