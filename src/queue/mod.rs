//! Priority scheduling primitives.
//!
//! A generic comparator-driven binary heap plus an id-indexed variant
//! used by the router as its pending-delivery arena. Independent of
//! messaging semantics.

mod heap;
mod indexed;

pub use heap::{Comparator, PriorityQueue};
pub use indexed::{IndexedPriorityQueue, KeyFn};

use std::sync::Arc;

use crate::protocol::Priority;

/// Comparator ranking higher [`Priority`] tiers first.
///
/// Equal tiers dequeue in unspecified order.
pub fn priority_comparator<T, F>(priority_of: F) -> Comparator<T>
where
    F: Fn(&T) -> Priority + Send + Sync + 'static,
{
    Arc::new(move |a, b| priority_of(b).cmp(&priority_of(a)))
}
