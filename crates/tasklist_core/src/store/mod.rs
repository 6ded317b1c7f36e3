//! Task persistence and live queries.
//!
//! # Responsibility
//! - Define the `ItemStore` contract used by the service layer.
//! - Keep SQL details and change propagation inside the store boundary.
//!
//! # Invariants
//! - Inserts with a colliding id are ignored, never surfaced as errors.
//! - Update/delete of a missing id is a silent no-op.
//! - Every write that changes rows re-pushes all live query results.

pub mod item_store;
pub mod query;
