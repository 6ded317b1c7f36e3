//! Task domain model.
//!
//! # Responsibility
//! - Define the single persisted task record and its enumerations.
//!
//! # Invariants
//! - Every stored task is identified by a store-assigned `ItemId`.
//! - A task belongs to exactly one duration bucket at any time.

pub mod item;
