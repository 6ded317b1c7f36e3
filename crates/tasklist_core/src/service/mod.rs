//! Task use-case services.
//!
//! # Responsibility
//! - Give UI/FFI callers one entry point that builds records, forwards
//!   mutations and exposes pre-wired live views.
//! - Keep callers decoupled from storage and threading details.

pub mod task_service;
mod writer;

pub use writer::PendingWrite;
