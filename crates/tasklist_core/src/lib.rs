//! Core domain logic for the task list app.
//! This crate is the single source of truth for task storage and queries.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod observe;
pub mod service;
pub mod store;

pub use config::CoreConfig;
pub use logging::{init_logging, logging_status, LogLevel, LogSettings, LoggingError};
pub use model::item::{is_entry_valid, Item, ItemId, Priority, TaskDuration, UnknownDurationTag};
pub use observe::{Detacher, Subject, Subscription};
pub use service::task_service::{ServiceError, ServiceResult, TaskService, TaskView};
pub use service::PendingWrite;
pub use store::item_store::{ItemStore, SqliteItemStore, StoreError, StoreResult};
pub use store::query::ItemQuery;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
