//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose task use-cases to Dart via FRB as plain sync calls.
//! - Push live task screens to Dart streams so the UI never polls.
//! - Enforce entry validation and parse raw UI values before they reach
//!   the core service.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - One task session (service + store) is shared per process and opened
//!   lazily from `TASKLIST_DB_PATH`.
//! - Live watches end when their sink is closed or the session is closed.

use log::{debug, warn};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use tasklist_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, is_entry_valid,
    ping as ping_inner, CoreConfig, Item, ItemId, LogSettings, Priority, SqliteItemStore,
    Subscription, TaskDuration, TaskService, TaskView,
};

type Session = TaskService<SqliteItemStore>;

const WATCH_THREAD_NAME: &str = "tasklist-watch";

static SESSION: OnceLock<Mutex<Option<Session>>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and an error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match LogSettings::parse(level.as_str(), log_dir.as_str())
        .and_then(|settings| init_logging_inner(&settings))
    {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Task row returned to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: i64,
    pub name: String,
    /// Priority ordinal: 1=high, 2=medium, 3=low, 4=done.
    pub priority: i64,
    /// Duration tag: `day|week|month|year`.
    pub duration: String,
    pub is_done: bool,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    pub ok: bool,
    /// Id of the affected task, when one is known.
    pub item_id: Option<i64>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>, item_id: Option<ItemId>) -> Self {
        Self {
            ok: true,
            item_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            item_id: None,
            message: message.into(),
        }
    }
}

/// List response envelope for one screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    pub ok: bool,
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Returns whether `name` can be saved as a task name.
#[flutter_rust_bridge::frb(sync)]
pub fn task_is_entry_valid(name: String) -> bool {
    is_entry_valid(name.as_str())
}

/// Creates a task from the add form.
///
/// Leading whitespace is dropped from `name`; blank names are rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn task_add(name: String, priority: i64, duration: String) -> TaskActionResponse {
    if !is_entry_valid(name.as_str()) {
        return TaskActionResponse::failure("task_add failed: task name cannot be blank");
    }
    let (priority, duration) = match parse_fields(priority, duration.as_str()) {
        Ok(fields) => fields,
        Err(err) => return TaskActionResponse::failure(format!("task_add failed: {err}")),
    };

    let name = name.trim_start().to_string();
    match with_session(|service| {
        service
            .add_new_item(name, priority, duration)
            .and_then(|pending| pending.wait())
            .map_err(|err| err.to_string())
    }) {
        Ok(Some(id)) => TaskActionResponse::success("Task created.", Some(id)),
        Ok(None) => TaskActionResponse::failure("task_add failed: insert was ignored"),
        Err(err) => TaskActionResponse::failure(format!("task_add failed: {err}")),
    }
}

/// Replaces a task from the edit form. The task becomes not-done.
#[flutter_rust_bridge::frb(sync)]
pub fn task_update(id: i64, name: String, priority: i64, duration: String) -> TaskActionResponse {
    if !is_entry_valid(name.as_str()) {
        return TaskActionResponse::failure("task_update failed: task name cannot be blank");
    }
    let (priority, duration) = match parse_fields(priority, duration.as_str()) {
        Ok(fields) => fields,
        Err(err) => return TaskActionResponse::failure(format!("task_update failed: {err}")),
    };

    match with_session(|service| {
        service
            .update_item(id, name, priority, duration)
            .and_then(|pending| pending.wait())
            .map_err(|err| err.to_string())
    }) {
        Ok(true) => TaskActionResponse::success("Task updated.", Some(id)),
        Ok(false) => TaskActionResponse::success("Task not found; nothing updated.", None),
        Err(err) => TaskActionResponse::failure(format!("task_update failed: {err}")),
    }
}

/// Marks a task as done.
#[flutter_rust_bridge::frb(sync)]
pub fn task_mark_done(id: i64) -> TaskActionResponse {
    match with_existing(id, |service, item| service.mark_done(item)) {
        Ok(true) => TaskActionResponse::success("Task completed.", Some(id)),
        Ok(false) => TaskActionResponse::success("Task not found; nothing completed.", None),
        Err(err) => TaskActionResponse::failure(format!("task_mark_done failed: {err}")),
    }
}

/// Deletes a task.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(id: i64) -> TaskActionResponse {
    match with_existing(id, |service, item| service.delete_item(item)) {
        Ok(true) => TaskActionResponse::success("Task deleted.", Some(id)),
        Ok(false) => TaskActionResponse::success("Task not found; nothing deleted.", None),
        Err(err) => TaskActionResponse::failure(format!("task_delete failed: {err}")),
    }
}

/// Loads one task for the edit form. Returns `None` when absent or on error.
#[flutter_rust_bridge::frb(sync)]
pub fn task_get(id: i64) -> Option<TaskItem> {
    match with_session(|service| service.find(id).map_err(|err| err.to_string())) {
        Ok(item) => item.as_ref().and_then(to_task_item),
        Err(err) => {
            warn!(
                "event=ffi_task_get module=ffi status=error item_id={} error={}",
                id, err
            );
            None
        }
    }
}

/// Lists one screen by view label (`day`, `day_done`, `day_undone`,
/// `day_high_priority`, `day_sorted`, `week`, `month`, `year`, `all`).
#[flutter_rust_bridge::frb(sync)]
pub fn task_list(view: String) -> TaskListResponse {
    let Some(task_view) = TaskView::from_label(view.trim()) else {
        return list_failure(format!("task_list failed: unknown view `{view}`"));
    };

    match with_session(|service| service.snapshot(task_view).map_err(|err| err.to_string())) {
        Ok(items) => list_response(&items),
        Err(err) => list_failure(format!("task_list failed: {err}")),
    }
}

/// Streams one screen by view label; see `task_list` for labels.
///
/// The first event is the current list, then one event per effective
/// write. A failure is reported as a single `ok: false` event.
#[cfg(feature = "frb-codegen")]
pub fn task_watch(view: String, sink: crate::frb_generated::StreamSink<TaskListResponse>) {
    let failure_sink = sink.clone();
    if let Err(err) = watch_view(view.as_str(), move |response| sink.add(response).is_ok()) {
        let _ = failure_sink.add(list_failure(format!("task_watch failed: {err}")));
    }
}

/// Streams one task for the edit form; emits `None` once it is deleted.
#[cfg(feature = "frb-codegen")]
pub fn task_watch_item(id: i64, sink: crate::frb_generated::StreamSink<Option<TaskItem>>) {
    if let Err(err) = watch_item(id, move |item| sink.add(item).is_ok()) {
        warn!(
            "event=ffi_task_watch_item module=ffi status=error item_id={} error={}",
            id, err
        );
    }
}

/// Subscribes `sink` to one screen and forwards every emission on a
/// background thread.
///
/// `sink` returns `false` once its receiver is gone, which ends the watch.
#[flutter_rust_bridge::frb(ignore)]
pub fn watch_view(
    view: &str,
    sink: impl Fn(TaskListResponse) -> bool + Send + 'static,
) -> Result<(), String> {
    let task_view =
        TaskView::from_label(view.trim()).ok_or_else(|| format!("unknown view `{view}`"))?;
    let subscription =
        with_session(|service| service.view(task_view).map_err(|err| err.to_string()))?;
    forward(subscription, move |items| sink(list_response(&items)))
}

/// Subscribes `sink` to one task and forwards every emission on a
/// background thread.
#[flutter_rust_bridge::frb(ignore)]
pub fn watch_item(
    id: i64,
    sink: impl Fn(Option<TaskItem>) -> bool + Send + 'static,
) -> Result<(), String> {
    let subscription = with_session(|service| service.retrieve(id).map_err(|err| err.to_string()))?;
    forward(subscription, move |item| sink(item.as_ref().and_then(to_task_item)))
}

/// Disposes the shared session, waiting for queued writes.
///
/// The next task call reopens it.
#[flutter_rust_bridge::frb(sync)]
pub fn task_session_close() -> String {
    let closed = match session().lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => return "task session lock poisoned".to_string(),
    };
    if let Some(service) = closed {
        service.close();
    }
    String::new()
}

fn parse_fields(priority: i64, duration: &str) -> Result<(Priority, TaskDuration), String> {
    let priority = Priority::from_ordinal(priority)
        .ok_or_else(|| format!("unknown priority `{priority}`; expected 1|2|3|4"))?;
    let duration = duration.parse::<TaskDuration>().map_err(|err| err.to_string())?;
    Ok((priority, duration))
}

fn forward<T: Send + 'static>(
    subscription: Subscription<T>,
    push: impl Fn(T) -> bool + Send + 'static,
) -> Result<(), String> {
    let subscription_id = subscription.id();
    thread::Builder::new()
        .name(WATCH_THREAD_NAME.to_string())
        .spawn(move || {
            while let Ok(value) = subscription.recv() {
                if !push(value) {
                    break;
                }
            }
            debug!(
                "event=ffi_watch_end module=ffi status=ok subscription_id={}",
                subscription_id
            );
        })
        .map(|_| ())
        .map_err(|err| format!("watch thread spawn failed: {err}"))
}

fn list_response(items: &[Item]) -> TaskListResponse {
    let items = items.iter().filter_map(to_task_item).collect::<Vec<_>>();
    let message = if items.is_empty() {
        "No tasks.".to_string()
    } else {
        format!("Found {} task(s).", items.len())
    };
    TaskListResponse {
        ok: true,
        items,
        message,
    }
}

fn list_failure(message: String) -> TaskListResponse {
    TaskListResponse {
        ok: false,
        items: Vec::new(),
        message,
    }
}

fn session() -> &'static Mutex<Option<Session>> {
    SESSION.get_or_init(|| Mutex::new(None))
}

fn open_session() -> Result<Session, String> {
    let config = CoreConfig::from_env();
    let store = SqliteItemStore::open(&config.db_path)
        .map_err(|err| format!("task DB open failed: {err}"))?;
    TaskService::new(Arc::new(store)).map_err(|err| format!("task service init failed: {err}"))
}

fn with_session<T>(f: impl FnOnce(&Session) -> Result<T, String>) -> Result<T, String> {
    let mut guard = session()
        .lock()
        .map_err(|_| "task session lock poisoned".to_string())?;
    if guard.is_none() {
        *guard = Some(open_session()?);
    }
    match guard.as_ref() {
        Some(service) => f(service),
        None => Err("task session unavailable".to_string()),
    }
}

fn with_existing(
    id: ItemId,
    f: impl FnOnce(&Session, &Item) -> tasklist_core::ServiceResult<tasklist_core::PendingWrite<bool>>,
) -> Result<bool, String> {
    with_session(|service| {
        let Some(item) = service.find(id).map_err(|err| err.to_string())? else {
            return Ok(false);
        };
        f(service, &item)
            .and_then(|pending| pending.wait())
            .map_err(|err| err.to_string())
    })
}

fn to_task_item(item: &Item) -> Option<TaskItem> {
    Some(TaskItem {
        id: item.id?,
        name: item.name.clone(),
        priority: item.priority.ordinal(),
        duration: item.duration.as_tag().to_string(),
        is_done: item.is_done,
    })
}
