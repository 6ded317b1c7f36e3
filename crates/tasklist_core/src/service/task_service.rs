//! Task use-case service.
//!
//! # Responsibility
//! - Construct task records from caller input and forward them to the store.
//! - Run mutations on a background writer so callers never block on I/O.
//! - Expose one live view per task screen and release them on close.
//!
//! # Invariants
//! - `add_new_item`/`update_item` trust the caller to have checked
//!   `is_entry_valid`; no name validation happens here.
//! - `update_item` is a full-record replace, so `is_done` resets to false.
//! - On `close`, every subscription handed out by this service is
//!   disconnected after queued writes have been applied.

use crate::model::item::{self, Item, ItemId, Priority, TaskDuration};
use crate::observe::{Detacher, Subscription};
use crate::service::writer::{PendingWrite, WriteCommand, Writer};
use crate::store::item_store::{ItemStore, StoreError};
use crate::store::query::ItemQuery;
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for task use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Persistence-layer failure.
    Store(StoreError),
    /// The writer stopped before the request could run.
    Closed,
    /// The background writer thread could not be started.
    WriterSpawn(std::io::Error),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "task writer is not running"),
            Self::WriterSpawn(err) => write!(f, "failed to start task writer: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Closed => None,
            Self::WriterSpawn(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Pre-wired list views, one per task screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskView {
    /// Default day screen: unfinished day tasks.
    Day,
    DayDone,
    DayUndone,
    DayHighPriority,
    DaySorted,
    Week,
    Month,
    Year,
    All,
}

impl TaskView {
    pub const ALL: [TaskView; 9] = [
        Self::Day,
        Self::DayDone,
        Self::DayUndone,
        Self::DayHighPriority,
        Self::DaySorted,
        Self::Week,
        Self::Month,
        Self::Year,
        Self::All,
    ];

    /// Store query backing this view.
    pub fn query(self) -> ItemQuery {
        match self {
            Self::Day | Self::DayUndone => ItemQuery::ByDurationUndone(TaskDuration::Day),
            Self::DayDone => ItemQuery::DoneByDuration(TaskDuration::Day),
            Self::DayHighPriority => ItemQuery::HighPriorityByDuration(TaskDuration::Day),
            Self::DaySorted => ItemQuery::ByDurationSortedByPriority(TaskDuration::Day),
            Self::Week => ItemQuery::ByDuration(TaskDuration::Week),
            Self::Month => ItemQuery::ByDuration(TaskDuration::Month),
            Self::Year => ItemQuery::ByDuration(TaskDuration::Year),
            Self::All => ItemQuery::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::DayDone => "day_done",
            Self::DayUndone => "day_undone",
            Self::DayHighPriority => "day_high_priority",
            Self::DaySorted => "day_sorted",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.label() == value)
    }
}

/// Entry point for task callers.
///
/// Created once per UI session; `close` (or drop) stops the writer and
/// releases every subscription obtained through this instance.
pub struct TaskService<S: ItemStore + 'static> {
    store: Arc<S>,
    writer: Writer,
    subscriptions: Mutex<Vec<Detacher>>,
}

impl<S: ItemStore + 'static> TaskService<S> {
    /// Creates a service and starts its writer thread.
    pub fn new(store: Arc<S>) -> ServiceResult<Self> {
        let writer = Writer::spawn(Arc::clone(&store))?;
        Ok(Self {
            store,
            writer,
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// Returns true iff `name` is non-blank after trimming.
    pub fn is_entry_valid(&self, name: &str) -> bool {
        item::is_entry_valid(name)
    }

    /// Queues creation of a new, not-done task. The store assigns the id.
    pub fn add_new_item(
        &self,
        name: impl Into<String>,
        priority: Priority,
        duration: TaskDuration,
    ) -> ServiceResult<PendingWrite<Option<ItemId>>> {
        let (command, pending) = WriteCommand::insert(Item::new(name, priority, duration));
        self.writer.submit(command)?;
        Ok(pending)
    }

    /// Queues a full replacement of task `id`.
    ///
    /// The replacement is built fresh, so a done task becomes undone unless
    /// `mark_done` is called again.
    pub fn update_item(
        &self,
        id: ItemId,
        name: impl Into<String>,
        priority: Priority,
        duration: TaskDuration,
    ) -> ServiceResult<PendingWrite<bool>> {
        let (command, pending) =
            WriteCommand::update(Item::with_id(id, name, priority, duration));
        self.writer.submit(command)?;
        Ok(pending)
    }

    /// Queues an update of `item` with `is_done = true`.
    pub fn mark_done(&self, item: &Item) -> ServiceResult<PendingWrite<bool>> {
        let (command, pending) = WriteCommand::update(item.marked_done());
        self.writer.submit(command)?;
        Ok(pending)
    }

    pub fn delete_item(&self, item: &Item) -> ServiceResult<PendingWrite<bool>> {
        let (command, pending) = WriteCommand::delete(item.clone());
        self.writer.submit(command)?;
        Ok(pending)
    }

    /// Live stream of one task; emits `None` once it is deleted.
    pub fn retrieve(&self, id: ItemId) -> ServiceResult<Subscription<Option<Item>>> {
        let subscription = self.store.get_by_id(id)?;
        self.track(subscription.detacher());
        Ok(subscription)
    }

    /// Live stream of one task screen.
    pub fn view(&self, view: TaskView) -> ServiceResult<Subscription<Vec<Item>>> {
        let subscription = self.store.observe(view.query())?;
        self.track(subscription.detacher());
        debug!(
            "event=view_subscribe module=service status=ok view={} subscription_id={}",
            view.label(),
            subscription.id()
        );
        Ok(subscription)
    }

    /// Current contents of one task screen, without subscribing.
    pub fn snapshot(&self, view: TaskView) -> ServiceResult<Vec<Item>> {
        Ok(self.store.fetch(view.query())?)
    }

    /// Current state of one task, without subscribing.
    pub fn find(&self, id: ItemId) -> ServiceResult<Option<Item>> {
        Ok(self.store.find(id)?)
    }

    /// Stops the writer after queued writes finish and releases every
    /// subscription handed out by this service.
    pub fn close(self) {
        self.release();
    }

    fn track(&self, detacher: Detacher) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions.retain(Detacher::is_attached);
        subscriptions.push(detacher);
    }

    fn release(&self) {
        self.writer.shutdown();

        let detachers = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let released = detachers.iter().filter(|detacher| detacher.detach()).count();
        if !detachers.is_empty() {
            info!(
                "event=service_close module=service status=ok released_subscriptions={}",
                released
            );
        }
    }
}

impl<S: ItemStore + 'static> Drop for TaskService<S> {
    fn drop(&mut self) {
        self.release();
    }
}
