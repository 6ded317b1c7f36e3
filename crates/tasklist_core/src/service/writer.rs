//! Background writer that serializes mutations against one store.
//!
//! # Invariants
//! - Commands apply in submission order on a single thread.
//! - Commands queued before shutdown are drained before the thread exits.

use crate::model::item::{Item, ItemId};
use crate::service::task_service::{ServiceError, ServiceResult};
use crate::store::item_store::{ItemStore, StoreResult};
use log::{error, info};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

const WRITER_THREAD_NAME: &str = "tasklist-writer";

pub(crate) enum WriteCommand {
    Insert {
        item: Item,
        reply: Sender<StoreResult<Option<ItemId>>>,
    },
    Update {
        item: Item,
        reply: Sender<StoreResult<bool>>,
    },
    Delete {
        item: Item,
        reply: Sender<StoreResult<bool>>,
    },
}

impl WriteCommand {
    pub(crate) fn insert(item: Item) -> (Self, PendingWrite<Option<ItemId>>) {
        let (reply, pending) = PendingWrite::channel();
        (Self::Insert { item, reply }, pending)
    }

    pub(crate) fn update(item: Item) -> (Self, PendingWrite<bool>) {
        let (reply, pending) = PendingWrite::channel();
        (Self::Update { item, reply }, pending)
    }

    pub(crate) fn delete(item: Item) -> (Self, PendingWrite<bool>) {
        let (reply, pending) = PendingWrite::channel();
        (Self::Delete { item, reply }, pending)
    }

    fn apply<S: ItemStore + ?Sized>(self, store: &S) {
        // A dropped `PendingWrite` means the caller chose fire-and-forget.
        match self {
            Self::Insert { item, reply } => {
                let result = store.insert(&item);
                log_failure("item_insert", &result);
                let _ = reply.send(result);
            }
            Self::Update { item, reply } => {
                let result = store.update(&item);
                log_failure("item_update", &result);
                let _ = reply.send(result);
            }
            Self::Delete { item, reply } => {
                let result = store.delete(&item);
                log_failure("item_delete", &result);
                let _ = reply.send(result);
            }
        }
    }
}

fn log_failure<T>(event: &str, result: &StoreResult<T>) {
    if let Err(err) = result {
        error!(
            "event={} module=service status=error error_code=storage_failure error={}",
            event, err
        );
    }
}

/// Outcome of a queued mutation.
///
/// Dropping it is allowed; the write still happens.
#[derive(Debug)]
pub struct PendingWrite<T> {
    receiver: Receiver<StoreResult<T>>,
}

impl<T> PendingWrite<T> {
    fn channel() -> (Sender<StoreResult<T>>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }

    /// Blocks until the writer has applied the mutation.
    ///
    /// # Errors
    /// - `ServiceError::Store` when persistence failed.
    /// - `ServiceError::Closed` when the writer stopped before applying it.
    pub fn wait(self) -> ServiceResult<T> {
        match self.receiver.recv() {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::Closed),
        }
    }
}

pub(crate) struct Writer {
    sender: Mutex<Option<Sender<WriteCommand>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Writer {
    pub(crate) fn spawn<S: ItemStore + 'static>(store: Arc<S>) -> ServiceResult<Self> {
        let (sender, receiver) = mpsc::channel::<WriteCommand>();
        let handle = thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || run_writer(store, receiver))
            .map_err(ServiceError::WriterSpawn)?;

        info!("event=writer_start module=service status=ok");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn submit(&self, command: WriteCommand) -> ServiceResult<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send(command).map_err(|_| ServiceError::Closed),
            None => Err(ServiceError::Closed),
        }
    }

    /// Closes the queue and waits for queued commands to finish.
    pub(crate) fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("event=writer_stop module=service status=error error_code=writer_panicked");
                return;
            }
        }
        info!("event=writer_stop module=service status=ok");
    }
}

fn run_writer<S: ItemStore>(store: Arc<S>, commands: Receiver<WriteCommand>) {
    for command in commands {
        command.apply(store.as_ref());
    }
}
