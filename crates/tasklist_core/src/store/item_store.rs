//! `ItemStore` contract and its SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/update/delete plus snapshot and live reads over `item`.
//! - Re-evaluate live queries after each effective write.
//!
//! # Invariants
//! - The connection and the live-query registry share one lock, so a
//!   subscriber never misses a write that lands after its first emission.
//! - Read paths reject invalid persisted state instead of masking it.
//! - A live query that fails to recompute after a write is logged and
//!   skipped for that write only; the write still succeeds and the
//!   subscriber stays attached until the next effective write.
//! - Subjects without subscribers are pruned on every write and every
//!   new subscription.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::item::{Item, ItemId, Priority, TaskDuration};
use crate::observe::{Subject, Subscription};
use crate::store::query::{ItemQuery, ITEM_SELECT_SQL};
use log::{debug, error, info};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const ITEM_TABLE: &str = "item";
const REQUIRED_ITEM_COLUMNS: &[&str] = &["id", "name", "priority", "duration", "isDone"];

pub type StoreResult<T> = Result<T, StoreError>;

/// Store error for task persistence and query operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    LockPoisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it through db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
            Self::LockPoisoned => write!(f, "item store lock poisoned by a panicked writer"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query and mutation surface over the task collection.
///
/// Live reads return a [`Subscription`] that yields the current result first
/// and a fresh result after every write that changed the table.
pub trait ItemStore: Send + Sync {
    /// Inserts `item`. Returns the assigned id, or `None` when an item with
    /// the same id already exists and the insert was ignored.
    fn insert(&self, item: &Item) -> StoreResult<Option<ItemId>>;
    /// Replaces the stored record with `item.id`. Returns whether a row matched.
    fn update(&self, item: &Item) -> StoreResult<bool>;
    /// Removes the record with `item.id`. Returns whether a row matched.
    fn delete(&self, item: &Item) -> StoreResult<bool>;
    fn find(&self, id: ItemId) -> StoreResult<Option<Item>>;
    fn fetch(&self, query: ItemQuery) -> StoreResult<Vec<Item>>;
    fn observe_item(&self, id: ItemId) -> StoreResult<Subscription<Option<Item>>>;
    fn observe(&self, query: ItemQuery) -> StoreResult<Subscription<Vec<Item>>>;

    fn get_by_id(&self, id: ItemId) -> StoreResult<Subscription<Option<Item>>> {
        self.observe_item(id)
    }

    fn get_all(&self) -> StoreResult<Subscription<Vec<Item>>> {
        self.observe(ItemQuery::All)
    }

    fn get_by_duration(&self, duration: TaskDuration) -> StoreResult<Subscription<Vec<Item>>> {
        self.observe(ItemQuery::ByDuration(duration))
    }

    fn get_by_duration_undone(
        &self,
        duration: TaskDuration,
    ) -> StoreResult<Subscription<Vec<Item>>> {
        self.observe(ItemQuery::ByDurationUndone(duration))
    }

    fn get_done_by_duration(
        &self,
        duration: TaskDuration,
    ) -> StoreResult<Subscription<Vec<Item>>> {
        self.observe(ItemQuery::DoneByDuration(duration))
    }

    fn get_high_priority_by_duration(
        &self,
        duration: TaskDuration,
    ) -> StoreResult<Subscription<Vec<Item>>> {
        self.observe(ItemQuery::HighPriorityByDuration(duration))
    }

    fn get_by_duration_sorted_by_priority(
        &self,
        duration: TaskDuration,
    ) -> StoreResult<Subscription<Vec<Item>>> {
        self.observe(ItemQuery::ByDurationSortedByPriority(duration))
    }
}

#[derive(Default)]
struct LiveQueries {
    lists: HashMap<ItemQuery, Subject<Vec<Item>>>,
    items: HashMap<ItemId, Subject<Option<Item>>>,
}

impl LiveQueries {
    fn prune(&mut self) {
        self.lists.retain(|_, subject| subject.has_subscribers());
        self.items.retain(|_, subject| subject.has_subscribers());
    }
}

struct StoreState {
    conn: Connection,
    live: LiveQueries,
}

impl StoreState {
    /// Recomputes every subscribed query and pushes the result.
    ///
    /// Runs while the write lock is held, which orders emissions per
    /// subscriber. A failed recompute skips that subject only.
    fn publish_changes(&mut self) {
        let Self { conn, live } = self;

        for (query, subject) in &live.lists {
            if !subject.has_subscribers() {
                continue;
            }
            match query_items(conn, *query) {
                Ok(items) => {
                    subject.publish(items);
                }
                Err(err) => error!(
                    "event=live_query_refresh module=store status=error query={} error={}",
                    query.label(),
                    err
                ),
            }
        }

        for (id, subject) in &live.items {
            if !subject.has_subscribers() {
                continue;
            }
            match find_item(conn, *id) {
                Ok(item) => {
                    subject.publish(item);
                }
                Err(err) => error!(
                    "event=live_query_refresh module=store status=error query=by_id item_id={} error={}",
                    id, err
                ),
            }
        }

        live.prune();
    }
}

/// SQLite-backed item store.
///
/// Owns its connection behind a mutex, so all writes are serialized.
pub struct SqliteItemStore {
    state: Mutex<StoreState>,
}

impl SqliteItemStore {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not current.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when `item` is
    ///   absent or incomplete.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            state: Mutex::new(StoreState {
                conn,
                live: LiveQueries::default(),
            }),
        })
    }

    /// Opens a database file, applying migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Number of live subscribers across all queries.
    pub fn live_subscriber_count(&self) -> StoreResult<usize> {
        let state = self.lock_state()?;
        let lists: usize = state.live.lists.values().map(Subject::subscriber_count).sum();
        let items: usize = state.live.items.values().map(Subject::subscriber_count).sum();
        Ok(lists + items)
    }

    /// Number of queries currently holding a subject in the registry.
    pub fn live_query_count(&self) -> StoreResult<usize> {
        let state = self.lock_state()?;
        Ok(state.live.lists.len() + state.live.items.len())
    }

    fn lock_state(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| {
            error!("event=store_lock module=store status=error error_code=lock_poisoned");
            StoreError::LockPoisoned
        })
    }
}

impl ItemStore for SqliteItemStore {
    fn insert(&self, item: &Item) -> StoreResult<Option<ItemId>> {
        let mut state = self.lock_state()?;
        let changed = state.conn.execute(
            "INSERT OR IGNORE INTO item (
                id,
                name,
                priority,
                duration,
                isDone
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                item.id,
                item.name.as_str(),
                item.priority.ordinal(),
                item.duration.as_tag(),
                bool_to_int(item.is_done),
            ],
        )?;

        if changed == 0 {
            debug!(
                "event=item_insert module=store status=noop reason=id_conflict item_id={:?}",
                item.id
            );
            return Ok(None);
        }

        let id = state.conn.last_insert_rowid();
        info!(
            "event=item_insert module=store status=ok item_id={} duration={}",
            id, item.duration
        );
        state.publish_changes();
        Ok(Some(id))
    }

    fn update(&self, item: &Item) -> StoreResult<bool> {
        let Some(id) = item.id else {
            debug!("event=item_update module=store status=noop reason=unassigned_id");
            return Ok(false);
        };

        let mut state = self.lock_state()?;
        let changed = state.conn.execute(
            "UPDATE item
             SET
                name = ?1,
                priority = ?2,
                duration = ?3,
                isDone = ?4
             WHERE id = ?5;",
            params![
                item.name.as_str(),
                item.priority.ordinal(),
                item.duration.as_tag(),
                bool_to_int(item.is_done),
                id,
            ],
        )?;

        if changed == 0 {
            debug!(
                "event=item_update module=store status=noop reason=not_found item_id={}",
                id
            );
            return Ok(false);
        }

        info!(
            "event=item_update module=store status=ok item_id={} is_done={}",
            id, item.is_done
        );
        state.publish_changes();
        Ok(true)
    }

    fn delete(&self, item: &Item) -> StoreResult<bool> {
        let Some(id) = item.id else {
            debug!("event=item_delete module=store status=noop reason=unassigned_id");
            return Ok(false);
        };

        let mut state = self.lock_state()?;
        let changed = state
            .conn
            .execute("DELETE FROM item WHERE id = ?1;", [id])?;

        if changed == 0 {
            debug!(
                "event=item_delete module=store status=noop reason=not_found item_id={}",
                id
            );
            return Ok(false);
        }

        info!("event=item_delete module=store status=ok item_id={}", id);
        state.publish_changes();
        Ok(true)
    }

    fn find(&self, id: ItemId) -> StoreResult<Option<Item>> {
        let state = self.lock_state()?;
        find_item(&state.conn, id)
    }

    fn fetch(&self, query: ItemQuery) -> StoreResult<Vec<Item>> {
        let state = self.lock_state()?;
        query_items(&state.conn, query)
    }

    fn observe_item(&self, id: ItemId) -> StoreResult<Subscription<Option<Item>>> {
        let mut state = self.lock_state()?;
        let current = find_item(&state.conn, id)?;
        state.live.prune();
        let subscription = state
            .live
            .items
            .entry(id)
            .or_default()
            .subscribe(current);
        debug!(
            "event=live_query_subscribe module=store status=ok query=by_id item_id={} subscription_id={}",
            id,
            subscription.id()
        );
        Ok(subscription)
    }

    fn observe(&self, query: ItemQuery) -> StoreResult<Subscription<Vec<Item>>> {
        let mut state = self.lock_state()?;
        let current = query_items(&state.conn, query)?;
        state.live.prune();
        let subscription = state
            .live
            .lists
            .entry(query)
            .or_default()
            .subscribe(current);
        debug!(
            "event=live_query_subscribe module=store status=ok query={} subscription_id={}",
            query.label(),
            subscription.id()
        );
        Ok(subscription)
    }
}

fn find_item(conn: &Connection, id: ItemId) -> StoreResult<Option<Item>> {
    let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_item_row(row)?));
    }
    Ok(None)
}

fn query_items(conn: &Connection, query: ItemQuery) -> StoreResult<Vec<Item>> {
    let (sql, bind_values) = query.to_sql();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut items = Vec::new();

    while let Some(row) = rows.next()? {
        items.push(parse_item_row(row)?);
    }

    Ok(items)
}

fn parse_item_row(row: &Row<'_>) -> StoreResult<Item> {
    let id: ItemId = row.get("id")?;

    let priority_value: i64 = row.get("priority")?;
    let priority = Priority::from_ordinal(priority_value).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid priority `{priority_value}` in item.priority (id={id})"
        ))
    })?;

    let duration_text: String = row.get("duration")?;
    let duration = TaskDuration::from_tag(&duration_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid duration `{duration_text}` in item.duration (id={id})"
        ))
    })?;

    let is_done = match row.get::<_, i64>("isDone")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid isDone value `{other}` in item.isDone (id={id})"
            )));
        }
    };

    Ok(Item {
        id: Some(id),
        name: row.get("name")?,
        priority,
        duration,
        is_done,
    })
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [ITEM_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Err(StoreError::MissingRequiredTable(ITEM_TABLE));
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let columns = stmt
        .query_map([ITEM_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(missing) = REQUIRED_ITEM_COLUMNS
        .iter()
        .find(|required| !columns.iter().any(|column| column == *required))
    {
        return Err(StoreError::MissingRequiredColumn {
            table: ITEM_TABLE,
            column: missing,
        });
    }

    Ok(())
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
