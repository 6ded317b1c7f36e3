use rusqlite::Connection;
use std::sync::mpsc::TryRecvError;
use tasklist_core::db::migrations::latest_version;
use tasklist_core::db::open_db_in_memory;
use tasklist_core::{
    Item, ItemId, ItemQuery, ItemStore, Priority, SqliteItemStore, StoreError, TaskDuration,
};

fn store() -> SqliteItemStore {
    SqliteItemStore::open_in_memory().unwrap()
}

fn insert(store: &SqliteItemStore, name: &str, priority: Priority, duration: TaskDuration) -> Item {
    let mut item = Item::new(name, priority, duration);
    item.id = store.insert(&item).unwrap();
    assert!(item.id.is_some(), "insert of `{name}` was ignored");
    item
}

fn names(items: &[Item]) -> Vec<&str> {
    items.iter().map(|item| item.name.as_str()).collect()
}

fn ids(items: &[Item]) -> Vec<ItemId> {
    items.iter().filter_map(|item| item.id).collect()
}

#[test]
fn insert_assigns_id_and_find_returns_record() {
    let store = store();
    let item = insert(&store, "Buy milk", Priority::High, TaskDuration::Day);

    let loaded = store.find(item.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded, item);
    assert!(!loaded.is_done);
}

#[test]
fn get_all_orders_by_name() {
    let store = store();
    insert(&store, "charlie", Priority::Low, TaskDuration::Week);
    insert(&store, "alpha", Priority::High, TaskDuration::Day);
    insert(&store, "bravo", Priority::Medium, TaskDuration::Year);

    let all = store.get_all().unwrap().recv().unwrap();
    assert_eq!(names(&all), ["alpha", "bravo", "charlie"]);
}

#[test]
fn insert_with_colliding_id_is_ignored() {
    let store = store();
    let first = Item::with_id(42, "first", Priority::High, TaskDuration::Day);
    let second = Item::with_id(42, "second", Priority::Low, TaskDuration::Year);

    assert_eq!(store.insert(&first).unwrap(), Some(42));
    assert_eq!(store.insert(&second).unwrap(), None);

    let loaded = store.get_by_id(42).unwrap().recv().unwrap().unwrap();
    assert_eq!(loaded.name, "first");
    assert_eq!(store.fetch(ItemQuery::All).unwrap().len(), 1);
}

#[test]
fn ignored_insert_does_not_reemit() {
    let store = store();
    store
        .insert(&Item::with_id(1, "only", Priority::Low, TaskDuration::Day))
        .unwrap();
    let all = store.get_all().unwrap();
    assert_eq!(all.recv().unwrap().len(), 1);

    store
        .insert(&Item::with_id(1, "dup", Priority::Low, TaskDuration::Day))
        .unwrap();
    assert_eq!(all.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn ids_are_not_reused_after_delete() {
    let store = store();
    let first = insert(&store, "first", Priority::Low, TaskDuration::Day);
    assert!(store.delete(&first).unwrap());

    let second = insert(&store, "second", Priority::Low, TaskDuration::Day);
    assert!(second.id.unwrap() > first.id.unwrap());
}

#[test]
fn update_replaces_fields_and_reemits_by_id() {
    let store = store();
    let item = insert(&store, "draft", Priority::Low, TaskDuration::Week);
    let id = item.id.unwrap();
    let watch = store.get_by_id(id).unwrap();
    assert_eq!(watch.recv().unwrap(), Some(item));

    let mut replacement = Item::with_id(id, "final", Priority::High, TaskDuration::Month);
    replacement.is_done = true;
    assert!(store.update(&replacement).unwrap());

    assert_eq!(watch.recv().unwrap(), Some(replacement));
}

#[test]
fn update_and_delete_of_missing_id_are_noops() {
    let store = store();
    let kept = insert(&store, "kept", Priority::Medium, TaskDuration::Day);
    let all = store.get_all().unwrap();
    all.recv().unwrap();

    let ghost = Item::with_id(9_999, "ghost", Priority::High, TaskDuration::Day);
    assert!(!store.update(&ghost).unwrap());
    assert!(!store.delete(&ghost).unwrap());

    let unsaved = Item::new("unsaved", Priority::High, TaskDuration::Day);
    assert!(!store.update(&unsaved).unwrap());
    assert!(!store.delete(&unsaved).unwrap());

    assert_eq!(all.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(store.fetch(ItemQuery::All).unwrap(), vec![kept]);
}

#[test]
fn delete_removes_record_and_repeat_is_noop() {
    let store = store();
    let gone = insert(&store, "gone", Priority::Low, TaskDuration::Day);
    let stay = insert(&store, "stay", Priority::Low, TaskDuration::Day);
    let by_id = store.get_by_id(gone.id.unwrap()).unwrap();
    assert!(by_id.recv().unwrap().is_some());

    assert!(store.delete(&gone).unwrap());
    assert!(!store.delete(&gone).unwrap());

    assert_eq!(by_id.recv().unwrap(), None);
    assert_eq!(ids(&store.fetch(ItemQuery::All).unwrap()), ids(&[stay]));
}

#[test]
fn duration_filters_partition_by_bucket_and_done_flag() {
    let store = store();
    let open_day = insert(&store, "open day", Priority::Low, TaskDuration::Day);
    let done_day = insert(&store, "done day", Priority::High, TaskDuration::Day);
    store.update(&done_day.marked_done()).unwrap();
    let week = insert(&store, "week", Priority::High, TaskDuration::Week);

    let day = TaskDuration::Day;
    assert_eq!(
        ids(&store.fetch(ItemQuery::ByDuration(day)).unwrap()),
        ids(&[open_day.clone(), done_day.clone()])
    );
    assert_eq!(
        ids(&store.fetch(ItemQuery::ByDurationUndone(day)).unwrap()),
        ids(&[open_day])
    );
    assert_eq!(
        ids(&store.fetch(ItemQuery::DoneByDuration(day)).unwrap()),
        ids(&[done_day])
    );
    assert_eq!(
        ids(&store.fetch(ItemQuery::ByDuration(TaskDuration::Week)).unwrap()),
        ids(&[week])
    );
    assert!(store
        .fetch(ItemQuery::ByDuration(TaskDuration::Year))
        .unwrap()
        .is_empty());
}

#[test]
fn high_priority_filter_ignores_other_buckets() {
    let store = store();
    let wanted = insert(&store, "urgent", Priority::High, TaskDuration::Month);
    insert(&store, "later", Priority::Medium, TaskDuration::Month);
    insert(&store, "urgent elsewhere", Priority::High, TaskDuration::Week);

    let high = store
        .get_high_priority_by_duration(TaskDuration::Month)
        .unwrap()
        .recv()
        .unwrap();
    assert_eq!(ids(&high), ids(&[wanted]));
}

#[test]
fn sorted_by_priority_puts_high_first_and_keeps_insertion_order_on_ties() {
    let store = store();
    let low = insert(&store, "low", Priority::Low, TaskDuration::Month);
    let high = insert(&store, "high", Priority::High, TaskDuration::Month);
    let medium = insert(&store, "medium", Priority::Medium, TaskDuration::Month);
    let second_high = insert(&store, "another high", Priority::High, TaskDuration::Month);

    let sorted = store
        .get_by_duration_sorted_by_priority(TaskDuration::Month)
        .unwrap()
        .recv()
        .unwrap();
    assert_eq!(ids(&sorted), ids(&[high, second_high, medium, low]));
}

#[test]
fn live_query_reemits_only_through_writes() {
    let store = store();
    let undone = store.get_by_duration_undone(TaskDuration::Day).unwrap();
    let done = store.get_done_by_duration(TaskDuration::Day).unwrap();
    assert!(undone.recv().unwrap().is_empty());
    assert!(done.recv().unwrap().is_empty());

    let item = insert(&store, "Buy milk", Priority::High, TaskDuration::Day);
    assert_eq!(ids(&undone.recv().unwrap()), ids(&[item.clone()]));
    assert!(done.recv().unwrap().is_empty());

    store.update(&item.marked_done()).unwrap();
    assert!(undone.recv().unwrap().is_empty());
    assert_eq!(ids(&done.recv().unwrap()), ids(&[item]));

    assert_eq!(undone.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn emissions_follow_write_order_for_each_subscriber() {
    let store = store();
    let week = store.get_by_duration(TaskDuration::Week).unwrap();
    week.recv().unwrap();

    for name in ["one", "two", "three"] {
        insert(&store, name, Priority::Low, TaskDuration::Week);
    }

    let sizes: Vec<usize> = (0..3).map(|_| week.recv().unwrap().len()).collect();
    assert_eq!(sizes, [1, 2, 3]);
}

#[test]
fn dropped_subscriptions_leave_the_registry() {
    let store = store();
    let first = store.get_all().unwrap();
    let second = store.get_by_id(1).unwrap();
    assert_eq!(store.live_subscriber_count().unwrap(), 2);

    drop(first);
    drop(second);
    assert_eq!(store.live_subscriber_count().unwrap(), 0);

    insert(&store, "after", Priority::Low, TaskDuration::Day);
    assert_eq!(store.live_subscriber_count().unwrap(), 0);
}

#[test]
fn resubscribing_prunes_abandoned_subjects_without_writes() {
    let store = store();
    for id in 1..=20 {
        drop(store.get_by_id(id).unwrap());
    }
    drop(store.get_all().unwrap());

    let kept = store.get_by_id(99).unwrap();
    assert_eq!(store.live_query_count().unwrap(), 1);
    assert_eq!(store.live_subscriber_count().unwrap(), 1);
    assert!(kept.is_attached());
}

#[test]
fn failed_live_recompute_skips_emission_but_keeps_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let store = SqliteItemStore::open(&path).unwrap();
    let all = store.get_all().unwrap();
    assert!(all.recv().unwrap().is_empty());

    let side = Connection::open(&path).unwrap();
    side.execute(
        "INSERT INTO item (name, priority, duration, isDone) VALUES ('bad', 9, 'day', 0);",
        [],
    )
    .unwrap();

    let written = Item::new("good", Priority::High, TaskDuration::Day);
    assert!(store.insert(&written).unwrap().is_some());
    assert_eq!(all.try_recv(), Err(TryRecvError::Empty));
    assert!(all.is_attached());

    side.execute("UPDATE item SET priority = 3 WHERE name = 'bad';", [])
        .unwrap();
    insert(&store, "later", Priority::Low, TaskDuration::Week);
    assert_eq!(names(&all.recv().unwrap()), ["bad", "good", "later"]);
}

#[test]
fn read_rejects_invalid_persisted_priority() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO item (name, priority, duration, isDone) VALUES ('bad', 9, 'day', 0);",
        [],
    )
    .unwrap();
    let store = SqliteItemStore::try_new(conn).unwrap();

    let err = store.fetch(ItemQuery::All).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(message) if message.contains("priority")));
}

#[test]
fn read_rejects_invalid_persisted_duration() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO item (name, priority, duration, isDone) VALUES ('bad', 1, 'decade', 0);",
        [],
    )
    .unwrap();
    let store = SqliteItemStore::try_new(conn).unwrap();

    assert!(matches!(
        store.get_by_id(1),
        Err(StoreError::InvalidData(message)) if message.contains("duration")
    ));
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let item = {
        let store = SqliteItemStore::open(&path).unwrap();
        insert(&store, "durable", Priority::Medium, TaskDuration::Year)
    };

    let reopened = SqliteItemStore::open(&path).unwrap();
    assert_eq!(reopened.find(item.id.unwrap()).unwrap(), Some(item));
}

#[test]
fn store_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteItemStore::try_new(conn) {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn store_rejects_connection_without_item_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteItemStore::try_new(conn),
        Err(StoreError::MissingRequiredTable("item"))
    ));
}

#[test]
fn store_rejects_connection_missing_item_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            priority INTEGER NOT NULL,
            duration TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteItemStore::try_new(conn),
        Err(StoreError::MissingRequiredColumn {
            table: "item",
            column: "isDone"
        })
    ));
}
