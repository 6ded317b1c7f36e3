//! Query variants over the `item` table.
//!
//! All filters are conjunctions of exact-match predicates.

use crate::model::item::{Priority, TaskDuration};
use rusqlite::types::Value;

pub(crate) const ITEM_SELECT_SQL: &str = "SELECT
    id,
    name,
    priority,
    duration,
    isDone
FROM item";

/// One list-shaped view over the task collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemQuery {
    /// Every task, ordered by name.
    All,
    /// Tasks in one bucket.
    ByDuration(TaskDuration),
    /// Unfinished tasks in one bucket.
    ByDurationUndone(TaskDuration),
    /// Finished tasks in one bucket.
    DoneByDuration(TaskDuration),
    /// High-priority tasks in one bucket.
    HighPriorityByDuration(TaskDuration),
    /// Tasks in one bucket, high priority first.
    ByDurationSortedByPriority(TaskDuration),
}

impl ItemQuery {
    /// Bucket this query is restricted to, if any.
    pub fn duration(self) -> Option<TaskDuration> {
        match self {
            Self::All => None,
            Self::ByDuration(duration)
            | Self::ByDurationUndone(duration)
            | Self::DoneByDuration(duration)
            | Self::HighPriorityByDuration(duration)
            | Self::ByDurationSortedByPriority(duration) => Some(duration),
        }
    }

    /// Short label for log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ByDuration(_) => "by_duration",
            Self::ByDurationUndone(_) => "by_duration_undone",
            Self::DoneByDuration(_) => "done_by_duration",
            Self::HighPriorityByDuration(_) => "high_priority_by_duration",
            Self::ByDurationSortedByPriority(_) => "by_duration_sorted_by_priority",
        }
    }

    /// Builds the SELECT statement and its positional bind values.
    pub(crate) fn to_sql(self) -> (String, Vec<Value>) {
        let mut sql = format!("{ITEM_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(duration) = self.duration() {
            sql.push_str(" AND duration = ?");
            bind_values.push(Value::Text(duration.as_tag().to_string()));
        }

        match self {
            Self::ByDurationUndone(_) => sql.push_str(" AND isDone = 0"),
            Self::DoneByDuration(_) => sql.push_str(" AND isDone = 1"),
            Self::HighPriorityByDuration(_) => {
                sql.push_str(" AND priority = ?");
                bind_values.push(Value::Integer(Priority::High.ordinal()));
            }
            _ => {}
        }

        // Ties always fall back to id, i.e. insertion order.
        sql.push_str(match self {
            Self::All => " ORDER BY name ASC, id ASC",
            Self::ByDurationSortedByPriority(_) => " ORDER BY priority ASC, id ASC",
            _ => " ORDER BY id ASC",
        });

        (sql, bind_values)
    }
}
