//! Task item record.
//!
//! # Responsibility
//! - Define `Item` plus the `Priority` and `TaskDuration` enumerations.
//! - Own the mapping between enum values and their external encodings
//!   (priority ordinals, duration tags).
//!
//! # Invariants
//! - `id` is assigned by the store on insert and never reused.
//! - `Priority` ordinals are fixed: high=1, medium=2, low=3, done=4.
//! - Duration tags are exactly `day|week|month|year`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Store-assigned task identifier.
pub type ItemId = i64;

/// Task importance. Lower ordinal sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
    /// Legacy ordinal kept for storage compatibility; the task workflow
    /// tracks completion through `Item::is_done` instead.
    Done,
}

impl Priority {
    /// Integer ordinal used in storage and by UI callers.
    pub fn ordinal(self) -> i64 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
            Self::Done => 4,
        }
    }

    /// Parses an ordinal, returning `None` for values outside `1..=4`.
    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::High),
            2 => Some(Self::Medium),
            3 => Some(Self::Low),
            4 => Some(Self::Done),
            _ => None,
        }
    }
}

/// Coarse scheduling horizon of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDuration {
    Day,
    Week,
    Month,
    Year,
}

impl TaskDuration {
    pub const ALL: [TaskDuration; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    /// Text tag stored in `item.duration`.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Parses an exact lowercase tag.
    pub fn from_tag(value: &str) -> Option<Self> {
        match value {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

impl Display for TaskDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Error returned when a duration tag is not one of `day|week|month|year`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDurationTag(pub String);

impl Display for UnknownDurationTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown duration tag `{}`; expected day|week|month|year",
            self.0
        )
    }
}

impl std::error::Error for UnknownDurationTag {}

impl FromStr for TaskDuration {
    type Err = UnknownDurationTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| UnknownDurationTag(s.to_string()))
    }
}

/// Persisted task record.
///
/// Items are plain values: the store owns identity, and every mutation is a
/// full-record write of a value built by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// `None` until the store assigns an id on insert.
    pub id: Option<ItemId>,
    pub name: String,
    pub priority: Priority,
    pub duration: TaskDuration,
    pub is_done: bool,
}

impl Item {
    /// Creates an unsaved, not-done item. The store assigns the id.
    pub fn new(name: impl Into<String>, priority: Priority, duration: TaskDuration) -> Self {
        Self {
            id: None,
            name: name.into(),
            priority,
            duration,
            is_done: false,
        }
    }

    /// Creates a not-done item carrying an explicit id.
    ///
    /// Used for full-record replacement, where the id selects the target row.
    pub fn with_id(
        id: ItemId,
        name: impl Into<String>,
        priority: Priority,
        duration: TaskDuration,
    ) -> Self {
        Self {
            id: Some(id),
            ..Self::new(name, priority, duration)
        }
    }

    /// Returns a copy with `is_done` set. All other fields are preserved.
    pub fn marked_done(&self) -> Self {
        Self {
            is_done: true,
            ..self.clone()
        }
    }
}

/// Returns whether `name` is acceptable as a task name (non-blank after trim).
pub fn is_entry_valid(name: &str) -> bool {
    !name.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::{is_entry_valid, Priority, TaskDuration};

    #[test]
    fn priority_ordinals_sort_high_first() {
        let mut values = vec![Priority::Low, Priority::High, Priority::Medium];
        values.sort();
        assert_eq!(values, vec![Priority::High, Priority::Medium, Priority::Low]);
        assert!(values.windows(2).all(|w| w[0].ordinal() < w[1].ordinal()));
    }

    #[test]
    fn duration_tag_parsing_is_exact() {
        assert_eq!("week".parse::<TaskDuration>(), Ok(TaskDuration::Week));
        assert!("Week".parse::<TaskDuration>().is_err());
        assert!(" day".parse::<TaskDuration>().is_err());
    }

    #[test]
    fn blank_names_are_invalid() {
        assert!(!is_entry_valid(""));
        assert!(!is_entry_valid(" \t\n"));
        assert!(is_entry_valid(" task "));
    }
}
