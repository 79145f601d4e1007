//! Domain identifiers (strongly-typed IDs).
//!
//! `Id<T>` wraps a store-assigned `u64`. `T` is a zero-sized marker so a
//! `JobId` can never be passed where a `TaskId` is expected.
//!
//! Task ids are allocated in ascending order, so ordering by id is ordering
//! by creation. The lease allocator relies on this for its FIFO ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Marker trait providing the display prefix of an id type.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: u64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> u64 {
        self.value
    }
}

impl<T: IdMarker> From<u64> for Id<T> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn prefix() -> &'static str {
        "job-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identifier of a job definition.
pub type JobId = Id<Job>;

/// Identifier of a task (one window or one message batch).
pub type TaskId = Id<Task>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_type_prefix() {
        assert_eq!(JobId::new(3).to_string(), "job-3");
        assert_eq!(TaskId::new(42).to_string(), "task-42");
    }

    #[test]
    fn ids_order_by_value() {
        let mut ids = vec![TaskId::new(5), TaskId::new(2), TaskId::new(8), TaskId::new(1)];
        ids.sort();
        let raw: Vec<u64> = ids.iter().map(|id| id.get()).collect();
        assert_eq!(raw, vec![1, 2, 5, 8]);
    }

    #[test]
    fn serializes_as_bare_number() {
        let s = serde_json::to_string(&TaskId::new(7)).unwrap();
        assert_eq!(s, "7");
        let back: TaskId = serde_json::from_str("7").unwrap();
        assert_eq!(back, TaskId::new(7));
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<TaskId>(), std::mem::size_of::<u64>());
    }
}
