//! Ports - the seams to external systems.
//!
//! - [`TaskStore`]: durable task rows (any store meeting the query contract)
//! - [`Coordinator`]: the job/task RPC surface workers poll
//! - [`Clock`]: wall-clock time

pub mod clock;
pub mod coordinator;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::coordinator::{AcquireParams, Coordinator, ProduceOptions};
pub use self::task_store::{EligibilityQuery, FieldLimits, TaskFilter, TaskStore};
