//! Domain model: ids, job definitions, tasks, windows, the task state machine
//! and the reporting protocol messages.
//!
//! Nothing here does I/O. Stores and coordinators call into these types
//! while holding their own locks.

pub mod identity;
pub mod ids;
pub mod job;
pub mod report;
pub mod state;
pub mod task;
pub mod window;

pub use identity::WorkerIdentity;
pub use ids::{JobId, TaskId};
pub use job::{JobDefinition, JobMode};
pub use report::{FinishOutcome, FinishReport, ProgressReport, TaskReport};
pub use state::TaskStatus;
pub use task::{NewTask, Task};
pub use window::{NextWindow, Window, WindowParams, next_window};
