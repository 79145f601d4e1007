//! App - the worker runtime and the coordinator-side maintenance loops.
//!
//! - **WorkerBuilder**: job registration and startup validation
//! - **JobPollLoop / WorkerGroup**: acquire, run, report, one loop per job
//! - **TaskRunner / Reporter**: one leased task from fetch to finish report
//! - **JobCache**: per-loop cached job definition
//! - **PartitionLoop**: periodic window production
//! - **ReaperLoop**: lease expiry

pub mod builder;
pub mod job_cache;
pub mod partition_loop;
pub mod reaper_loop;
pub mod reporter;
pub mod runner;
pub mod worker_loop;

#[cfg(test)]
pub(crate) mod testing;

pub use self::builder::{BuildError, Worker, WorkerBuilder};
pub use self::job_cache::JobCache;
pub use self::partition_loop::PartitionLoop;
pub use self::reaper_loop::ReaperLoop;
pub use self::reporter::{Reporter, TaskOutcome};
pub use self::runner::TaskRunner;
pub use self::worker_loop::{JobPollLoop, WorkerGroup};
