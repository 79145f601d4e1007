//! Typed job API.
//!
//! - [`Job`]: the object-safe trait the poll loop drives
//! - [`WindowedJob`] / [`WindowHandler`]: one time window per task
//! - [`MessageJob`] / [`MessageHandler`]: one message batch per task, run
//!   through the batch adapter with a per-item continue/abort decision
//! - [`JobRegistry`]: jobs by name

pub mod batch;
pub mod codec;
pub mod context;
pub mod job;
pub mod registry;

pub use self::batch::{ItemDecision, MessageHandler, run_batch};
pub use self::context::{JobContext, Phase, ProgressHandle, ProgressSnapshot};
pub use self::job::{Job, MessageJob, Payload, WindowHandler, WindowedJob};
pub use self::registry::JobRegistry;
