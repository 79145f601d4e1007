//! stride-core
//!
//! Core of a distributed, time-windowed job scheduler: a coordinator owns
//! job definitions and task rows, workers lease tasks, run them and report
//! back.
//!
//! # Modules
//! - **domain**: ids, job definitions, windows, tasks, the task state machine, reports
//! - **ports**: seams to storage, the coordinator and the clock
//! - **lease**: eligibility policy and the lease allocator
//! - **impls**: in-memory task store and in-process coordinator
//! - **typed**: the `Job` trait, windowed and message jobs, the batch adapter
//! - **app**: worker builder, poll loops, task runner, maintenance loops
//! - **config**: worker and coordinator settings
//! - **error**: `StrideError` and `JobError`
//! - **observability**: task counts per status

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod lease;
pub mod observability;
pub mod ports;
pub mod typed;

pub use config::{CoordinatorConfig, WorkerConfig};
pub use error::{JobError, Result, StrideError};
