//! Port implementations that run in-process.
//!
//! - [`InMemoryTaskStore`]: reference task store with an atomic lease
//! - [`LocalCoordinator`]: coordinator calls served directly from a store
//!
//! A networked coordinator or a SQL-backed store would live in its own crate
//! and implement the same ports.

pub mod local_coordinator;
pub mod memory_store;

pub use self::local_coordinator::LocalCoordinator;
pub use self::memory_store::InMemoryTaskStore;
