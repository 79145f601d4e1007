//! Lease engine: the eligibility policy and the allocator implementing
//! `AcquireTasks`, `Reset`, `DeleteUpTo` and `DeleteAll`.

mod allocator;
mod policy;

pub use allocator::{AcquireRequest, LeaseAllocator};
pub use policy::EligibilityPolicy;
