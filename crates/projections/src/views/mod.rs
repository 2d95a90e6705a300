//! Read model views.

mod allocations;

pub use allocations::{AllocationRow, AllocationsView};
