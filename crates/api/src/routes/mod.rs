pub mod allocations;
pub mod channels;
pub mod health;
pub mod metrics;
