//! Read models for the query side of the allocation service.
//!
//! This crate provides:
//! - [`Projection`] trait for applying domain events to a read model
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`AllocationsView`], which answers "where did this order's lines go?"

pub mod error;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use projection::Projection;
pub use read_model::ReadModel;
pub use views::{AllocationRow, AllocationsView};
