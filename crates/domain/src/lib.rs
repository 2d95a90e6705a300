//! Domain layer for the allocation service.
//!
//! This crate provides the pure allocation model, free of I/O:
//! - [`OrderLine`], [`Batch`] and the [`Product`] aggregate root
//! - [`Command`]s requesting changes and [`Event`]s recording facts
//! - [`Message`], the union the message bus queues

pub mod message;
pub mod product;

pub use common::{BatchRef, OrderId, Sku, Version};
pub use message::Message;
pub use product::{
    Allocate, Allocated, AllocationError, Batch, ChangeBatchQuantity, Command, CommandKind,
    CreateBatch, Deallocated, Event, EventKind, OrderLine, OutOfStock, Product,
};
