//! Product domain events.

use common::{BatchRef, OrderId, Sku};
use serde::{Deserialize, Serialize};

/// Facts raised by the product aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// No batch could take an order line.
    OutOfStock(OutOfStock),

    /// An order line was allocated to a batch.
    Allocated(Allocated),

    /// An order line was taken off a batch and needs a new home.
    Deallocated(Deallocated),
}

/// Tag used to route events to their handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OutOfStock,
    Allocated,
    Deallocated,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::OutOfStock => "OutOfStock",
            EventKind::Allocated => "Allocated",
            EventKind::Deallocated => "Deallocated",
        };
        write!(f, "{s}")
    }
}

impl Event {
    /// Returns the routing tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::OutOfStock(_) => EventKind::OutOfStock,
            Event::Allocated(_) => EventKind::Allocated,
            Event::Deallocated(_) => EventKind::Deallocated,
        }
    }

    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::OutOfStock(_) => "OutOfStock",
            Event::Allocated(_) => "Allocated",
            Event::Deallocated(_) => "Deallocated",
        }
    }

    pub fn out_of_stock(sku: Sku) -> Self {
        Event::OutOfStock(OutOfStock { sku })
    }

    pub fn allocated(order_id: OrderId, sku: Sku, batch_ref: BatchRef, qty: u32) -> Self {
        Event::Allocated(Allocated {
            order_id,
            sku,
            batch_ref,
            qty,
        })
    }

    pub fn deallocated(order_id: OrderId, sku: Sku, qty: u32) -> Self {
        Event::Deallocated(Deallocated { order_id, sku, qty })
    }
}

/// Data for OutOfStock event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    pub sku: Sku,
}

/// Data for Allocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub batch_ref: BatchRef,
    pub qty: u32,
}

/// Data for Deallocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deallocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}
