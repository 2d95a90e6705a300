//! Value objects for the product aggregate.

use common::{OrderId, Sku};
use serde::{Deserialize, Serialize};

/// A customer's request for a quantity of one SKU.
///
/// Two lines are the same line when order, SKU and quantity all match, which
/// is what makes allocation idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, qty: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            qty,
        }
    }
}
