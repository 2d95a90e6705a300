//! Allocations read model: which batch holds each order's lines.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{BatchRef, OrderId, Sku};
use domain::Event;
use tokio::sync::RwLock;

use crate::projection::Projection;
use crate::read_model::ReadModel;
use crate::{ProjectionError, Result};

/// One allocated line as seen by the query side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRow {
    pub order_id: OrderId,
    pub sku: Sku,
    pub batch_ref: BatchRef,
}

/// Read model view of allocations keyed by order.
///
/// Rows are kept in the order they were inserted. `Allocated` adds a row,
/// `Deallocated` removes every row for the same order and SKU.
#[derive(Clone, Default)]
pub struct AllocationsView {
    rows: Arc<RwLock<Vec<AllocationRow>>>,
    // Mirrors rows.len(), updated under the write lock
    row_count: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl AllocationsView {
    /// Creates a new empty allocations view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent update fail, as if the backing storage were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the allocations for an order.
    pub async fn allocations_for(&self, order_id: &OrderId) -> Vec<AllocationRow> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|row| &row.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Records an allocation. Recording the same row twice keeps one copy.
    pub async fn insert(&self, row: AllocationRow) -> Result<()> {
        self.ensure_available()?;
        let mut rows = self.rows.write().await;
        if !rows.contains(&row) {
            rows.push(row);
            self.row_count.store(rows.len(), Ordering::SeqCst);
        }
        Ok(())
    }

    /// Removes every row for an order and SKU.
    pub async fn remove(&self, order_id: &OrderId, sku: &Sku) -> Result<()> {
        self.ensure_available()?;
        let mut rows = self.rows.write().await;
        rows.retain(|row| !(&row.order_id == order_id && &row.sku == sku));
        self.row_count.store(rows.len(), Ordering::SeqCst);
        Ok(())
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProjectionError::Unavailable(
                "allocations view is not accepting writes".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Projection for AllocationsView {
    fn name(&self) -> &'static str {
        "AllocationsView"
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        match event {
            Event::Allocated(data) => {
                self.insert(AllocationRow {
                    order_id: data.order_id.clone(),
                    sku: data.sku.clone(),
                    batch_ref: data.batch_ref.clone(),
                })
                .await?;
            }
            Event::Deallocated(data) => self.remove(&data.order_id, &data.sku).await?,
            Event::OutOfStock(_) => {}
        }

        metrics::counter!("projections_events_processed").increment(1);
        Ok(())
    }
}

impl ReadModel for AllocationsView {
    fn name(&self) -> &'static str {
        "AllocationsView"
    }

    fn count(&self) -> usize {
        self.row_count.load(Ordering::SeqCst)
    }
}
