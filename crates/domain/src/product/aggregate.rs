//! Product aggregate implementation.

use common::{BatchRef, Sku, Version};

use super::{AllocationError, Batch, Event, OrderLine};

/// Product aggregate root.
///
/// Owns every batch of one SKU. All allocation decisions go through here, and
/// `version_number` is the token the store compares on commit. It moves
/// forward on every change: new batch, allocation, quantity change.
#[derive(Debug, Clone)]
pub struct Product {
    sku: Sku,
    batches: Vec<Batch>,
    version_number: Version,
    events: Vec<Event>,
}

impl Product {
    /// Creates a product at the initial version.
    pub fn new(sku: impl Into<Sku>, batches: Vec<Batch>) -> Self {
        Self::with_version(sku, batches, Version::initial())
    }

    /// Creates a product at a known version, as loaded from storage.
    pub fn with_version(sku: impl Into<Sku>, batches: Vec<Batch>, version_number: Version) -> Self {
        Self {
            sku: sku.into(),
            batches,
            version_number,
            events: Vec::new(),
        }
    }
}

// Query methods
impl Product {
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn version_number(&self) -> Version {
        self.version_number
    }

    /// Returns the batches in the order they were added.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Returns a batch by reference.
    pub fn batch(&self, reference: &BatchRef) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    /// Events raised since the last [`take_events`](Self::take_events).
    pub fn pending_events(&self) -> &[Event] {
        &self.events
    }

    /// Drains the pending events.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

// Command methods
impl Product {
    /// Adds a new batch to this product.
    pub fn add_batch(&mut self, batch: Batch) -> Result<(), AllocationError> {
        self.ensure_sku(batch.sku())?;

        if self.batch(batch.reference()).is_some() {
            return Err(AllocationError::DuplicateBatch {
                reference: batch.reference().clone(),
            });
        }

        self.batches.push(batch);
        self.version_number = self.version_number.next();
        Ok(())
    }

    /// Allocates a line to the preferred batch that can hold it.
    ///
    /// Returns `Ok(None)` and records [`Event::OutOfStock`] when no batch has
    /// room. A line already held by one of the batches is left where it is.
    pub fn allocate(&mut self, line: OrderLine) -> Result<Option<BatchRef>, AllocationError> {
        self.ensure_sku(&line.sku)?;

        if let Some(batch) = self.batches.iter().find(|b| b.is_allocated(&line)) {
            return Ok(Some(batch.reference().clone()));
        }

        let chosen = self
            .allocation_order()
            .into_iter()
            .find(|&idx| self.batches[idx].can_allocate(&line));

        let Some(idx) = chosen else {
            self.events.push(Event::out_of_stock(line.sku));
            return Ok(None);
        };

        let batch = &mut self.batches[idx];
        let reference = batch.reference().clone();
        self.events.push(Event::allocated(
            line.order_id.clone(),
            line.sku.clone(),
            reference.clone(),
            line.qty,
        ));
        batch.allocate(line);
        self.version_number = self.version_number.next();

        Ok(Some(reference))
    }

    /// Sets a batch's purchased quantity, deallocating lines until it fits.
    ///
    /// Every removed line is recorded as [`Event::Deallocated`]; reallocation
    /// is left to whoever handles those events.
    pub fn change_batch_quantity(
        &mut self,
        reference: &BatchRef,
        sku: &Sku,
        qty: u32,
    ) -> Result<(), AllocationError> {
        self.ensure_sku(sku)?;

        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.reference() == reference)
            .ok_or_else(|| AllocationError::BatchNotFound {
                reference: reference.clone(),
            })?;

        batch.set_purchased_quantity(qty);
        self.version_number = self.version_number.next();

        while batch.available_quantity() < 0 {
            let Some(line) = batch.deallocate_one() else {
                break;
            };
            self.events
                .push(Event::deallocated(line.order_id, line.sku, line.qty));
        }

        Ok(())
    }

    /// Batch indices in allocation priority: in-stock first, then by eta.
    fn allocation_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.batches.len()).collect();
        order.sort_by_key(|&idx| self.batches[idx].eta());
        order
    }

    fn ensure_sku(&self, sku: &Sku) -> Result<(), AllocationError> {
        if sku != &self.sku {
            return Err(AllocationError::SkuMismatch {
                expected: self.sku.clone(),
                actual: sku.clone(),
            });
        }
        Ok(())
    }
}
