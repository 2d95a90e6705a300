//! Command and event handlers.
//!
//! Handlers never call each other. Anything that should happen as a
//! consequence of a change travels through the bus as an event, or, for
//! event handlers, as a follow-up command returned to the bus.

use common::BatchRef;
use domain::{
    Allocate, Allocated, Batch, ChangeBatchQuantity, CreateBatch, Deallocated, Event, OrderLine,
    OutOfStock, Product,
};
use projections::Projection;
use store::ProductStore;

use crate::error::{Result, ServiceError};
use crate::services::{Notifier, Publisher};
use crate::unit_of_work::UnitOfWork;

/// Topic allocations are published on.
pub const LINE_ALLOCATED_TOPIC: &str = "line_allocated";

/// Adds a batch, creating the product on first sight of its SKU.
#[tracing::instrument(skip(cmd, uow), fields(reference = %cmd.reference, sku = %cmd.sku))]
pub async fn add_batch<S: ProductStore>(cmd: CreateBatch, uow: &UnitOfWork<S>) -> Result<()> {
    let mut tx = uow.begin();
    let products = tx.products();
    let batch = Batch::new(cmd.reference, cmd.sku.clone(), cmd.qty, cmd.eta);

    match products.get(&cmd.sku).await? {
        Some(product) => product.add_batch(batch)?,
        None => products.add(Product::new(cmd.sku, vec![batch])),
    }

    tx.commit().await?;
    Ok(())
}

/// Allocates an order line, returning the chosen batch.
///
/// `Ok(None)` means nothing had room; the product raised `OutOfStock`.
#[tracing::instrument(skip(cmd, uow), fields(order_id = %cmd.order_id, sku = %cmd.sku, qty = cmd.qty))]
pub async fn allocate<S: ProductStore>(
    cmd: Allocate,
    uow: &UnitOfWork<S>,
) -> Result<Option<BatchRef>> {
    let line = OrderLine::new(cmd.order_id, cmd.sku.clone(), cmd.qty);
    let mut tx = uow.begin();

    let product = tx
        .products()
        .get(&cmd.sku)
        .await?
        .ok_or_else(|| ServiceError::InvalidSku(cmd.sku.clone()))?;
    let batch_ref = product.allocate(line)?;

    tx.commit().await?;
    Ok(batch_ref)
}

#[tracing::instrument(skip(cmd, uow), fields(reference = %cmd.reference, sku = %cmd.sku, qty = cmd.qty))]
pub async fn change_batch_quantity<S: ProductStore>(
    cmd: ChangeBatchQuantity,
    uow: &UnitOfWork<S>,
) -> Result<()> {
    let mut tx = uow.begin();

    let product = tx
        .products()
        .get(&cmd.sku)
        .await?
        .ok_or_else(|| ServiceError::InvalidSku(cmd.sku.clone()))?;
    product.change_batch_quantity(&cmd.reference, &cmd.sku, cmd.qty)?;

    tx.commit().await?;
    Ok(())
}

/// Turns a deallocated line back into an allocation request.
pub fn reallocate(event: &Deallocated) -> Allocate {
    Allocate::new(event.order_id.clone(), event.sku.clone(), event.qty)
}

pub async fn send_out_of_stock_notification(
    event: &OutOfStock,
    notifier: &dyn Notifier,
    destination: &str,
) -> Result<()> {
    notifier
        .send(destination, &format!("Out of stock for {}", event.sku))
        .await
}

pub async fn publish_allocated_event(event: &Allocated, publisher: &dyn Publisher) -> Result<()> {
    publisher
        .publish(LINE_ALLOCATED_TOPIC, &Event::Allocated(event.clone()))
        .await
}

pub async fn add_allocation_to_read_model(
    event: &Allocated,
    read_model: &dyn Projection,
) -> Result<()> {
    read_model.handle(&Event::Allocated(event.clone())).await?;
    Ok(())
}

pub async fn remove_allocation_from_read_model(
    event: &Deallocated,
    read_model: &dyn Projection,
) -> Result<()> {
    read_model.handle(&Event::Deallocated(event.clone())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::Sku;
    use store::InMemoryProductStore;

    use super::*;
    use crate::services::{InMemoryNotifier, InMemoryPublisher};

    fn uow(store: &Arc<InMemoryProductStore>) -> UnitOfWork<InMemoryProductStore> {
        UnitOfWork::new(Arc::clone(store))
    }

    #[tokio::test]
    async fn add_batch_for_new_product() {
        let store = Arc::new(InMemoryProductStore::new());

        add_batch(CreateBatch::new("b1", "LAMP", 100, None), &uow(&store))
            .await
            .unwrap();

        let product = store.load(&Sku::new("LAMP")).await.unwrap().unwrap();
        assert_eq!(product.batches().len(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn add_batch_for_existing_product() {
        let store = Arc::new(InMemoryProductStore::new());

        add_batch(CreateBatch::new("b1", "LAMP", 100, None), &uow(&store))
            .await
            .unwrap();
        add_batch(CreateBatch::new("b2", "LAMP", 99, None), &uow(&store))
            .await
            .unwrap();

        let product = store.load(&Sku::new("LAMP")).await.unwrap().unwrap();
        let refs: Vec<_> = product.batches().iter().map(|b| b.reference().as_str()).collect();
        assert_eq!(refs, vec!["b1", "b2"]);
    }

    #[tokio::test]
    async fn duplicate_batch_is_rejected() {
        let store = Arc::new(InMemoryProductStore::new());
        add_batch(CreateBatch::new("b1", "LAMP", 100, None), &uow(&store))
            .await
            .unwrap();

        let result = add_batch(CreateBatch::new("b1", "LAMP", 5, None), &uow(&store)).await;

        assert!(matches!(result, Err(ServiceError::Allocation(_))));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn allocate_returns_batch_ref() {
        let store = Arc::new(InMemoryProductStore::new());
        add_batch(CreateBatch::new("b1", "LAMP", 100, None), &uow(&store))
            .await
            .unwrap();

        let result = allocate(Allocate::new("o1", "LAMP", 10), &uow(&store))
            .await
            .unwrap();

        assert_eq!(result, Some(BatchRef::new("b1")));
    }

    #[tokio::test]
    async fn allocate_errors_for_invalid_sku() {
        let store = Arc::new(InMemoryProductStore::new());
        add_batch(CreateBatch::new("b1", "AREALSKU", 100, None), &uow(&store))
            .await
            .unwrap();

        let err = allocate(Allocate::new("o1", "NONEXISTENTSKU", 10), &uow(&store))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid sku NONEXISTENTSKU");
    }

    #[tokio::test]
    async fn allocate_commits_and_raises_allocated() {
        let store = Arc::new(InMemoryProductStore::new());
        add_batch(CreateBatch::new("b1", "LAMP", 100, None), &uow(&store))
            .await
            .unwrap();
        let uow = uow(&store);

        allocate(Allocate::new("o1", "LAMP", 10), &uow).await.unwrap();

        assert_eq!(store.save_count(), 2);
        assert!(matches!(
            uow.collect_new_events().as_slice(),
            [Event::Allocated(_)]
        ));
    }

    #[tokio::test]
    async fn change_quantity_for_unknown_sku() {
        let store = Arc::new(InMemoryProductStore::new());

        let result = change_batch_quantity(
            ChangeBatchQuantity::new("b1", "LAMP", 10),
            &uow(&store),
        )
        .await;

        assert!(matches!(result, Err(ServiceError::InvalidSku(_))));
    }

    #[test]
    fn reallocate_asks_for_the_same_line() {
        let deallocated = Deallocated {
            order_id: "o1".into(),
            sku: "LAMP".into(),
            qty: 7,
        };

        assert_eq!(reallocate(&deallocated), Allocate::new("o1", "LAMP", 7));
    }

    #[tokio::test]
    async fn out_of_stock_notification_text() {
        let notifier = InMemoryNotifier::new();

        send_out_of_stock_notification(
            &OutOfStock { sku: "LAMP".into() },
            &notifier,
            "stock@example.com",
        )
        .await
        .unwrap();

        assert_eq!(
            notifier.sent_to("stock@example.com"),
            vec!["Out of stock for LAMP"]
        );
    }

    #[tokio::test]
    async fn allocated_is_published_on_line_allocated() {
        let publisher = InMemoryPublisher::new();
        let event = Allocated {
            order_id: "o1".into(),
            sku: "LAMP".into(),
            batch_ref: "b1".into(),
            qty: 1,
        };

        publish_allocated_event(&event, &publisher).await.unwrap();

        assert_eq!(
            publisher.events_on(LINE_ALLOCATED_TOPIC),
            vec![Event::Allocated(event)]
        );
    }
}
