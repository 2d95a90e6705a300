//! Unit of work: one atomic change boundary per handler invocation.

use std::sync::{Arc, Mutex, PoisonError};

use domain::Event;
use store::{ProductStore, Repository, StoreError};

/// Groups the changes one handler makes into a single commit.
///
/// A unit of work is created fresh for every bus run and shared by every
/// handler in that run. Each handler opens a [`Transaction`] with
/// [`begin`](Self::begin). Events raised by products in a committed
/// transaction collect here until the bus drains them with
/// [`collect_new_events`](Self::collect_new_events).
pub struct UnitOfWork<S: ProductStore> {
    store: Arc<S>,
    outbox: Mutex<Vec<Event>>,
}

impl<S: ProductStore> UnitOfWork<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Opens a new transactional scope with an empty repository.
    pub fn begin(&self) -> Transaction<'_, S> {
        Transaction {
            uow: self,
            products: Repository::new(self.store.as_ref()),
            committed: false,
        }
    }

    /// Drains the events raised by committed transactions, oldest first.
    pub fn collect_new_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.outbox.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn record(&self, events: Vec<Event>) {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(events);
    }
}

/// A transactional scope over the products repository.
///
/// Nothing is persisted unless [`commit`](Self::commit) succeeds. Dropping
/// the transaction any other way rolls it back, and the events raised inside
/// it are discarded with the changes they describe.
pub struct Transaction<'u, S: ProductStore> {
    uow: &'u UnitOfWork<S>,
    products: Repository<'u, S>,
    committed: bool,
}

impl<'u, S: ProductStore> Transaction<'u, S> {
    /// Products repository scoped to this transaction.
    pub fn products(&mut self) -> &mut Repository<'u, S> {
        &mut self.products
    }

    /// Saves every product seen in this scope atomically.
    ///
    /// Fails with a concurrency conflict if any of them changed in the store
    /// since it was loaded; nothing is written in that case.
    pub async fn commit(mut self) -> Result<(), StoreError> {
        let mut staged = self.products.take_staged();
        let events: Vec<Event> = staged
            .iter_mut()
            .flat_map(|entry| entry.product.take_events())
            .collect();

        self.uow.store.save(staged).await?;

        self.committed = true;
        self.uow.record(events);
        Ok(())
    }

    /// Discards every change made in this scope.
    pub fn rollback(self) {}
}

impl<S: ProductStore> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!(
                products = self.products.seen().count(),
                "transaction rolled back"
            );
        }
    }
}
