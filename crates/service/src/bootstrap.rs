//! Wires handlers to their collaborators and builds the message bus.

use std::sync::Arc;

use domain::{Command, CommandKind, Event, EventKind};
use futures_util::FutureExt;
use projections::{AllocationsView, Projection};
use store::ProductStore;

use crate::bus::{HandlerRegistry, MessageBus};
use crate::error::{Result, ServiceError};
use crate::handlers;
use crate::services::{InMemoryNotifier, InMemoryPublisher, Notifier, Publisher};

/// Where out-of-stock notifications go unless configured otherwise.
pub const DEFAULT_NOTIFICATION_DESTINATION: &str = "stock@example.com";

/// The collaborators handlers may depend on.
#[derive(Clone)]
pub struct Dependencies {
    pub notifier: Arc<dyn Notifier>,
    pub publisher: Arc<dyn Publisher>,
    pub read_model: Arc<dyn Projection>,
    pub notification_destination: String,
}

impl Dependencies {
    /// In-memory collaborators, for tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            notifier: Arc::new(InMemoryNotifier::new()),
            publisher: Arc::new(InMemoryPublisher::new()),
            read_model: Arc::new(AllocationsView::new()),
            notification_destination: DEFAULT_NOTIFICATION_DESTINATION.to_string(),
        }
    }
}

/// Builds the message bus with every handler registered.
///
/// Commands:
/// - `CreateBatch` → [`handlers::add_batch`]
/// - `Allocate` → [`handlers::allocate`]
/// - `ChangeBatchQuantity` → [`handlers::change_batch_quantity`]
///
/// Events, in the order their handlers run:
/// - `OutOfStock` → notification
/// - `Allocated` → publish, then read model insert
/// - `Deallocated` → read model delete, then reallocation
pub fn bootstrap<S: ProductStore + 'static>(store: S, deps: Dependencies) -> MessageBus<S> {
    let mut registry = HandlerRegistry::new();
    register_commands(&mut registry);
    register_events(&mut registry, deps);

    tracing::info!("message bus ready");
    MessageBus::new(Arc::new(store), registry)
}

fn register_commands<S: ProductStore + 'static>(registry: &mut HandlerRegistry<S>) {
    registry
        .on_command(
            CommandKind::CreateBatch,
            Box::new(|command, uow| {
                async move {
                    match command {
                        Command::CreateBatch(cmd) => {
                            handlers::add_batch(cmd, &*uow).await.map(|()| None)
                        }
                        other => Err(ServiceError::NoHandler(other.kind())),
                    }
                }
                .boxed()
            }),
        )
        .on_command(
            CommandKind::Allocate,
            Box::new(|command, uow| {
                async move {
                    match command {
                        Command::Allocate(cmd) => handlers::allocate(cmd, &*uow).await,
                        other => Err(ServiceError::NoHandler(other.kind())),
                    }
                }
                .boxed()
            }),
        )
        .on_command(
            CommandKind::ChangeBatchQuantity,
            Box::new(|command, uow| {
                async move {
                    match command {
                        Command::ChangeBatchQuantity(cmd) => {
                            handlers::change_batch_quantity(cmd, &*uow)
                                .await
                                .map(|()| None)
                        }
                        other => Err(ServiceError::NoHandler(other.kind())),
                    }
                }
                .boxed()
            }),
        );
}

fn register_events<S: ProductStore + 'static>(
    registry: &mut HandlerRegistry<S>,
    deps: Dependencies,
) {
    let Dependencies {
        notifier,
        publisher,
        read_model,
        notification_destination,
    } = deps;
    let destination: Arc<str> = notification_destination.into();

    registry.on_event(
        EventKind::OutOfStock,
        Box::new(move |event, _| {
            let notifier = Arc::clone(&notifier);
            let destination = Arc::clone(&destination);
            async move {
                match &event {
                    Event::OutOfStock(data) => no_follow_ups(
                        handlers::send_out_of_stock_notification(
                            data,
                            notifier.as_ref(),
                            &destination,
                        )
                        .await,
                    ),
                    _ => Ok(Vec::new()),
                }
            }
            .boxed()
        }),
    );

    registry.on_event(
        EventKind::Allocated,
        Box::new(move |event, _| {
            let publisher = Arc::clone(&publisher);
            async move {
                match &event {
                    Event::Allocated(data) => no_follow_ups(
                        handlers::publish_allocated_event(data, publisher.as_ref()).await,
                    ),
                    _ => Ok(Vec::new()),
                }
            }
            .boxed()
        }),
    );

    let view = Arc::clone(&read_model);
    registry.on_event(
        EventKind::Allocated,
        Box::new(move |event, _| {
            let view = Arc::clone(&view);
            async move {
                match &event {
                    Event::Allocated(data) => no_follow_ups(
                        handlers::add_allocation_to_read_model(data, view.as_ref()).await,
                    ),
                    _ => Ok(Vec::new()),
                }
            }
            .boxed()
        }),
    );

    registry.on_event(
        EventKind::Deallocated,
        Box::new(move |event, _| {
            let view = Arc::clone(&read_model);
            async move {
                match &event {
                    Event::Deallocated(data) => no_follow_ups(
                        handlers::remove_allocation_from_read_model(data, view.as_ref()).await,
                    ),
                    _ => Ok(Vec::new()),
                }
            }
            .boxed()
        }),
    );

    registry.on_event(
        EventKind::Deallocated,
        Box::new(|event, _| {
            let follow_ups = match &event {
                Event::Deallocated(data) => vec![handlers::reallocate(data).into()],
                _ => Vec::new(),
            };
            async move { Ok(follow_ups) }.boxed()
        }),
    );
}

fn no_follow_ups(result: Result<()>) -> Result<Vec<Command>> {
    result.map(|()| Vec::new())
}
