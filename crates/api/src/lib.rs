//! HTTP API and channel subscriber for the allocation service.
//!
//! Provides REST endpoints for adding batches and allocating order lines,
//! a consumer for commands arriving on named channels, and observability
//! through structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod subscriber;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::AllocationsView;
use service::{Dependencies, InMemoryNotifier, InMemoryPublisher, bootstrap};
use store::ProductStore;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::allocations::AppState;
use subscriber::ChannelMessage;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: ProductStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/batches", post(routes::allocations::add_batch::<S>))
        .route("/allocate", post(routes::allocations::allocate::<S>))
        .route(
            "/allocations/{order_id}",
            get(routes::allocations::list_for_order::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Routes that feed raw channel messages to a running subscriber.
///
/// Kept apart from [`create_app`] so the binary only exposes it when a
/// subscriber is actually consuming `sender`.
pub fn channel_router(sender: mpsc::Sender<ChannelMessage>) -> Router {
    Router::new()
        .route("/channels/{channel}", post(routes::channels::publish))
        .with_state(sender)
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: the message bus over `store`,
/// in-memory notifier and publisher, and the allocations read model.
pub fn create_default_state<S: ProductStore + 'static>(
    store: S,
    notification_destination: impl Into<String>,
) -> Arc<AppState<S>> {
    let allocations = AllocationsView::new();
    let deps = Dependencies {
        notifier: Arc::new(InMemoryNotifier::new()),
        publisher: Arc::new(InMemoryPublisher::new()),
        read_model: Arc::new(allocations.clone()),
        notification_destination: notification_destination.into(),
    };

    Arc::new(AppState {
        bus: Arc::new(bootstrap(store, deps)),
        allocations,
    })
}
