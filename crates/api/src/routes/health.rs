//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use projections::ReadModel;
use serde::Serialize;
use store::ProductStore;

use crate::routes::allocations::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub read_model: &'static str,
    pub read_model_rows: usize,
}

/// GET /health: liveness plus the size of the allocations read model.
pub async fn check<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        read_model: ReadModel::name(&state.allocations),
        read_model_rows: state.allocations.count(),
    })
}
