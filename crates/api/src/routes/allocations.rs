//! Batch and allocation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use domain::{Allocate, CreateBatch, OrderId};
use projections::AllocationsView;
use serde::{Deserialize, Serialize};
use service::MessageBus;
use store::ProductStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: ProductStore> {
    pub bus: Arc<MessageBus<S>>,
    pub allocations: AllocationsView,
}

// -- Request types --

#[derive(Deserialize)]
pub struct AddBatchRequest {
    pub reference: String,
    pub sku: String,
    pub qty: u32,
    pub eta: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct AllocateRequest {
    pub order_id: String,
    pub sku: String,
    pub qty: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct AllocateResponse {
    pub batch_ref: Option<String>,
}

#[derive(Serialize)]
pub struct AllocationResponse {
    pub sku: String,
    pub batch_ref: String,
}

// -- Handlers --

/// POST /batches: register a new batch of stock.
#[tracing::instrument(skip(state, req), fields(reference = %req.reference, sku = %req.sku))]
pub async fn add_batch<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AddBatchRequest>,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    let cmd = CreateBatch::new(req.reference, req.sku, req.qty, req.eta);
    state.bus.handle(cmd.into()).await?;

    Ok((StatusCode::CREATED, Json(SuccessResponse { success: true })))
}

/// POST /allocate: allocate an order line, returning the chosen batch.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id, sku = %req.sku))]
pub async fn allocate<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AllocateRequest>,
) -> Result<(StatusCode, Json<AllocateResponse>), ApiError> {
    let cmd = Allocate::new(req.order_id, req.sku, req.qty);
    let batch_ref = state.bus.handle(cmd.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(AllocateResponse {
            batch_ref: batch_ref.map(|r| r.to_string()),
        }),
    ))
}

/// GET /allocations/{order_id}: where each line of an order was allocated.
pub async fn list_for_order<S: ProductStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<AllocationResponse>>, ApiError> {
    let rows = state
        .allocations
        .allocations_for(&OrderId::new(order_id.as_str()))
        .await;

    if rows.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No allocations for order {order_id}"
        )));
    }

    Ok(Json(
        rows.into_iter()
            .map(|row| AllocationResponse {
                sku: row.sku.to_string(),
                batch_ref: row.batch_ref.to_string(),
            })
            .collect(),
    ))
}
