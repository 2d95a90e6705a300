//! Channel ingress: lets a transport hand raw channel messages to the
//! subscriber over HTTP.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::ApiError;
use crate::subscriber::{ChannelMessage, command_from_channel};

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

/// POST /channels/{channel}: queue a JSON payload for the subscriber.
///
/// Payloads that would be rejected by the subscriber are refused here with
/// 400, so the publisher learns about them. Handling happens asynchronously.
#[tracing::instrument(skip(sender, payload))]
pub async fn publish(
    State(sender): State<mpsc::Sender<ChannelMessage>>,
    Path(channel): Path<String>,
    payload: String,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    command_from_channel(&channel, &payload).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    sender
        .send(ChannelMessage::new(channel, payload))
        .await
        .map_err(|_| ApiError::Unavailable("channel subscriber is not running".to_string()))?;

    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { accepted: true })))
}
