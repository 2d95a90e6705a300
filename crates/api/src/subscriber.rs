//! Consumer for commands arriving on named channels.
//!
//! Other systems ask for allocations and report batch quantity changes by
//! publishing JSON on the `allocate` and `change_batch_quantity` channels.

use std::sync::Arc;

use domain::{Allocate, ChangeBatchQuantity, Command};
use service::MessageBus;
use store::ProductStore;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const ALLOCATE_CHANNEL: &str = "allocate";
pub const CHANGE_BATCH_QUANTITY_CHANNEL: &str = "change_batch_quantity";

/// Messages buffered between the ingress and the subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A raw message received on a channel.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: String,
    pub payload: String,
}

impl ChannelMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("No handler for channel {0}")]
    UnknownChannel(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Translates a channel message into the command it asks for.
///
/// - `allocate`: `{"order_id": .., "sku": .., "qty": ..}`
/// - `change_batch_quantity`: `{"reference": .., "sku": .., "qty": ..}`
pub fn command_from_channel(channel: &str, payload: &str) -> Result<Command, SubscriberError> {
    match channel {
        ALLOCATE_CHANNEL => Ok(serde_json::from_str::<Allocate>(payload)?.into()),
        CHANGE_BATCH_QUANTITY_CHANNEL => {
            Ok(serde_json::from_str::<ChangeBatchQuantity>(payload)?.into())
        }
        other => Err(SubscriberError::UnknownChannel(other.to_string())),
    }
}

/// Feeds every received message into the bus until the sender side closes.
///
/// A message that cannot be translated or handled is logged and skipped.
/// Returns the number of messages handled successfully.
pub async fn run_subscriber<S: ProductStore + 'static>(
    bus: Arc<MessageBus<S>>,
    mut messages: mpsc::Receiver<ChannelMessage>,
) -> usize {
    tracing::info!("channel subscriber starting");
    let mut handled = 0;

    while let Some(message) = messages.recv().await {
        tracing::debug!(channel = %message.channel, "handling channel message");

        let command = match command_from_channel(&message.channel, &message.payload) {
            Ok(command) => command,
            Err(err) => {
                metrics::counter!("subscriber_rejected_messages_total").increment(1);
                tracing::warn!(channel = %message.channel, error = %err, "dropping channel message");
                continue;
            }
        };

        match bus.handle(command).await {
            Ok(_) => handled += 1,
            Err(err) => {
                tracing::error!(channel = %message.channel, error = %err, "channel command failed");
            }
        }
    }

    tracing::info!(handled, "channel subscriber stopped");
    handled
}

/// Starts [`run_subscriber`] on its own task.
///
/// Returns the sender a transport feeds and the task handle, which resolves
/// to the handled count once every sender is dropped.
pub fn spawn_subscriber<S: ProductStore + 'static>(
    bus: Arc<MessageBus<S>>,
    capacity: usize,
) -> (mpsc::Sender<ChannelMessage>, JoinHandle<usize>) {
    let (sender, receiver) = mpsc::channel(capacity);
    let handle = tokio::spawn(run_subscriber(bus, receiver));
    (sender, handle)
}
