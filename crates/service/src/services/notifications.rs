//! Notification sender trait and in-memory implementation.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::ServiceError;

/// Sends human-readable notifications, e.g. emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a message to a destination address.
    async fn send(&self, destination: &str, message: &str) -> Result<(), ServiceError>;
}

/// A notification that was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub destination: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<SentNotification>,
    fail_on_send: bool,
}

/// In-memory notifier that records what it sends.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail every send.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.lock().fail_on_send = fail;
    }

    /// Returns every notification sent so far.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.lock().sent.clone()
    }

    /// Returns the messages sent to one destination.
    pub fn sent_to(&self, destination: &str) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|n| n.destination == destination)
            .map(|n| n.message.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryNotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();

        if state.fail_on_send {
            return Err(ServiceError::Notification(format!(
                "mail server rejected message to {destination}"
            )));
        }

        state.sent.push(SentNotification {
            destination: destination.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
