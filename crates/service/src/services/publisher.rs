//! External event publisher trait and in-memory implementation.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::Event;

use crate::error::ServiceError;

/// Publishes domain events to other systems over a named channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, event: &Event) -> Result<(), ServiceError>;
}

/// A message as it went out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<PublishedMessage>,
    fail_on_publish: bool,
}

/// In-memory publisher that keeps the JSON payloads it publishes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<Mutex<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail every publish.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.lock().fail_on_publish = fail;
    }

    /// Returns every message published so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Returns the events published on a topic, decoded from their payloads.
    pub fn events_on(&self, topic: &str) -> Vec<Event> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .filter_map(|m| serde_json::from_str(&m.payload).ok())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryPublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, event: &Event) -> Result<(), ServiceError> {
        let payload =
            serde_json::to_string(event).map_err(|e| ServiceError::Publish(e.to_string()))?;
        let mut state = self.lock();

        if state.fail_on_publish {
            return Err(ServiceError::Publish(format!("broker unavailable for {topic}")));
        }

        tracing::debug!(topic, event_type = event.event_type(), "event published");
        state.published.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_json_payload() {
        let publisher = InMemoryPublisher::new();
        let event = Event::allocated("o1".into(), "LAMP".into(), "b1".into(), 3);

        publisher.publish("line_allocated", &event).await.unwrap();

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert!(published[0].payload.contains("\"type\":\"Allocated\""));
        assert_eq!(publisher.events_on("line_allocated"), vec![event]);
    }

    #[tokio::test]
    async fn fail_on_publish() {
        let publisher = InMemoryPublisher::new();
        publisher.set_fail_on_publish(true);

        let result = publisher
            .publish("line_allocated", &Event::out_of_stock("LAMP".into()))
            .await;

        assert!(matches!(result, Err(ServiceError::Publish(_))));
        assert!(publisher.published().is_empty());
    }
}
