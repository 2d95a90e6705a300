//! Outbound collaborators used by event handlers.

pub mod notifications;
pub mod publisher;

pub use notifications::{InMemoryNotifier, Notifier, SentNotification};
pub use publisher::{InMemoryPublisher, PublishedMessage, Publisher};
