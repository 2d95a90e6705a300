//! Service layer for the allocation service.
//!
//! This crate turns commands into committed changes:
//! - [`UnitOfWork`] and [`Transaction`] give each handler one atomic scope
//! - [`handlers`] hold the use cases, one function per message type
//! - [`MessageBus`] runs a command and every event it causes to completion
//! - [`bootstrap`] binds handlers to their collaborators once at startup

pub mod bootstrap;
pub mod bus;
pub mod error;
pub mod handlers;
pub mod services;
pub mod unit_of_work;

pub use bootstrap::{DEFAULT_NOTIFICATION_DESTINATION, Dependencies, bootstrap};
pub use bus::{CommandHandler, EventHandler, HandlerRegistry, MessageBus};
pub use error::{Result, ServiceError};
pub use services::{
    InMemoryNotifier, InMemoryPublisher, Notifier, PublishedMessage, Publisher, SentNotification,
};
pub use unit_of_work::{Transaction, UnitOfWork};
