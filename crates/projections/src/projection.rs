//! Core projection trait.

use async_trait::async_trait;
use domain::Event;

use crate::Result;

/// A projection that applies domain events to a read model.
///
/// Projections are fed by the message bus after the write side has
/// committed, so they only ever see events for persisted changes.
/// Events a projection does not care about are ignored.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &Event) -> Result<()>;
}
