//! Core listener trait.

use async_trait::async_trait;
use domain::DomainEvent;

use crate::Result;

/// A consumer of domain events.
///
/// Listeners are registered on the [`EventBus`](crate::EventBus) at
/// startup and receive every published event in registration order. A
/// listener that only cares about some events returns `Ok(())` for the
/// rest.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Returns the name of this listener, for logs and failure counters.
    fn name(&self) -> &'static str;

    /// Handles a single event.
    async fn handle(&self, event: &DomainEvent) -> Result<()>;
}
