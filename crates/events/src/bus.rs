//! In-process event bus.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{DomainEvent, EventSink};

use crate::listener::EventListener;

/// Delivers published events to registered listeners, in order.
///
/// The bus is the [`EventSink`] the services publish through. Delivery
/// is synchronous and best-effort: publication happens after the
/// triggering write has committed, and a listener failure is logged and
/// counted without touching the other listeners or the publisher. There
/// is no persistence or redelivery; a crash between commit and publish
/// drops the notification.
pub struct EventBus {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventBus {
    /// Creates a bus with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. Listeners receive events in registration
    /// order.
    pub fn register(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, event: DomainEvent) {
        metrics::counter!("domain_events_published_total").increment(1);
        tracing::debug!(
            event = event.name(),
            listeners = self.listeners.len(),
            "publishing domain event"
        );

        for listener in &self.listeners {
            if let Err(e) = listener.handle(&event).await {
                metrics::counter!("listener_failures_total").increment(1);
                tracing::warn!(
                    listener = listener.name(),
                    event = event.name(),
                    error = %e,
                    "listener failed, continuing"
                );
            }
        }
    }
}
