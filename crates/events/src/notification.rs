//! Customer and operations notifications.
//!
//! The listener turns every domain event into a templated email and
//! hands it to the [`MailDispatcher`] boundary. Actual delivery lives
//! behind that boundary; the crate ships a logging dispatcher and a
//! recording one for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::DomainEvent;
use serde_json::json;
use tokio::sync::RwLock;

use crate::Result;
use crate::error::ListenerError;
use crate::listener::EventListener;

/// A rendered-but-not-yet-sent email.
///
/// The template name selects the body; the context carries the values
/// the template interpolates.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    /// Template identifier, e.g. `order-confirmation`.
    pub template: &'static str,

    /// Values for the template.
    pub context: serde_json::Value,
}

/// Boundary through which notification emails leave the process.
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    /// Dispatches one email.
    async fn dispatch(&self, email: OutboundEmail) -> Result<()>;
}

/// Listener that emails on every domain event.
pub struct NotificationListener {
    mailer: Arc<dyn MailDispatcher>,
}

impl NotificationListener {
    /// Creates a listener over the given mail boundary.
    pub fn new(mailer: Arc<dyn MailDispatcher>) -> Self {
        Self { mailer }
    }

    fn email_for(event: &DomainEvent) -> OutboundEmail {
        match event {
            DomainEvent::OrderCreated(data) => OutboundEmail {
                template: "order-confirmation",
                context: json!({
                    "order_id": data.order_id,
                    "user_id": data.user_id,
                    "total": data.total.to_string(),
                    "items": data.item_count,
                }),
            },
            DomainEvent::OrderStatusChanged(data) => OutboundEmail {
                template: "order-status-update",
                context: json!({
                    "order_id": data.order_id,
                    "previous": data.previous,
                    "current": data.current,
                }),
            },
            DomainEvent::InventoryLowStock(data) => OutboundEmail {
                template: if data.critical {
                    "stock-alert-critical"
                } else {
                    "stock-alert"
                },
                context: json!({
                    "variant_id": data.variant_id,
                    "store_id": data.store_id,
                    "quantity": data.quantity,
                    "threshold": data.threshold,
                }),
            },
            DomainEvent::InventoryOutOfStock(data) => OutboundEmail {
                template: "out-of-stock-alert",
                context: json!({
                    "variant_id": data.variant_id,
                    "store_id": data.store_id,
                }),
            },
            DomainEvent::NewsPublished(data) => OutboundEmail {
                template: "newsletter",
                context: json!({
                    "title": data.title,
                    "slug": data.slug,
                }),
            },
        }
    }
}

#[async_trait]
impl EventListener for NotificationListener {
    fn name(&self) -> &'static str {
        "NotificationListener"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        let email = Self::email_for(event);
        let template = email.template;
        self.mailer.dispatch(email).await?;
        metrics::counter!("notification_emails_total").increment(1);
        tracing::debug!(template, event = event.name(), "notification email dispatched");
        Ok(())
    }
}

/// Dispatcher that only logs. The default boundary when no real mail
/// backend is wired up.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl MailDispatcher for LogMailer {
    async fn dispatch(&self, email: OutboundEmail) -> Result<()> {
        tracing::info!(
            template = email.template,
            context = %email.context,
            "email dispatched"
        );
        Ok(())
    }
}

/// Dispatcher that records every email, for tests.
///
/// Can be toggled to fail so callers can exercise failure isolation.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: RwLock<Vec<OutboundEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    /// Creates an empty recording mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent dispatch fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns a copy of every email dispatched so far.
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.read().await.clone()
    }

    /// Returns the template of every email dispatched so far, in order.
    pub async fn templates(&self) -> Vec<&'static str> {
        self.sent.read().await.iter().map(|e| e.template).collect()
    }

    /// Number of emails dispatched so far.
    pub async fn count(&self) -> usize {
        self.sent.read().await.len()
    }
}

#[async_trait]
impl MailDispatcher for RecordingMailer {
    async fn dispatch(&self, email: OutboundEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ListenerError::Mail("recording mailer set to fail".to_string()));
        }
        self.sent.write().await.push(email);
        Ok(())
    }
}
