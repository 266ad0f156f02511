//! Event fan-out for the commerce platform.
//!
//! This crate provides the delivery side of the domain events:
//! - [`EventBus`], the in-process [`domain::EventSink`] implementation
//! - [`EventListener`] trait for consumers
//! - [`NotificationListener`] emailing through the [`MailDispatcher`] boundary
//! - [`AnalyticsListener`] recording purchases through the [`AnalyticsSink`] boundary
//!
//! Delivery is synchronous, post-commit and best-effort; a failing
//! listener is logged and counted without affecting anything else.

pub mod analytics;
pub mod bus;
pub mod error;
pub mod listener;
pub mod notification;

pub use analytics::{
    AnalyticsListener, AnalyticsSink, AnalyticsSummary, InMemoryAnalyticsSink, PurchaseFact,
};
pub use bus::EventBus;
pub use error::{ListenerError, Result};
pub use listener::EventListener;
pub use notification::{
    LogMailer, MailDispatcher, NotificationListener, OutboundEmail, RecordingMailer,
};
