//! Listener error types.

use thiserror::Error;

/// Errors a listener can surface to the bus.
///
/// The bus never propagates these to the publisher; they are logged,
/// counted and dropped.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The mail boundary refused or failed a dispatch.
    #[error("Mail dispatch error: {0}")]
    Mail(String),

    /// The analytics boundary failed to record a fact.
    #[error("Analytics error: {0}")]
    Analytics(String),
}

/// Result type for listener operations.
pub type Result<T> = std::result::Result<T, ListenerError>;
