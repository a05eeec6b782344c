//! Typed error definitions for the venue gateway.
//!
//! Provides [`AdapterError`] for domain-specific errors that are more
//! informative than plain `anyhow::Error` strings. All variants implement
//! `std::error::Error` via `thiserror`, so they integrate seamlessly with
//! `anyhow::Result`.
//!
//! The taxonomy follows the adapter's fault model: connection-level faults
//! surface as `Disconnected` events, data-level faults stay attached to the
//! request or callback that caused them.

use thiserror::Error;

/// Domain-specific errors for the venue gateway.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A sub-channel failed to reach its connected state.
    #[error("connection error: {0}")]
    Connection(String),

    /// A cancel/replace referenced a transaction the correlator never issued.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    /// An exception captured inside a native callback frame.
    #[error("callback fault in {0}: {1}")]
    Callback(String, String),

    /// A command was issued while the adapter is not connected.
    #[error("adapter is not connected")]
    NotConnected,

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Native session call failed (login, order submission, subscription).
    #[error("session error: {0}")]
    Session(String),
}
