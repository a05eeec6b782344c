//! # vgw-core
//!
//! Core crate for the venue gateway, providing:
//!
//! - **Types** (`types`) — canonical enums, commands, events, security keys
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `AdapterError` via thiserror
//! - **Time utilities** (`time_util`) — millisecond/microsecond timestamps
//! - **Logging** (`logging`) — tracing-based structured logging
//!
//! The adapter core itself lives in `vgw-adapter`; this crate only defines
//! the venue-agnostic contract shared between the adapter and the platform.

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
