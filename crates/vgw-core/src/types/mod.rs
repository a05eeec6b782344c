//! Canonical data types shared between the adapter and the platform.
//!
//! Everything here is venue-agnostic: the adapter's job is to translate a
//! venue's native taxonomy into these shapes and nothing else.

pub mod enums;
pub mod message;
pub mod report;
pub mod security;

pub use enums::*;
pub use message::*;
pub use report::*;
pub use security::*;
