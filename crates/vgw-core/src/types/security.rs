//! Security reference — the stable composite key for instruments.

use serde::{Deserialize, Serialize};

/// Venue code + instrument code forming a stable composite key.
///
/// Both parts are opaque strings as far as the gateway is concerned. A
/// `SecurityRef` is never reused across venues without an explicit mapping,
/// so it is safe as a table key for quotes and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRef {
    /// Venue (exchange/board) code, e.g. `"CME"`.
    pub venue: String,
    /// Instrument code, e.g. `"ESZ6"`.
    pub code: String,
}

impl SecurityRef {
    pub fn new(venue: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            code: code.into(),
        }
    }
}

impl std::fmt::Display for SecurityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.code, self.venue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let sec = SecurityRef::new("CME", "ESZ6");
        assert_eq!(sec.to_string(), "ESZ6@CME");
    }

    #[test]
    fn distinct_venues_distinct_keys() {
        let a = SecurityRef::new("CME", "ESZ6");
        let b = SecurityRef::new("ICE", "ESZ6");
        assert_ne!(a, b);
    }
}
