//! Enumerations used throughout the venue gateway.
//!
//! These form the canonical vocabulary: every venue's native order, report,
//! and connection taxonomy is normalized onto these before leaving the
//! adapter.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Order lifecycle
// ---------------------------------------------------------------------------

/// Canonical order state — unified across all venues.
///
/// Transitions are monotonic-ish: once `Done` or `Failed` is reached, only a
/// full adapter reset moves an order out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// No state claim (unmapped report types land here).
    #[default]
    None,
    /// In flight to the venue, not yet acknowledged.
    Pending,
    /// Accepted and still working (remaining quantity > 0).
    Active,
    /// Fully filled, cancelled, or expired without error.
    Done,
    /// Rejected or otherwise explicitly failed.
    Failed,
}

impl OrderState {
    /// `Done` and `Failed` are terminal: no transition out absent a reset.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Buy or sell direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// The kind of correlated request a transaction record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Order,
    Cancel,
    Replace,
    Lookup,
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// One independently-connecting sub-endpoint of a venue's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    Trading,
    MarketData,
    Pnl,
    Historical,
    Admin,
}

impl ChannelId {
    /// All channels, in registration order.
    pub const ALL: [ChannelId; 5] = [
        ChannelId::Trading,
        ChannelId::MarketData,
        ChannelId::Pnl,
        ChannelId::Historical,
        ChannelId::Admin,
    ];
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trading => write!(f, "trading"),
            Self::MarketData => write!(f, "market-data"),
            Self::Pnl => write!(f, "pnl"),
            Self::Historical => write!(f, "historical"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// State of one sub-channel.
///
/// Channels configured without an endpoint stay `NotUsed` and never block the
/// aggregate connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelState {
    NotUsed,
    Connecting,
    Connected,
    Failed,
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// How a best-bid/best-ask fragment relates to its neighbors.
///
/// Some venues deliver one logical level-1 update as several fragments
/// bracketed by `Begin`/`End`; `Solo` fragments are already complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    Solo,
    Begin,
    Middle,
    Aggregated,
    End,
    Clear,
}

// ---------------------------------------------------------------------------
// Session alerts
// ---------------------------------------------------------------------------

/// Connection-lifecycle alerts emitted by a native session per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    ConnectionOpened,
    LoginComplete,
    LoginFailed,
    ConnectionClosed,
    ConnectionBroken,
    ForcedLogout,
    TradingEnabled,
    TradingDisabled,
    ShutdownSignal,
}
