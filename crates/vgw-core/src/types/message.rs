//! The in-process contract between the adapter and the platform.
//!
//! Outbound: the platform issues [`Command`]s through the adapter façade.
//! Inbound: the adapter emits [`AdapterEvent`]s on an unbounded channel the
//! platform polls. No wire format is implied — this is purely in-process
//! message passing.

use serde::{Deserialize, Serialize};

use super::{OrderState, SecurityRef, Side};

// ---------------------------------------------------------------------------
// Outbound commands (platform → adapter)
// ---------------------------------------------------------------------------

/// A canonical outbound command.
///
/// Order commands are correlated: the façade allocates an internal
/// transaction id before the native call and returns it to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Register a new order.
    OrderRegister {
        security: SecurityRef,
        side: Side,
        price: f64,
        volume: f64,
    },
    /// Cancel a previously registered order by its internal transaction id.
    OrderCancel { transaction_id: i64 },
    /// Replace price/volume of a previously registered order.
    OrderReplace {
        transaction_id: i64,
        price: f64,
        volume: f64,
    },
    /// Look up instruments matching a code pattern.
    SecurityLookup { code: String },
    /// Subscribe to level-1/quote data for an instrument.
    MarketDataSubscribe { security: SecurityRef },
    /// Unsubscribe from an instrument.
    MarketDataUnsubscribe { security: SecurityRef },
}

// ---------------------------------------------------------------------------
// Inbound canonical events (adapter → platform)
// ---------------------------------------------------------------------------

/// A price/volume pair.
pub type PriceVolume = (f64, f64);

/// A canonical event emitted by the adapter to the platform inbound queue.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    /// Every used channel reached its connected state.
    Connected,

    /// The logical connection went down. `error` is set when the cause was a
    /// failure rather than an orderly disconnect.
    Disconnected { error: Option<String> },

    /// An order's canonical state advanced.
    OrderReport {
        /// Internal transaction id (or adopted external id for foreign orders).
        transaction_id: i64,
        /// Canonical lifecycle state derived from the latest venue report.
        state: OrderState,
        price: f64,
        volume: f64,
        /// Quantity still unfilled.
        remaining: f64,
        /// Failure reason for `Failed` reports.
        error: Option<String>,
    },

    /// A coherent level-1 snapshot for one instrument at one timestamp.
    Level1Change {
        security: SecurityRef,
        time_ms: u64,
        bid: Option<PriceVolume>,
        ask: Option<PriceVolume>,
        last: Option<PriceVolume>,
    },

    /// A depth snapshot.
    QuoteChange {
        security: SecurityRef,
        time_ms: u64,
        bids: Vec<PriceVolume>,
        asks: Vec<PriceVolume>,
    },

    /// Portfolio/position value change from the PnL channel.
    PositionChange {
        account: String,
        /// `None` for account-level (portfolio) changes.
        security: Option<SecurityRef>,
        current_value: Option<f64>,
        realized_pnl: Option<f64>,
        unrealized_pnl: Option<f64>,
    },

    /// One completed candle from the historical channel.
    Candle {
        security: SecurityRef,
        /// Open time of the candle interval.
        open_time_ms: u64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    },

    /// Instrument reference data from a security lookup.
    SecurityInfo {
        security: SecurityRef,
        name: String,
        price_step: f64,
    },

    /// A data-level error (isolated callback fault, correlation miss, ...).
    /// The connection stays up.
    Error { message: String },
}

/// Sender half of the adapter event channel.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<AdapterEvent>;

/// Receiver half of the adapter event channel.
///
/// The platform polls this to receive canonical events; the adapter never
/// blocks on it.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AdapterEvent>;
