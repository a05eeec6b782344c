//! Native-side order report vocabulary.
//!
//! Venues describe order progress with a report taxonomy far richer than the
//! canonical [`OrderState`](super::OrderState) lifecycle. The adapter's order
//! state normalizer consumes these payloads; nothing downstream of the
//! adapter ever sees them.

use serde::{Deserialize, Serialize};

use super::{SecurityRef, Side};

/// Venue report classes, modeled on the union of report types the supported
/// session kinds emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    /// Accepted by the gateway, in flight to the venue.
    Received,
    /// Partial or complete fill.
    Fill,
    /// Modify accepted.
    Modify,
    /// Generic status snapshot (e.g. open-order replay).
    Status,
    /// Commission adjustment on a working or closed order.
    Commission,
    /// Trade correction issued by the venue.
    TradeCorrect,
    /// Cancel confirmed.
    Cancel,
    /// Stop/condition trigger fired.
    Trigger,
    /// Stop/condition trigger pulled.
    TriggerPulled,
    /// Order failed at the gateway.
    Failure,
    /// Order rejected by the venue.
    Reject,
    /// Cancel request refused.
    NotCancelled,
    /// Modify request refused.
    NotModified,
    /// Fill busted by the venue.
    Bust,
    /// Start-of-day position carry report.
    SodUpdate,
}

/// One order report as delivered by a native session callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReportPayload {
    /// Report class.
    pub report_type: ReportType,
    /// Echo of the internal transaction id the adapter tagged onto the
    /// request, if the venue round-trips it.
    pub tag: Option<i64>,
    /// Venue-assigned order identifier.
    pub external_id: String,
    /// Instrument the order is working on.
    pub security: SecurityRef,
    /// Buy or sell.
    pub side: Side,
    /// Order price.
    pub price: f64,
    /// Original order quantity.
    pub volume: f64,
    /// Quantity still unfilled. Single source of truth for open-vs-done.
    pub remaining: f64,
    /// Cumulative filled quantity.
    pub filled: f64,
    /// Human-readable failure reason, when the venue provides one.
    pub reason: Option<String>,
}
