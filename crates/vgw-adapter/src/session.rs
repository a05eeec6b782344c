//! The native session seam.
//!
//! Everything venue-specific sits behind [`NativeSession`]: a synchronous,
//! callback-registering handle shaped like the vendor SDK session objects the
//! adapter was built for. The adapter registers one handler per
//! [`EventKind`] and issues outbound verbs; the session invokes handlers on
//! its own thread(s), possibly concurrently with an in-flight outbound call.

use vgw_core::error::AdapterError;
use vgw_core::types::{
    AlertKind, ChannelId, OrderReportPayload, SecurityRef, Side, UpdateKind,
};
use vgw_core::config::ChannelEndpoints;

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Classes of native callbacks a session can deliver.
///
/// Vendor SDKs expose dozens of bespoke callbacks; the adapter collapses them
/// into these kinds and routes everything through one dispatch entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connection-lifecycle alerts (per channel).
    Alert,
    /// Order progress reports.
    OrderReport,
    /// Best-bid fragments.
    BestBid,
    /// Best-ask fragments.
    BestAsk,
    /// End-of-quote markers (flush signal for fragmented updates).
    QuoteEnd,
    /// Direct level-1 field updates (last trade etc.).
    Level1,
    /// Depth snapshots.
    Book,
    /// Completed candles from the historical channel.
    Candle,
    /// Instrument reference data.
    SecurityData,
    /// Account/position PnL updates.
    Pnl,
}

impl EventKind {
    /// All kinds, in the order the façade registers them. Teardown walks this
    /// list in reverse.
    pub const ALL: [EventKind; 10] = [
        EventKind::Alert,
        EventKind::OrderReport,
        EventKind::BestBid,
        EventKind::BestAsk,
        EventKind::QuoteEnd,
        EventKind::Level1,
        EventKind::Book,
        EventKind::Candle,
        EventKind::SecurityData,
        EventKind::Pnl,
    ];
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A connection-lifecycle alert for one sub-channel.
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pub channel: ChannelId,
    pub kind: AlertKind,
    pub message: String,
}

/// One best-bid or best-ask fragment of a possibly multi-part update.
#[derive(Debug, Clone)]
pub struct QuoteFragment {
    pub security: SecurityRef,
    pub side: Side,
    pub price: f64,
    pub volume: f64,
    pub update: UpdateKind,
    pub time_ms: u64,
}

/// Flush marker for fragmented quote updates on one instrument.
#[derive(Debug, Clone)]
pub struct QuoteMarker {
    pub security: SecurityRef,
    pub time_ms: u64,
}

/// A direct level-1 update (last trade).
#[derive(Debug, Clone)]
pub struct Level1Payload {
    pub security: SecurityRef,
    pub time_ms: u64,
    pub last_price: f64,
    pub last_volume: f64,
}

/// A depth snapshot.
#[derive(Debug, Clone)]
pub struct BookPayload {
    pub security: SecurityRef,
    pub time_ms: u64,
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
}

/// One completed candle.
#[derive(Debug, Clone)]
pub struct CandlePayload {
    pub security: SecurityRef,
    pub open_time_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Instrument reference data.
#[derive(Debug, Clone)]
pub struct SecurityDataPayload {
    pub security: SecurityRef,
    pub name: String,
    pub price_step: f64,
}

/// Account or per-instrument PnL update.
#[derive(Debug, Clone)]
pub struct PnlPayload {
    pub account: String,
    pub security: Option<SecurityRef>,
    pub current_value: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub unrealized_pnl: Option<f64>,
}

/// The typed payload delivered with each callback.
#[derive(Debug, Clone)]
pub enum NativePayload {
    Alert(AlertPayload),
    OrderReport(OrderReportPayload),
    Quote(QuoteFragment),
    QuoteMarker(QuoteMarker),
    Level1(Level1Payload),
    Book(BookPayload),
    Candle(CandlePayload),
    SecurityData(SecurityDataPayload),
    Pnl(PnlPayload),
}

/// A registered native callback.
///
/// Invoked synchronously from session-owned threads; must never block on a
/// lock a concurrent `send()` could be holding.
pub type NativeHandler = Box<dyn Fn(NativePayload) + Send + Sync>;

// ---------------------------------------------------------------------------
// Session trait
// ---------------------------------------------------------------------------

/// A venue's native session handle.
///
/// # Lifecycle
///
/// 1. `register` one handler per [`EventKind`] (the adapter records the
///    order so teardown can unregister in exact reverse).
/// 2. `login` with the configured channel endpoints.
/// 3. Outbound verbs (`submit_order`, `subscribe_md`, ...). Each correlated
///    verb carries the adapter's transaction id as `tag`; sessions that
///    round-trip it echo it back in report payloads.
/// 4. `logout`, then `shutdown` once every handler has been unregistered.
pub trait NativeSession: Send + Sync + 'static {
    /// Begin connecting every configured channel. Alerts report progress.
    fn login(&self, endpoints: &ChannelEndpoints) -> Result<(), AdapterError>;

    /// Orderly logout; channels report `ConnectionClosed` alerts.
    fn logout(&self) -> Result<(), AdapterError>;

    /// Release the native handle. Called only after all handlers are gone.
    fn shutdown(&self);

    /// Install the handler for one callback class (replaces any previous).
    fn register(&self, kind: EventKind, handler: NativeHandler);

    /// Remove the handler for one callback class.
    fn unregister(&self, kind: EventKind);

    fn submit_order(
        &self,
        tag: i64,
        security: &SecurityRef,
        side: Side,
        price: f64,
        volume: f64,
    ) -> Result<(), AdapterError>;

    fn cancel_order(&self, tag: i64, external_id: &str) -> Result<(), AdapterError>;

    fn replace_order(
        &self,
        tag: i64,
        external_id: &str,
        price: f64,
        volume: f64,
    ) -> Result<(), AdapterError>;

    fn lookup_security(&self, tag: i64, code: &str) -> Result<(), AdapterError>;

    fn subscribe_md(&self, security: &SecurityRef) -> Result<(), AdapterError>;

    fn unsubscribe_md(&self, security: &SecurityRef) -> Result<(), AdapterError>;
}
