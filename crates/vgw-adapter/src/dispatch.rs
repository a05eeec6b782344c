//! Central callback dispatch.
//!
//! Every native callback, whatever its kind, funnels through one
//! [`Dispatcher::dispatch`] entry point that updates the shared tables and
//! emits canonical events. Handlers registered with the session are thin
//! closures over this method, wrapped by the isolation layer.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use vgw_core::types::{
    AdapterEvent, AlertKind, ChannelState, EventSender, OrderReportPayload, OrderState,
};

use crate::channels::{AggregateTransition, ChannelTable};
use crate::coalesce::QuoteAccumulator;
use crate::correlator::Correlator;
use crate::order_state::{OrderStateTable, normalize};
use crate::session::{
    AlertPayload, BookPayload, CandlePayload, EventKind, Level1Payload, NativePayload,
    PnlPayload, QuoteFragment, QuoteMarker, SecurityDataPayload,
};

/// The shared state tables of one adapter instance.
pub struct Tables {
    pub correlator: Correlator,
    pub channels: ChannelTable,
    pub orders: OrderStateTable,
    pub quotes: QuoteAccumulator,
}

impl Tables {
    /// Drop every record in every table. Channel seeds are restored.
    pub fn clear(&self) {
        self.correlator.clear();
        self.channels.reset();
        self.orders.clear();
        self.quotes.clear();
    }
}

type TeardownHook = Box<dyn Fn() + Send + Sync>;

/// Routes typed native payloads into table updates and canonical events.
pub struct Dispatcher {
    label: String,
    tables: Arc<Tables>,
    events: EventSender,
    /// Invoked when the venue announces its own shutdown; installed by the
    /// façade to unwind handler registrations.
    teardown: Mutex<Option<TeardownHook>>,
}

impl Dispatcher {
    pub fn new(label: &str, tables: Arc<Tables>, events: EventSender) -> Self {
        Self {
            label: label.to_string(),
            tables,
            events,
            teardown: Mutex::new(None),
        }
    }

    pub fn set_teardown(&self, hook: TeardownHook) {
        *self.teardown.lock().unwrap_or_else(|e| e.into_inner()) = Some(hook);
    }

    /// Handle one native callback.
    ///
    /// A payload that does not match its declared kind is a session bug; it is
    /// logged and skipped rather than propagated.
    pub fn dispatch(&self, kind: EventKind, payload: NativePayload) {
        match (kind, payload) {
            (EventKind::Alert, NativePayload::Alert(p)) => self.on_alert(p),
            (EventKind::OrderReport, NativePayload::OrderReport(p)) => self.on_order_report(p),
            (
                EventKind::BestBid | EventKind::BestAsk,
                NativePayload::Quote(p),
            ) => self.on_quote(p),
            (EventKind::QuoteEnd, NativePayload::QuoteMarker(p)) => self.on_quote_marker(p),
            (EventKind::Level1, NativePayload::Level1(p)) => self.on_level1(p),
            (EventKind::Book, NativePayload::Book(p)) => self.on_book(p),
            (EventKind::Candle, NativePayload::Candle(p)) => self.on_candle(p),
            (EventKind::SecurityData, NativePayload::SecurityData(p)) => self.on_security(p),
            (EventKind::Pnl, NativePayload::Pnl(p)) => self.on_pnl(p),
            (kind, payload) => {
                warn!(
                    "[{}] payload does not match callback kind {kind:?}: {payload:?}",
                    self.label
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-kind handlers
    // -----------------------------------------------------------------------

    fn on_alert(&self, alert: AlertPayload) {
        let label = &self.label;
        info!(
            "[{label}] alert on {}: {:?} {}",
            alert.channel, alert.kind, alert.message
        );

        let error = (!alert.message.is_empty()).then(|| alert.message.clone());

        let edge = match alert.kind {
            // Physical connect precedes login; no state change yet.
            AlertKind::ConnectionOpened => None,

            AlertKind::LoginComplete => {
                self.tables
                    .channels
                    .apply(alert.channel, ChannelState::Connected, None)
            }

            AlertKind::LoginFailed | AlertKind::ConnectionBroken | AlertKind::ForcedLogout => {
                let error = error.or_else(|| Some(format!("{:?} on {}", alert.kind, alert.channel)));
                self.tables
                    .channels
                    .apply(alert.channel, ChannelState::Failed, error)
            }

            // Orderly close carries no error.
            AlertKind::ConnectionClosed => {
                self.tables
                    .channels
                    .apply(alert.channel, ChannelState::Failed, None)
            }

            AlertKind::TradingEnabled | AlertKind::TradingDisabled => None,

            AlertKind::ShutdownSignal => {
                let hook = self
                    .teardown
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take();
                if let Some(hook) = hook {
                    info!("[{label}] venue shutdown signal, unwinding registrations");
                    hook();
                }
                None
            }
        };

        match edge {
            Some(AggregateTransition::Connected) => {
                let _ = self.events.send(AdapterEvent::Connected);
            }
            Some(AggregateTransition::Disconnected { error }) => {
                let _ = self.events.send(AdapterEvent::Disconnected { error });
            }
            None => {}
        }
    }

    fn on_order_report(&self, report: OrderReportPayload) {
        let tables = &self.tables;

        // A report with our tag is one of ours; bind the venue id to it.
        // Without a tag the external id is the only handle, possibly a
        // foreign order from another client of the same account.
        let transaction_id = match report.tag {
            Some(tag) => {
                if !report.external_id.is_empty() {
                    tables.correlator.assign_external(tag, &report.external_id);
                }
                tag
            }
            None if !report.external_id.is_empty() => {
                tables.correlator.resolve_or_adopt(&report.external_id)
            }
            None => {
                warn!(
                    "[{}] order report with neither tag nor external id: {report:?}",
                    self.label
                );
                return;
            }
        };

        let normalized = normalize(report.report_type, report.remaining);
        if normalized.state == OrderState::None {
            debug!(
                "[{}] informational report {:?} for transaction {transaction_id}",
                self.label, report.report_type
            );
            return;
        }

        let effective = tables.orders.apply(transaction_id, normalized.state);
        if effective != normalized.state {
            // Clamped by a sticky terminal state; nothing new to report.
            return;
        }

        if effective.is_terminal() {
            tables.correlator.complete(transaction_id);
        }

        let error = if effective == OrderState::Failed {
            report
                .reason
                .clone()
                .or_else(|| normalized.reason.map(str::to_string))
        } else {
            None
        };

        let _ = self.events.send(AdapterEvent::OrderReport {
            transaction_id,
            state: effective,
            price: report.price,
            volume: report.volume,
            remaining: report.remaining,
            error,
        });
    }

    fn on_quote(&self, fragment: QuoteFragment) {
        for event in self.tables.quotes.apply(fragment) {
            let _ = self.events.send(event);
        }
    }

    fn on_quote_marker(&self, marker: QuoteMarker) {
        for event in self.tables.quotes.flush_security(&marker.security) {
            let _ = self.events.send(event);
        }
    }

    fn on_level1(&self, p: Level1Payload) {
        let _ = self.events.send(AdapterEvent::Level1Change {
            security: p.security,
            time_ms: p.time_ms,
            bid: None,
            ask: None,
            last: Some((p.last_price, p.last_volume)),
        });
    }

    fn on_book(&self, p: BookPayload) {
        let _ = self.events.send(AdapterEvent::QuoteChange {
            security: p.security,
            time_ms: p.time_ms,
            bids: p.bids,
            asks: p.asks,
        });
    }

    fn on_candle(&self, p: CandlePayload) {
        let _ = self.events.send(AdapterEvent::Candle {
            security: p.security,
            open_time_ms: p.open_time_ms,
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
            volume: p.volume,
        });
    }

    fn on_security(&self, p: SecurityDataPayload) {
        let _ = self.events.send(AdapterEvent::SecurityInfo {
            security: p.security,
            name: p.name,
            price_step: p.price_step,
        });
    }

    fn on_pnl(&self, p: PnlPayload) {
        let _ = self.events.send(AdapterEvent::PositionChange {
            account: p.account,
            security: p.security,
            current_value: p.current_value,
            realized_pnl: p.realized_pnl,
            unrealized_pnl: p.unrealized_pnl,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgw_core::config::ChannelEndpoints;
    use vgw_core::types::{ChannelId, EventReceiver, ReportType, SecurityRef, Side, UpdateKind};

    fn endpoints() -> ChannelEndpoints {
        ChannelEndpoints {
            trading: Some("tcp://t".into()),
            market_data: Some("tcp://m".into()),
            pnl: None,
            historical: None,
            admin: None,
        }
    }

    fn dispatcher() -> (Dispatcher, EventReceiver) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let tables = Arc::new(Tables {
            correlator: Correlator::new(),
            channels: ChannelTable::new(&endpoints()),
            orders: OrderStateTable::new(),
            quotes: QuoteAccumulator::new(),
        });
        (Dispatcher::new("test", tables, tx), rx)
    }

    fn alert(channel: ChannelId, kind: AlertKind, message: &str) -> NativePayload {
        NativePayload::Alert(AlertPayload {
            channel,
            kind,
            message: message.to_string(),
        })
    }

    fn report(
        tag: Option<i64>,
        external: &str,
        report_type: ReportType,
        remaining: f64,
    ) -> NativePayload {
        NativePayload::OrderReport(OrderReportPayload {
            report_type,
            tag,
            external_id: external.to_string(),
            security: SecurityRef::new("SIM", "ESZ6"),
            side: Side::Buy,
            price: 100.0,
            volume: 5.0,
            remaining,
            filled: 5.0 - remaining,
            reason: None,
        })
    }

    #[test]
    fn login_alerts_drive_the_aggregate_edge() {
        let (d, mut rx) = dispatcher();

        d.dispatch(
            EventKind::Alert,
            alert(ChannelId::Trading, AlertKind::ConnectionOpened, ""),
        );
        d.dispatch(
            EventKind::Alert,
            alert(ChannelId::Trading, AlertKind::LoginComplete, ""),
        );
        assert!(rx.try_recv().is_err());

        d.dispatch(
            EventKind::Alert,
            alert(ChannelId::MarketData, AlertKind::LoginComplete, ""),
        );
        assert!(matches!(rx.try_recv(), Ok(AdapterEvent::Connected)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn broken_channels_surface_the_failure_message() {
        let (d, mut rx) = dispatcher();
        d.dispatch(
            EventKind::Alert,
            alert(ChannelId::Trading, AlertKind::LoginComplete, ""),
        );
        d.dispatch(
            EventKind::Alert,
            alert(ChannelId::MarketData, AlertKind::LoginComplete, ""),
        );
        let _ = rx.try_recv(); // Connected

        d.dispatch(
            EventKind::Alert,
            alert(ChannelId::Trading, AlertKind::ConnectionBroken, "socket reset"),
        );
        d.dispatch(
            EventKind::Alert,
            alert(ChannelId::MarketData, AlertKind::ConnectionClosed, ""),
        );

        match rx.try_recv() {
            Ok(AdapterEvent::Disconnected { error }) => {
                assert_eq!(error.as_deref(), Some("socket reset"));
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    #[test]
    fn tagged_report_binds_external_and_reports_state() {
        let (d, mut rx) = dispatcher();
        let tag = d.tables.correlator.begin(vgw_core::types::TransactionKind::Order);

        d.dispatch(
            EventKind::OrderReport,
            report(Some(tag), "EX-9", ReportType::Status, 5.0),
        );

        match rx.try_recv() {
            Ok(AdapterEvent::OrderReport {
                transaction_id,
                state,
                remaining,
                ..
            }) => {
                assert_eq!(transaction_id, tag);
                assert_eq!(state, OrderState::Active);
                assert_eq!(remaining, 5.0);
            }
            other => panic!("expected order report, got {other:?}"),
        }
        assert_eq!(d.tables.correlator.resolve_by_external("EX-9"), Some(tag));
    }

    #[test]
    fn terminal_report_completes_the_transaction() {
        let (d, mut rx) = dispatcher();
        let tag = d.tables.correlator.begin(vgw_core::types::TransactionKind::Order);

        d.dispatch(
            EventKind::OrderReport,
            report(Some(tag), "EX-1", ReportType::Fill, 0.0),
        );

        match rx.try_recv() {
            Ok(AdapterEvent::OrderReport { state, .. }) => {
                assert_eq!(state, OrderState::Done);
            }
            other => panic!("expected order report, got {other:?}"),
        }
        assert!(d.tables.correlator.is_empty());

        // A late duplicate of the fill is clamped, not re-emitted.
        d.dispatch(
            EventKind::OrderReport,
            report(Some(tag), "EX-1", ReportType::Status, 5.0),
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn untagged_report_adopts_the_foreign_order() {
        let (d, mut rx) = dispatcher();

        d.dispatch(
            EventKind::OrderReport,
            report(None, "70001", ReportType::Status, 3.0),
        );

        match rx.try_recv() {
            Ok(AdapterEvent::OrderReport {
                transaction_id,
                state,
                ..
            }) => {
                assert_eq!(transaction_id, 70001);
                assert_eq!(state, OrderState::Active);
            }
            other => panic!("expected order report, got {other:?}"),
        }
    }

    #[test]
    fn failure_report_carries_a_reason() {
        let (d, mut rx) = dispatcher();
        let tag = d.tables.correlator.begin(vgw_core::types::TransactionKind::Order);

        d.dispatch(
            EventKind::OrderReport,
            report(Some(tag), "", ReportType::Reject, 5.0),
        );

        match rx.try_recv() {
            Ok(AdapterEvent::OrderReport { state, error, .. }) => {
                assert_eq!(state, OrderState::Failed);
                assert_eq!(error.as_deref(), Some("order rejected by venue"));
            }
            other => panic!("expected order report, got {other:?}"),
        }
    }

    #[test]
    fn quote_fragments_coalesce_through_dispatch() {
        let (d, mut rx) = dispatcher();
        let sec = SecurityRef::new("SIM", "ESZ6");

        let frag = |side, price, update| {
            NativePayload::Quote(QuoteFragment {
                security: sec.clone(),
                side,
                price,
                volume: 1.0,
                update,
                time_ms: 500,
            })
        };

        d.dispatch(EventKind::BestBid, frag(Side::Buy, 10.0, UpdateKind::Begin));
        d.dispatch(EventKind::BestAsk, frag(Side::Sell, 11.0, UpdateKind::Aggregated));
        assert!(rx.try_recv().is_err());

        d.dispatch(
            EventKind::QuoteEnd,
            NativePayload::QuoteMarker(QuoteMarker {
                security: sec.clone(),
                time_ms: 500,
            }),
        );

        match rx.try_recv() {
            Ok(AdapterEvent::Level1Change { bid, ask, .. }) => {
                assert_eq!(bid, Some((10.0, 1.0)));
                assert_eq!(ask, Some((11.0, 1.0)));
            }
            other => panic!("expected level1 snapshot, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_payload_is_skipped() {
        let (d, mut rx) = dispatcher();
        d.dispatch(
            EventKind::Level1,
            alert(ChannelId::Trading, AlertKind::LoginComplete, ""),
        );
        assert!(rx.try_recv().is_err());
        // The misrouted alert must not have touched the channel table.
        assert!(!d.tables.channels.is_connected());
    }
}
