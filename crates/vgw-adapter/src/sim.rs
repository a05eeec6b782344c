//! Simulated venue session.
//!
//! A self-contained [`NativeSession`] that reproduces the callback texture of
//! a real vendor SDK: a dedicated delivery thread invokes handlers
//! asynchronously to the outbound verb that triggered them, login fans out
//! per-channel alerts, orders acknowledge then fill, and subscriptions
//! deliver fragmented quote updates that exercise the coalescing path.
//!
//! Used by the runner for dry-runs and by integration-style tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use ahash::AHashMap;
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info};
use vgw_core::config::ChannelEndpoints;
use vgw_core::error::AdapterError;
use vgw_core::time_util::now_ms;
use vgw_core::types::{
    AlertKind, ChannelId, OrderReportPayload, ReportType, SecurityRef, Side, UpdateKind,
};

use crate::session::{
    AlertPayload, BookPayload, CandlePayload, EventKind, Level1Payload, NativeHandler,
    NativePayload, NativeSession, QuoteFragment, QuoteMarker, SecurityDataPayload,
};

enum Msg {
    Deliver(EventKind, NativePayload),
    Stop,
}

type SharedHandler = Arc<dyn Fn(NativePayload) + Send + Sync>;

/// Handler registry shared with the delivery thread.
struct Registry {
    handlers: Mutex<AHashMap<EventKind, SharedHandler>>,
}

impl Registry {
    /// Invoke the handler for one kind, holding the registry lock only for
    /// the lookup. Handlers may re-enter `register`/`unregister` (the
    /// shutdown-signal teardown path does exactly that).
    fn invoke(&self, kind: EventKind, payload: NativePayload) {
        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .cloned();
        match handler {
            Some(h) => h(payload),
            None => debug!("[sim] no handler for {kind:?}, dropping"),
        }
    }
}

#[derive(Debug, Clone)]
struct SimOrder {
    security: SecurityRef,
    side: Side,
    price: f64,
    volume: f64,
}

/// An in-process venue. Orders fill immediately; quotes are scripted.
pub struct SimSession {
    registry: Arc<Registry>,
    tx: Sender<Msg>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_external: AtomicU64,
    book: Mutex<AHashMap<String, SimOrder>>,
}

impl SimSession {
    pub fn new() -> Self {
        let registry = Arc::new(Registry {
            handlers: Mutex::new(AHashMap::new()),
        });
        let (tx, rx) = unbounded::<Msg>();

        let worker_registry = Arc::clone(&registry);
        let worker = std::thread::Builder::new()
            .name("sim-delivery".into())
            .spawn(move || delivery_loop(worker_registry, rx))
            .ok();

        Self {
            registry,
            tx,
            worker: Mutex::new(worker),
            next_external: AtomicU64::new(1),
            book: Mutex::new(AHashMap::new()),
        }
    }

    fn deliver(&self, kind: EventKind, payload: NativePayload) {
        let _ = self.tx.send(Msg::Deliver(kind, payload));
    }

    fn alert(&self, channel: ChannelId, kind: AlertKind, message: &str) {
        self.deliver(
            EventKind::Alert,
            NativePayload::Alert(AlertPayload {
                channel,
                kind,
                message: message.to_string(),
            }),
        );
    }

    fn report(&self, report: OrderReportPayload) {
        self.deliver(EventKind::OrderReport, NativePayload::OrderReport(report));
    }

    fn stop(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = self.tx.send(Msg::Stop);
            let _ = handle.join();
        }
    }
}

impl Default for SimSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn delivery_loop(registry: Arc<Registry>, rx: Receiver<Msg>) {
    for msg in rx {
        match msg {
            Msg::Deliver(kind, payload) => registry.invoke(kind, payload),
            Msg::Stop => break,
        }
    }
    debug!("[sim] delivery thread stopped");
}

impl NativeSession for SimSession {
    fn login(&self, endpoints: &ChannelEndpoints) -> Result<(), AdapterError> {
        info!("[sim] login");
        for channel in ChannelId::ALL {
            if endpoints.is_used(channel) {
                self.alert(channel, AlertKind::ConnectionOpened, "");
                self.alert(channel, AlertKind::LoginComplete, "");
            }
        }
        Ok(())
    }

    fn logout(&self) -> Result<(), AdapterError> {
        info!("[sim] logout");
        for channel in ChannelId::ALL {
            // Close alerts for unused channels are ignored downstream.
            self.alert(channel, AlertKind::ConnectionClosed, "");
        }
        self.alert(ChannelId::Admin, AlertKind::ShutdownSignal, "");
        Ok(())
    }

    fn shutdown(&self) {
        info!("[sim] shutdown");
        self.stop();
        self.book.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn register(&self, kind: EventKind, handler: NativeHandler) {
        self.registry
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, Arc::from(handler));
    }

    fn unregister(&self, kind: EventKind) {
        self.registry
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&kind);
    }

    fn submit_order(
        &self,
        tag: i64,
        security: &SecurityRef,
        side: Side,
        price: f64,
        volume: f64,
    ) -> Result<(), AdapterError> {
        let n = self.next_external.fetch_add(1, Ordering::Relaxed);
        let external = format!("SIM-{n}");

        self.book.lock().unwrap_or_else(|e| e.into_inner()).insert(
            external.clone(),
            SimOrder {
                security: security.clone(),
                side,
                price,
                volume,
            },
        );

        // Acknowledge working, then fill in full.
        self.report(OrderReportPayload {
            report_type: ReportType::Status,
            tag: Some(tag),
            external_id: external.clone(),
            security: security.clone(),
            side,
            price,
            volume,
            remaining: volume,
            filled: 0.0,
            reason: None,
        });
        self.report(OrderReportPayload {
            report_type: ReportType::Fill,
            tag: Some(tag),
            external_id: external,
            security: security.clone(),
            side,
            price,
            volume,
            remaining: 0.0,
            filled: volume,
            reason: None,
        });
        Ok(())
    }

    fn cancel_order(&self, tag: i64, external_id: &str) -> Result<(), AdapterError> {
        let order = self
            .book
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(external_id);

        match order {
            Some(order) => self.report(OrderReportPayload {
                report_type: ReportType::Cancel,
                tag: Some(tag),
                external_id: external_id.to_string(),
                security: order.security,
                side: order.side,
                price: order.price,
                volume: order.volume,
                remaining: 0.0,
                filled: 0.0,
                reason: None,
            }),
            None => self.report(OrderReportPayload {
                report_type: ReportType::NotCancelled,
                tag: Some(tag),
                external_id: external_id.to_string(),
                security: SecurityRef::new("SIM", "?"),
                side: Side::Buy,
                price: 0.0,
                volume: 0.0,
                remaining: 0.0,
                filled: 0.0,
                reason: Some(format!("unknown order {external_id}")),
            }),
        }
        Ok(())
    }

    fn replace_order(
        &self,
        tag: i64,
        external_id: &str,
        price: f64,
        volume: f64,
    ) -> Result<(), AdapterError> {
        let mut book = self.book.lock().unwrap_or_else(|e| e.into_inner());

        match book.get_mut(external_id) {
            Some(order) => {
                order.price = price;
                order.volume = volume;
                let order = order.clone();
                drop(book);
                self.report(OrderReportPayload {
                    report_type: ReportType::Modify,
                    tag: Some(tag),
                    external_id: external_id.to_string(),
                    security: order.security,
                    side: order.side,
                    price,
                    volume,
                    remaining: volume,
                    filled: 0.0,
                    reason: None,
                });
            }
            None => {
                drop(book);
                self.report(OrderReportPayload {
                    report_type: ReportType::NotModified,
                    tag: Some(tag),
                    external_id: external_id.to_string(),
                    security: SecurityRef::new("SIM", "?"),
                    side: Side::Buy,
                    price,
                    volume,
                    remaining: 0.0,
                    filled: 0.0,
                    reason: Some(format!("unknown order {external_id}")),
                });
            }
        }
        Ok(())
    }

    fn lookup_security(&self, tag: i64, code: &str) -> Result<(), AdapterError> {
        debug!("[sim] security lookup #{tag} for {code}");
        self.deliver(
            EventKind::SecurityData,
            NativePayload::SecurityData(SecurityDataPayload {
                security: SecurityRef::new("SIM", code),
                name: format!("Simulated {code}"),
                price_step: 0.25,
            }),
        );
        Ok(())
    }

    fn subscribe_md(&self, security: &SecurityRef) -> Result<(), AdapterError> {
        info!("[sim] subscribe {security}");
        let t = now_ms();

        let frag = |side, price, volume, update, time_ms| {
            NativePayload::Quote(QuoteFragment {
                security: security.clone(),
                side,
                price,
                volume,
                update,
                time_ms,
            })
        };

        // A complete single-fragment update.
        self.deliver(
            EventKind::BestBid,
            frag(Side::Buy, 100.0, 3.0, UpdateKind::Solo, t),
        );

        // A fragmented update closed by an end-of-quote marker.
        self.deliver(
            EventKind::BestBid,
            frag(Side::Buy, 100.25, 5.0, UpdateKind::Begin, t + 1),
        );
        self.deliver(
            EventKind::BestAsk,
            frag(Side::Sell, 100.75, 4.0, UpdateKind::Aggregated, t + 1),
        );
        self.deliver(
            EventKind::QuoteEnd,
            NativePayload::QuoteMarker(QuoteMarker {
                security: security.clone(),
                time_ms: t + 1,
            }),
        );

        // A depth snapshot and a last trade.
        self.deliver(
            EventKind::Book,
            NativePayload::Book(BookPayload {
                security: security.clone(),
                time_ms: t + 2,
                bids: vec![(100.25, 5.0), (100.0, 8.0)],
                asks: vec![(100.75, 4.0), (101.0, 6.0)],
            }),
        );
        self.deliver(
            EventKind::Level1,
            NativePayload::Level1(Level1Payload {
                security: security.clone(),
                time_ms: t + 3,
                last_price: 100.5,
                last_volume: 2.0,
            }),
        );

        // One completed candle, as the historical channel would replay it.
        self.deliver(
            EventKind::Candle,
            NativePayload::Candle(CandlePayload {
                security: security.clone(),
                open_time_ms: t.saturating_sub(60_000),
                open: 99.75,
                high: 100.75,
                low: 99.5,
                close: 100.5,
                volume: 120.0,
            }),
        );
        Ok(())
    }

    fn unsubscribe_md(&self, security: &SecurityRef) -> Result<(), AdapterError> {
        info!("[sim] unsubscribe {security}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgw_core::config::ConnectionConfig;
    use vgw_core::types::{AdapterEvent, Command, EventReceiver, OrderState};

    use crate::facade::Adapter;

    fn connected_adapter() -> (Adapter<SimSession>, EventReceiver) {
        let config = ConnectionConfig {
            venue: "sim".into(),
            channels: ChannelEndpoints {
                trading: Some("sim://trading".into()),
                market_data: Some("sim://md".into()),
                pnl: None,
                historical: None,
                admin: None,
            },
            quote_ttl_secs: None,
        };
        let (adapter, mut rx) = Adapter::new(&config, SimSession::new());
        adapter.connect().unwrap();

        match rx.blocking_recv() {
            Some(AdapterEvent::Connected) => {}
            other => panic!("expected Connected, got {other:?}"),
        }
        (adapter, rx)
    }

    #[test]
    fn order_acknowledges_then_fills() {
        let (adapter, mut rx) = connected_adapter();

        let id = adapter
            .send(Command::OrderRegister {
                security: SecurityRef::new("SIM", "ESZ6"),
                side: Side::Buy,
                price: 100.0,
                volume: 5.0,
            })
            .unwrap()
            .unwrap();

        match rx.blocking_recv() {
            Some(AdapterEvent::OrderReport {
                transaction_id,
                state,
                remaining,
                ..
            }) => {
                assert_eq!(transaction_id, id);
                assert_eq!(state, OrderState::Active);
                assert_eq!(remaining, 5.0);
            }
            other => panic!("expected ack, got {other:?}"),
        }

        match rx.blocking_recv() {
            Some(AdapterEvent::OrderReport {
                transaction_id,
                state,
                remaining,
                ..
            }) => {
                assert_eq!(transaction_id, id);
                assert_eq!(state, OrderState::Done);
                assert_eq!(remaining, 0.0);
            }
            other => panic!("expected fill, got {other:?}"),
        }

        adapter.reset();
    }

    #[test]
    fn subscription_delivers_coalesced_snapshots() {
        let (adapter, mut rx) = connected_adapter();
        let sec = SecurityRef::new("SIM", "ESZ6");

        adapter
            .send(Command::MarketDataSubscribe {
                security: sec.clone(),
            })
            .unwrap();

        // Solo bid.
        match rx.blocking_recv() {
            Some(AdapterEvent::Level1Change { bid, ask, .. }) => {
                assert_eq!(bid, Some((100.0, 3.0)));
                assert_eq!(ask, None);
            }
            other => panic!("expected solo snapshot, got {other:?}"),
        }

        // Fragmented update merged on the end marker.
        match rx.blocking_recv() {
            Some(AdapterEvent::Level1Change { bid, ask, .. }) => {
                assert_eq!(bid, Some((100.25, 5.0)));
                assert_eq!(ask, Some((100.75, 4.0)));
            }
            other => panic!("expected merged snapshot, got {other:?}"),
        }

        // Depth snapshot.
        match rx.blocking_recv() {
            Some(AdapterEvent::QuoteChange { bids, asks, .. }) => {
                assert_eq!(bids.len(), 2);
                assert_eq!(asks.len(), 2);
            }
            other => panic!("expected depth snapshot, got {other:?}"),
        }

        // Last trade.
        match rx.blocking_recv() {
            Some(AdapterEvent::Level1Change { last, .. }) => {
                assert_eq!(last, Some((100.5, 2.0)));
            }
            other => panic!("expected last trade, got {other:?}"),
        }

        // Historical candle replay.
        match rx.blocking_recv() {
            Some(AdapterEvent::Candle { close, volume, .. }) => {
                assert_eq!(close, 100.5);
                assert_eq!(volume, 120.0);
            }
            other => panic!("expected candle, got {other:?}"),
        }

        adapter.reset();
    }

    #[test]
    fn cancel_of_filled_order_is_refused_by_the_venue() {
        let (adapter, mut rx) = connected_adapter();

        let id = adapter
            .send(Command::OrderRegister {
                security: SecurityRef::new("SIM", "ESZ6"),
                side: Side::Sell,
                price: 101.0,
                volume: 2.0,
            })
            .unwrap()
            .unwrap();

        // Drain ack and fill; the fill evicts the correlation record.
        let _ = rx.blocking_recv();
        let _ = rx.blocking_recv();

        let err = adapter
            .send(Command::OrderCancel { transaction_id: id })
            .unwrap_err();
        assert!(matches!(err, AdapterError::UnknownTransaction(_)));

        adapter.reset();
    }

    #[test]
    fn lookup_returns_reference_data() {
        let (adapter, mut rx) = connected_adapter();

        adapter
            .send(Command::SecurityLookup { code: "NQZ6".into() })
            .unwrap();

        match rx.blocking_recv() {
            Some(AdapterEvent::SecurityInfo {
                security,
                price_step,
                ..
            }) => {
                assert_eq!(security.code, "NQZ6");
                assert_eq!(price_step, 0.25);
            }
            other => panic!("expected security info, got {other:?}"),
        }

        adapter.reset();
    }

    #[test]
    fn logout_drives_disconnect_and_teardown() {
        let (adapter, mut rx) = connected_adapter();

        adapter.disconnect().unwrap();

        match rx.blocking_recv() {
            Some(AdapterEvent::Disconnected { error }) => assert!(error.is_none()),
            other => panic!("expected Disconnected, got {other:?}"),
        }

        adapter.reset();
    }
}
