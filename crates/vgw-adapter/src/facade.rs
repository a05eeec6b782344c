//! The adapter façade.
//!
//! One [`Adapter`] owns one native session, its state tables, and the event
//! channel to the platform. The public surface is four verbs:
//!
//! - `connect`  — register handlers, log in, wait for alerts to do the rest
//! - `send`     — issue one canonical [`Command`], correlated where needed
//! - `disconnect` — orderly logout
//! - `reset`    — tear everything down to a reconnectable blank state
//!
//! Handler registrations are recorded in order and always unwound in exact
//! reverse, whether teardown comes from `reset()` or from the venue's own
//! shutdown signal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use vgw_core::config::{ChannelEndpoints, ConnectionConfig};
use vgw_core::error::AdapterError;
use vgw_core::types::{Command, EventReceiver, EventSender, TransactionKind};

use crate::channels::ChannelTable;
use crate::coalesce::QuoteAccumulator;
use crate::correlator::Correlator;
use crate::dispatch::{Dispatcher, Tables};
use crate::isolate;
use crate::order_state::OrderStateTable;
use crate::session::{EventKind, NativeSession};

/// A venue adapter instance bound to one native session.
pub struct Adapter<S: NativeSession> {
    label: String,
    session: Arc<S>,
    endpoints: ChannelEndpoints,
    tables: Arc<Tables>,
    dispatcher: Arc<Dispatcher>,
    /// Bumped first thing in `reset()`; in-flight callbacks registered under
    /// an older generation become no-ops.
    generation: Arc<AtomicU64>,
    /// Kinds registered with the session, in registration order.
    registered: Arc<Mutex<Vec<EventKind>>>,
    events_tx: EventSender,
}

impl<S: NativeSession> Adapter<S> {
    /// Build an adapter around a native session. Returns the receiving end of
    /// the canonical event channel alongside it.
    pub fn new(config: &ConnectionConfig, session: S) -> (Self, EventReceiver) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let label = config.module_name();

        let tables = Arc::new(Tables {
            correlator: Correlator::new(),
            channels: ChannelTable::new(&config.channels),
            orders: OrderStateTable::new(),
            quotes: QuoteAccumulator::new(),
        });

        let dispatcher = Arc::new(Dispatcher::new(&label, Arc::clone(&tables), tx.clone()));

        let adapter = Self {
            label,
            session: Arc::new(session),
            endpoints: config.channels.clone(),
            tables,
            dispatcher,
            generation: Arc::new(AtomicU64::new(0)),
            registered: Arc::new(Mutex::new(Vec::new())),
            events_tx: tx,
        };
        (adapter, rx)
    }

    /// Shared state tables, for diagnostics.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Register all handlers and begin the login sequence.
    ///
    /// Returns once the login request is accepted by the session; the
    /// aggregate `Connected` event arrives later through the alert path when
    /// every used channel is up.
    pub fn connect(&self) -> Result<(), AdapterError> {
        if self.tables.channels.used_count() == 0 {
            return Err(AdapterError::Config(format!(
                "{}: no channel endpoints configured",
                self.label
            )));
        }

        info!("[{}] connecting", self.label);

        let generation = self.generation.load(Ordering::Acquire);
        for kind in EventKind::ALL {
            let dispatcher = Arc::clone(&self.dispatcher);
            let handler = isolate::wrap(
                &format!("{}/{kind:?}", self.label),
                generation,
                Arc::clone(&self.generation),
                self.events_tx.clone(),
                move |payload| dispatcher.dispatch(kind, payload),
            );
            self.session.register(kind, handler);
            self.registered
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(kind);
        }

        // Venue-initiated shutdown unwinds the registrations the same way
        // reset() does.
        let session = Arc::clone(&self.session);
        let registered = Arc::clone(&self.registered);
        self.dispatcher.set_teardown(Box::new(move || {
            unregister_all(&*session, &registered);
        }));

        if let Err(e) = self.session.login(&self.endpoints) {
            warn!("[{}] login failed: {e}", self.label);
            unregister_all(&*self.session, &self.registered);
            return Err(AdapterError::Session(format!(
                "{}: login failed: {e}",
                self.label
            )));
        }

        Ok(())
    }

    /// Issue one canonical command.
    ///
    /// Correlated commands return the internal transaction id to watch for in
    /// `OrderReport` events; subscription commands return `None`.
    pub fn send(&self, command: Command) -> Result<Option<i64>, AdapterError> {
        if !self.tables.channels.is_connected() {
            return Err(AdapterError::NotConnected);
        }

        match command {
            Command::OrderRegister {
                security,
                side,
                price,
                volume,
            } => {
                let id = self.tables.correlator.begin(TransactionKind::Order);
                self.session.submit_order(id, &security, side, price, volume)?;
                Ok(Some(id))
            }

            Command::OrderCancel { transaction_id } => {
                // Resolve before allocating, so an unknown target costs no id.
                let external = self.tables.correlator.external_for(transaction_id)?;
                let id = self.tables.correlator.begin(TransactionKind::Cancel);
                self.session.cancel_order(id, &external)?;
                Ok(Some(id))
            }

            Command::OrderReplace {
                transaction_id,
                price,
                volume,
            } => {
                let external = self.tables.correlator.external_for(transaction_id)?;
                let id = self.tables.correlator.begin(TransactionKind::Replace);
                self.session.replace_order(id, &external, price, volume)?;
                Ok(Some(id))
            }

            Command::SecurityLookup { code } => {
                let id = self.tables.correlator.begin(TransactionKind::Lookup);
                self.session.lookup_security(id, &code)?;
                Ok(Some(id))
            }

            Command::MarketDataSubscribe { security } => {
                self.session.subscribe_md(&security)?;
                Ok(None)
            }

            Command::MarketDataUnsubscribe { security } => {
                self.session.unsubscribe_md(&security)?;
                Ok(None)
            }
        }
    }

    /// Orderly logout. Channel close alerts drive the `Disconnected` event.
    pub fn disconnect(&self) -> Result<(), AdapterError> {
        info!("[{}] disconnecting", self.label);
        self.session.logout()
    }

    /// Tear down to a blank, reconnectable state.
    ///
    /// Idempotent and safe at any point, including before the first connect.
    /// The generation bump comes first so that native callbacks racing the
    /// reset observe the stale generation and drop out before touching any
    /// table being cleared underneath them.
    pub fn reset(&self) {
        info!("[{}] reset", self.label);
        self.generation.fetch_add(1, Ordering::Release);

        unregister_all(&*self.session, &self.registered);
        self.session.shutdown();
        self.tables.clear();
    }
}

/// Unregister every recorded handler in exact reverse registration order.
/// Draining makes repeated teardown a no-op.
fn unregister_all<S: NativeSession>(session: &S, registered: &Mutex<Vec<EventKind>>) {
    let kinds: Vec<EventKind> = registered
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .drain(..)
        .collect();
    for kind in kinds.into_iter().rev() {
        session.unregister(kind);
    }
}
