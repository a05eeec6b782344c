//! Quote fragment coalescing.
//!
//! Venues deliver best-bid/best-ask updates as fragments: a `Solo` fragment is
//! a complete update on its own, while `Begin`/`Middle`/`Aggregated` fragments
//! belong to a multi-part update that only becomes coherent when the `End`
//! marker arrives. The accumulator buffers pending fragments per instrument
//! and timestamp, and turns each completed group into one merged
//! [`AdapterEvent::Level1Change`] snapshot.
//!
//! Within one pending group the last fragment per side wins. `Clear` drops
//! the pending state for its timestamp without emitting anything.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use ahash::AHashMap;
use tracing::debug;
use vgw_core::time_util::now_us;
use vgw_core::types::{AdapterEvent, PriceVolume, SecurityRef, Side, UpdateKind};

use crate::session::QuoteFragment;

/// Fragments accumulated for one (instrument, timestamp) pair.
#[derive(Debug, Clone, Default)]
struct PendingQuote {
    bid: Option<PriceVolume>,
    ask: Option<PriceVolume>,
    /// Microseconds since epoch when the entry was created, for TTL eviction.
    inserted_us: u64,
}

/// Per-instrument quote fragment buffer.
///
/// All mutation happens under one lock; completed snapshots are returned to
/// the caller rather than sent from inside the lock, so the accumulator can
/// never deadlock against a handler holding the event channel.
pub struct QuoteAccumulator {
    inner: Mutex<AHashMap<SecurityRef, BTreeMap<u64, PendingQuote>>>,
}

impl QuoteAccumulator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(AHashMap::new()),
        }
    }

    /// Apply one fragment and return any snapshots it completed.
    ///
    /// - `Solo`: one immediate snapshot carrying just that side.
    /// - `Begin`/`Middle`/`Aggregated`: buffered, last write per side wins.
    /// - `End`: flushes every pending timestamp for the instrument, oldest
    ///   first, one merged snapshot each.
    /// - `Clear`: drops the pending entry for that timestamp, emits nothing.
    pub fn apply(&self, fragment: QuoteFragment) -> Vec<AdapterEvent> {
        let pv = (fragment.price, fragment.volume);

        match fragment.update {
            UpdateKind::Solo => {
                let (bid, ask) = match fragment.side {
                    Side::Buy => (Some(pv), None),
                    Side::Sell => (None, Some(pv)),
                };
                vec![AdapterEvent::Level1Change {
                    security: fragment.security,
                    time_ms: fragment.time_ms,
                    bid,
                    ask,
                    last: None,
                }]
            }

            UpdateKind::Begin | UpdateKind::Middle | UpdateKind::Aggregated => {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                let entry = inner
                    .entry(fragment.security)
                    .or_default()
                    .entry(fragment.time_ms)
                    .or_insert_with(|| PendingQuote {
                        inserted_us: now_us(),
                        ..PendingQuote::default()
                    });
                match fragment.side {
                    Side::Buy => entry.bid = Some(pv),
                    Side::Sell => entry.ask = Some(pv),
                }
                Vec::new()
            }

            UpdateKind::End => {
                // The End fragment is itself part of the update it closes.
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                let pending = inner.entry(fragment.security.clone()).or_default();
                let entry = pending.entry(fragment.time_ms).or_insert_with(|| {
                    PendingQuote {
                        inserted_us: now_us(),
                        ..PendingQuote::default()
                    }
                });
                match fragment.side {
                    Side::Buy => entry.bid = Some(pv),
                    Side::Sell => entry.ask = Some(pv),
                }
                drop(inner);
                self.flush_security(&fragment.security)
            }

            UpdateKind::Clear => {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(pending) = inner.get_mut(&fragment.security) {
                    pending.remove(&fragment.time_ms);
                    if pending.is_empty() {
                        inner.remove(&fragment.security);
                    }
                }
                Vec::new()
            }
        }
    }

    /// Flush every pending timestamp for one instrument, oldest first.
    ///
    /// Invoked on `End` fragments and standalone end-of-quote markers. A
    /// marker for an instrument with no pending state returns nothing.
    pub fn flush_security(&self, security: &SecurityRef) -> Vec<AdapterEvent> {
        let pending = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match inner.remove(security) {
                Some(p) => p,
                None => return Vec::new(),
            }
        };

        pending
            .into_iter()
            .map(|(time_ms, q)| AdapterEvent::Level1Change {
                security: security.clone(),
                time_ms,
                bid: q.bid,
                ask: q.ask,
                last: None,
            })
            .collect()
    }

    /// Drop pending entries older than `ttl`. Returns the count evicted.
    ///
    /// Some venues drop the End marker on subscription churn, leaving a
    /// pending group stranded forever. TTL eviction is opt-in via config.
    pub fn evict_older_than(&self, ttl: Duration) -> usize {
        let cutoff = now_us().saturating_sub(ttl.as_micros() as u64);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let mut evicted = 0;
        inner.retain(|security, pending| {
            let before = pending.len();
            pending.retain(|_, q| q.inserted_us >= cutoff);
            let dropped = before - pending.len();
            if dropped > 0 {
                debug!("evicted {dropped} stale quote group(s) for {security}");
                evicted += dropped;
            }
            !pending.is_empty()
        });
        evicted
    }

    /// Number of instruments with pending fragments.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all pending state without emitting anything.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for QuoteAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
