//! Transaction correlation.
//!
//! Every correlated request gets an internal id before the native call goes
//! out; the venue's asynchronous responses are matched back through a
//! bidirectional table. Records survive until their transaction reaches a
//! terminal state or the adapter is reset.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use ahash::AHashMap;
use tracing::{debug, warn};
use vgw_core::error::AdapterError;
use vgw_core::time_util::now_ms;
use vgw_core::types::TransactionKind;

/// Lifecycle of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Issued, no venue response seen yet.
    Pending,
    /// Venue assigned an external id.
    Acknowledged,
    /// Finished; the record is evicted on entry to this state.
    Terminal,
}

/// One live correlated request.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub internal_id: i64,
    pub external_id: Option<String>,
    pub kind: TransactionKind,
    /// Milliseconds since epoch at `begin()`.
    pub issued_at: u64,
    pub state: TransactionState,
}

#[derive(Default)]
struct Inner {
    by_internal: AHashMap<i64, TransactionRecord>,
    by_external: AHashMap<String, i64>,
}

/// Bidirectional map between internal transaction ids and venue order ids.
///
/// Internal ids are monotonic and process-unique. At most one live record
/// exists per internal id, and an external id, once bound, is immutable.
pub struct Correlator {
    next_id: AtomicI64,
    inner: Mutex<Inner>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Allocate a new internal id and a `Pending` record. Never blocks beyond
    /// the table lock.
    pub fn begin(&self, kind: TransactionKind) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = TransactionRecord {
            internal_id: id,
            external_id: None,
            kind,
            issued_at: now_ms(),
            state: TransactionState::Pending,
        };
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_internal
            .insert(id, record);
        id
    }

    /// Bind the venue-assigned id to a locally issued transaction.
    ///
    /// Binding the same value twice is a no-op; a conflicting value is logged
    /// and ignored (external ids are immutable once assigned).
    pub fn assign_external(&self, internal_id: i64, external_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let Some(record) = inner.by_internal.get_mut(&internal_id) else {
            debug!("assign_external for evicted transaction {internal_id}");
            return;
        };

        match &record.external_id {
            Some(existing) if existing == external_id => return,
            Some(existing) => {
                warn!(
                    "transaction {internal_id} already bound to {existing}, \
                     ignoring rebind to {external_id}"
                );
                return;
            }
            None => {
                record.external_id = Some(external_id.to_string());
                record.state = TransactionState::Acknowledged;
            }
        }

        inner.by_external.insert(external_id.to_string(), internal_id);
    }

    /// Look up the internal id a venue id was bound to.
    pub fn resolve_by_external(&self, external_id: &str) -> Option<i64> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_external
            .get(external_id)
            .copied()
    }

    /// Resolve a venue id, adopting it if this adapter never issued it.
    ///
    /// Reports can arrive for orders placed by another client of the same
    /// account. Those are still trackable: the external id itself becomes the
    /// internal id (numeric ids verbatim, others hashed into the id space).
    /// Adopted orders are not cancelable through this adapter, since
    /// cancel/replace requires a locally issued mapping.
    ///
    /// A live local record never gets clobbered: if the preferred id is
    /// occupied, the hash (and ultimately the local id counter) is used
    /// instead.
    pub fn resolve_or_adopt(&self, external_id: &str) -> i64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(&id) = inner.by_external.get(external_id) {
            return id;
        }

        let mut id = external_id
            .parse::<i64>()
            .unwrap_or_else(|_| hashed_id(external_id));
        if inner.by_internal.contains_key(&id) {
            let hashed = hashed_id(external_id);
            warn!(
                "foreign order {external_id} collides with live transaction {id}, \
                 adopting as {hashed}"
            );
            id = hashed;
            while inner.by_internal.contains_key(&id) {
                id = self.next_id.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!("adopting foreign order {external_id} as transaction {id}");

        inner.by_external.insert(external_id.to_string(), id);
        inner.by_internal.insert(
            id,
            TransactionRecord {
                internal_id: id,
                external_id: Some(external_id.to_string()),
                kind: TransactionKind::Order,
                issued_at: now_ms(),
                state: TransactionState::Acknowledged,
            },
        );
        id
    }

    /// External id required by an outbound cancel/replace.
    ///
    /// A miss is a data error on that request, not a connection fault.
    pub fn external_for(&self, internal_id: i64) -> Result<String, AdapterError> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_internal
            .get(&internal_id)
            .and_then(|r| r.external_id.clone())
            .ok_or_else(|| AdapterError::UnknownTransaction(internal_id.to_string()))
    }

    /// Snapshot of one record, for diagnostics.
    pub fn record(&self, internal_id: i64) -> Option<TransactionRecord> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_internal
            .get(&internal_id)
            .cloned()
    }

    /// Move a transaction to `Terminal` and evict it.
    ///
    /// Idempotent: duplicate terminal callbacks are common in broker APIs, so
    /// a double complete is a no-op rather than an error.
    pub fn complete(&self, internal_id: i64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(record) = inner.by_internal.remove(&internal_id) {
            if let Some(external) = record.external_id {
                inner.by_external.remove(&external);
            }
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_internal
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record. Internal ids keep counting up across resets so ids
    /// stay process-unique.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.by_internal.clear();
        inner.by_external.clear();
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// An external id's xxh64 hash folded into the positive i64 space.
fn hashed_id(external_id: &str) -> i64 {
    (xxhash_rust::xxh64::xxh64(external_id.as_bytes(), 0) & (i64::MAX as u64)) as i64
}
