//! Order state normalization.
//!
//! Venue report taxonomies are much wider than the canonical lifecycle.
//! [`normalize`] collapses a report onto `{Pending, Active, Done, Failed}`
//! using remaining quantity as the single source of truth wherever the report
//! type is ambiguous about openness. [`OrderStateTable`] then enforces that
//! terminal states are sticky until a full reset.

use std::sync::Mutex;

use ahash::AHashMap;
use tracing::debug;
use vgw_core::types::{OrderState, ReportType};

/// Result of normalizing one venue report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized {
    /// Canonical state claimed by the report; `OrderState::None` means the
    /// report makes no lifecycle claim and should not be forwarded as one.
    pub state: OrderState,
    /// Default failure reason when the payload carries none.
    pub reason: Option<&'static str>,
}

impl Normalized {
    const fn state(state: OrderState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    const fn failed(reason: &'static str) -> Self {
        Self {
            state: OrderState::Failed,
            reason: Some(reason),
        }
    }
}

/// Map one venue report onto the canonical lifecycle.
///
/// Tie-break rule: for report types that leave openness ambiguous, the order
/// is `Active` while `remaining > 0` and `Done` otherwise — remaining
/// quantity wins over any textual status.
pub fn normalize(report_type: ReportType, remaining: f64) -> Normalized {
    let open_or_done = if remaining > 0.0 {
        OrderState::Active
    } else {
        OrderState::Done
    };

    match report_type {
        ReportType::Received => Normalized::state(OrderState::Pending),

        ReportType::Fill
        | ReportType::Modify
        | ReportType::Status
        | ReportType::Commission
        | ReportType::TradeCorrect => Normalized::state(open_or_done),

        ReportType::Cancel => Normalized::state(OrderState::Done),

        ReportType::Failure => Normalized::failed("order failed at gateway"),
        ReportType::Reject => Normalized::failed("order rejected by venue"),
        ReportType::NotCancelled => Normalized::failed("cancel request refused"),
        ReportType::NotModified => Normalized::failed("modify request refused"),

        // No lifecycle claim; informational only.
        ReportType::Bust
        | ReportType::Trigger
        | ReportType::TriggerPulled
        | ReportType::SodUpdate => Normalized::state(OrderState::None),
    }
}

/// Last known canonical state per transaction, with sticky terminal states.
///
/// The state itself is always derived from the latest report; this table only
/// exists to clamp regressions — once an order is `Done` or `Failed`, a late
/// or duplicate report cannot reopen it.
pub struct OrderStateTable {
    inner: Mutex<AHashMap<i64, OrderState>>,
}

impl OrderStateTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(AHashMap::new()),
        }
    }

    /// Apply a derived state and return the effective one.
    ///
    /// `OrderState::None` claims nothing: the stored state is returned
    /// unchanged (or `None` if the order was never seen).
    pub fn apply(&self, transaction_id: i64, state: OrderState) -> OrderState {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let current = inner.get(&transaction_id).copied().unwrap_or_default();

        if state == OrderState::None {
            return current;
        }

        if current.is_terminal() && !state.is_terminal() {
            debug!(
                "transaction {transaction_id}: ignoring {state:?} report after \
                 terminal {current:?}"
            );
            return current;
        }

        inner.insert(transaction_id, state);
        state
    }

    /// Last effective state, if any report was ever seen.
    pub fn get(&self, transaction_id: i64) -> Option<OrderState> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&transaction_id)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full reset — the only way out of a terminal state.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for OrderStateTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_quantity_breaks_ties() {
        assert_eq!(normalize(ReportType::Status, 5.0).state, OrderState::Active);
        assert_eq!(normalize(ReportType::Status, 0.0).state, OrderState::Done);
        assert_eq!(normalize(ReportType::Fill, 2.0).state, OrderState::Active);
        assert_eq!(normalize(ReportType::Fill, 0.0).state, OrderState::Done);
        assert_eq!(normalize(ReportType::Modify, 1.0).state, OrderState::Active);
    }

    #[test]
    fn received_is_pending_regardless_of_remaining() {
        assert_eq!(
            normalize(ReportType::Received, 5.0).state,
            OrderState::Pending
        );
        assert_eq!(
            normalize(ReportType::Received, 0.0).state,
            OrderState::Pending
        );
    }

    #[test]
    fn failures_carry_a_reason() {
        for rt in [
            ReportType::Failure,
            ReportType::Reject,
            ReportType::NotCancelled,
            ReportType::NotModified,
        ] {
            let n = normalize(rt, 3.0);
            assert_eq!(n.state, OrderState::Failed);
            assert!(n.reason.is_some());
        }
    }

    #[test]
    fn cancel_closes_regardless_of_remaining() {
        assert_eq!(normalize(ReportType::Cancel, 7.0).state, OrderState::Done);
    }

    #[test]
    fn informational_reports_claim_nothing() {
        for rt in [
            ReportType::Bust,
            ReportType::Trigger,
            ReportType::TriggerPulled,
            ReportType::SodUpdate,
        ] {
            assert_eq!(normalize(rt, 1.0).state, OrderState::None);
        }
    }

    #[test]
    fn terminal_states_are_sticky() {
        let t = OrderStateTable::new();
        assert_eq!(t.apply(1, OrderState::Pending), OrderState::Pending);
        assert_eq!(t.apply(1, OrderState::Active), OrderState::Active);
        assert_eq!(t.apply(1, OrderState::Done), OrderState::Done);

        // Late or duplicate reports cannot reopen the order.
        assert_eq!(t.apply(1, OrderState::Active), OrderState::Done);
        assert_eq!(t.apply(1, OrderState::Pending), OrderState::Done);

        // Terminal-to-terminal is allowed (duplicate finals disagree rarely,
        // latest wins).
        assert_eq!(t.apply(1, OrderState::Done), OrderState::Done);
    }

    #[test]
    fn none_claims_nothing() {
        let t = OrderStateTable::new();
        assert_eq!(t.apply(9, OrderState::None), OrderState::None);
        assert_eq!(t.get(9), None);

        t.apply(9, OrderState::Active);
        assert_eq!(t.apply(9, OrderState::None), OrderState::Active);
    }

    #[test]
    fn reset_releases_terminal_orders() {
        let t = OrderStateTable::new();
        t.apply(1, OrderState::Failed);
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.apply(1, OrderState::Active), OrderState::Active);
    }
}
