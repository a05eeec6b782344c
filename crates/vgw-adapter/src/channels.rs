//! Sub-channel state aggregation.
//!
//! A venue connection is really N independently-connecting sub-channels
//! (trading, market data, PnL, historical, admin). The platform only ever
//! sees one logical Connect/Disconnect edge: `Connected` the moment every
//! used channel is up, `Disconnected` the moment every used channel is down.
//! Both edges are computed under a single lock so concurrent channel
//! transitions can neither double-fire nor miss the edge.

use std::sync::Mutex;

use tracing::info;
use vgw_core::config::ChannelEndpoints;
use vgw_core::types::{ChannelId, ChannelState};

/// An aggregate edge produced by one channel transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateTransition {
    /// Every used channel reached `Connected`.
    Connected,
    /// Every used channel is down. `error` carries the last failure message
    /// when the cause was a failure rather than an orderly close.
    Disconnected { error: Option<String> },
}

/// Aggregate connection phase, edge-deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    /// Neither edge has fired since the last (re)connect began.
    Settling,
    Up,
    Down,
}

struct Inner {
    states: [(ChannelId, ChannelState); 5],
    aggregate: Aggregate,
    last_error: Option<String>,
}

/// State table for the five sub-channels of one venue session.
pub struct ChannelTable {
    inner: Mutex<Inner>,
    /// Seed states derived from config; `reset()` restores these.
    seed: [(ChannelId, ChannelState); 5],
}

impl ChannelTable {
    /// Seed the table from config: channels without an endpoint are
    /// `NotUsed` and never participate in the aggregate.
    pub fn new(endpoints: &ChannelEndpoints) -> Self {
        let mut seed = [(ChannelId::Trading, ChannelState::NotUsed); 5];
        for (slot, &channel) in seed.iter_mut().zip(ChannelId::ALL.iter()) {
            let state = if endpoints.is_used(channel) {
                ChannelState::Connecting
            } else {
                ChannelState::NotUsed
            };
            *slot = (channel, state);
        }

        Self {
            inner: Mutex::new(Inner {
                states: seed,
                aggregate: Aggregate::Settling,
                last_error: None,
            }),
            seed,
        }
    }

    /// Number of channels participating in the aggregate.
    pub fn used_count(&self) -> usize {
        self.seed
            .iter()
            .filter(|(_, s)| *s != ChannelState::NotUsed)
            .count()
    }

    /// Apply one channel transition and return the aggregate edge, if any.
    ///
    /// Edges are order-independent and fire at most once per direction: the
    /// `Connected` edge fires on whichever channel happens to complete last,
    /// regardless of transition order.
    pub fn apply(
        &self,
        channel: ChannelId,
        state: ChannelState,
        error: Option<String>,
    ) -> Option<AggregateTransition> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let Some(slot) = inner.states.iter_mut().find(|(c, _)| *c == channel) else {
            return None;
        };

        if slot.1 == ChannelState::NotUsed {
            // Alerts for unconfigured channels are ignored; they must never
            // block or trip the aggregate.
            return None;
        }

        slot.1 = state;
        if let Some(err) = error {
            inner.last_error = Some(err);
        }

        let used = inner
            .states
            .iter()
            .filter(|(_, s)| *s != ChannelState::NotUsed);

        let mut any = false;
        let mut all_connected = true;
        let mut all_failed = true;
        for (_, s) in used {
            any = true;
            all_connected &= *s == ChannelState::Connected;
            all_failed &= *s == ChannelState::Failed;
        }
        if !any {
            return None;
        }

        if all_connected && inner.aggregate != Aggregate::Up {
            inner.aggregate = Aggregate::Up;
            inner.last_error = None;
            info!("all channels connected");
            return Some(AggregateTransition::Connected);
        }

        if all_failed && inner.aggregate != Aggregate::Down {
            inner.aggregate = Aggregate::Down;
            let error = inner.last_error.take();
            info!("all channels down");
            return Some(AggregateTransition::Disconnected { error });
        }

        None
    }

    /// Whether the aggregate `Connected` edge is currently in effect.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).aggregate == Aggregate::Up
    }

    /// Current state of one channel.
    pub fn state(&self, channel: ChannelId) -> ChannelState {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .states
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, s)| *s)
            .unwrap_or(ChannelState::NotUsed)
    }

    /// Restore the seeded per-channel states and clear the aggregate edge.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.states = self.seed;
        inner.aggregate = Aggregate::Settling;
        inner.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(trading: bool, md: bool, pnl: bool) -> ChannelEndpoints {
        ChannelEndpoints {
            trading: trading.then(|| "tcp://t".into()),
            market_data: md.then(|| "tcp://m".into()),
            pnl: pnl.then(|| "tcp://p".into()),
            historical: None,
            admin: None,
        }
    }

    #[test]
    fn connected_fires_once_on_last_channel() {
        let t = ChannelTable::new(&endpoints(true, true, false));

        assert_eq!(
            t.apply(ChannelId::Trading, ChannelState::Connected, None),
            None
        );
        assert!(!t.is_connected());

        assert_eq!(
            t.apply(ChannelId::MarketData, ChannelState::Connected, None),
            Some(AggregateTransition::Connected)
        );
        assert!(t.is_connected());

        // Duplicate connect alert: no second edge.
        assert_eq!(
            t.apply(ChannelId::MarketData, ChannelState::Connected, None),
            None
        );
    }

    #[test]
    fn aggregate_is_permutation_invariant() {
        // Every transition order over three used channels fires exactly one
        // Connected edge, on the last transition.
        let orders: [[ChannelId; 3]; 6] = [
            [ChannelId::Trading, ChannelId::MarketData, ChannelId::Pnl],
            [ChannelId::Trading, ChannelId::Pnl, ChannelId::MarketData],
            [ChannelId::MarketData, ChannelId::Trading, ChannelId::Pnl],
            [ChannelId::MarketData, ChannelId::Pnl, ChannelId::Trading],
            [ChannelId::Pnl, ChannelId::Trading, ChannelId::MarketData],
            [ChannelId::Pnl, ChannelId::MarketData, ChannelId::Trading],
        ];

        for order in orders {
            let t = ChannelTable::new(&endpoints(true, true, true));
            let mut edges = 0;
            for (i, ch) in order.iter().enumerate() {
                let edge = t.apply(*ch, ChannelState::Connected, None);
                if i < 2 {
                    assert_eq!(edge, None, "early edge in order {order:?}");
                } else {
                    assert_eq!(edge, Some(AggregateTransition::Connected));
                }
                edges += edge.is_some() as u32;
            }
            assert_eq!(edges, 1);
        }
    }

    #[test]
    fn not_used_channels_never_block_the_aggregate() {
        // Only trading is configured: its connect alone trips the edge, and
        // alerts for unconfigured channels are ignored.
        let t = ChannelTable::new(&endpoints(true, false, false));

        assert_eq!(t.apply(ChannelId::Pnl, ChannelState::Failed, None), None);
        assert_eq!(
            t.apply(ChannelId::Trading, ChannelState::Connected, None),
            Some(AggregateTransition::Connected)
        );
    }

    #[test]
    fn all_failed_fires_disconnected_with_last_error() {
        let t = ChannelTable::new(&endpoints(true, true, false));
        t.apply(ChannelId::Trading, ChannelState::Connected, None);
        t.apply(ChannelId::MarketData, ChannelState::Connected, None);

        assert_eq!(
            t.apply(
                ChannelId::Trading,
                ChannelState::Failed,
                Some("login lost".into())
            ),
            None
        );
        match t.apply(ChannelId::MarketData, ChannelState::Failed, None) {
            Some(AggregateTransition::Disconnected { error }) => {
                assert_eq!(error.as_deref(), Some("login lost"));
            }
            other => panic!("expected disconnect edge, got {other:?}"),
        }
        assert!(!t.is_connected());
    }

    #[test]
    fn failed_connect_attempt_reports_down_without_ever_being_up() {
        let t = ChannelTable::new(&endpoints(true, true, false));
        t.apply(
            ChannelId::Trading,
            ChannelState::Failed,
            Some("bad password".into()),
        );
        let edge = t.apply(ChannelId::MarketData, ChannelState::Failed, None);
        assert!(matches!(
            edge,
            Some(AggregateTransition::Disconnected { error: Some(_) })
        ));
    }

    #[test]
    fn reset_restores_seed_states() {
        let t = ChannelTable::new(&endpoints(true, false, false));
        t.apply(ChannelId::Trading, ChannelState::Connected, None);
        assert!(t.is_connected());

        t.reset();
        assert!(!t.is_connected());
        assert_eq!(t.state(ChannelId::Trading), ChannelState::Connecting);
        assert_eq!(t.state(ChannelId::MarketData), ChannelState::NotUsed);

        // A fresh connect cycle fires the edge again.
        assert_eq!(
            t.apply(ChannelId::Trading, ChannelState::Connected, None),
            Some(AggregateTransition::Connected)
        );
    }
}
