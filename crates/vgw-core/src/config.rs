//! Configuration parsing for the venue gateway.
//!
//! All modules read their settings from a single JSON config file. The
//! top-level structure contains logging metadata and a `connections` array
//! where each entry describes one venue adapter instance.
//!
//! # Example config
//!
//! ```json
//! {
//!   "gateway": { "module_name": "vgw", "log_path": "/tmp/log" },
//!   "connections": [{
//!     "venue": "sim",
//!     "channels": {
//!       "trading": "tcp://localhost:9000",
//!       "market_data": "tcp://localhost:9001"
//!     },
//!     "quote_ttl_secs": 30
//!   }]
//! }
//! ```
//!
//! A channel left out of the config (or given an empty endpoint string) is
//! treated as not used: it never blocks the aggregate connection state.

use serde::Deserialize;

use crate::types::ChannelId;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    pub gateway: Option<ModuleMeta>,

    /// Array of connection configs — one per venue adapter instance.
    pub connections: Vec<ConnectionConfig>,
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// A single connection/adapter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Venue identifier (e.g. `"sim"`).
    pub venue: String,

    /// Per-channel endpoints. Absent or empty entries are not used.
    #[serde(default)]
    pub channels: ChannelEndpoints,

    /// Evict orphaned quote-accumulator entries older than this many seconds.
    /// Unset disables eviction.
    pub quote_ttl_secs: Option<u64>,
}

impl ConnectionConfig {
    /// Returns the module name used for log labels.
    pub fn module_name(&self) -> String {
        format!("{}-gw", self.venue)
    }
}

/// Endpoint strings for the five sub-channels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelEndpoints {
    pub trading: Option<String>,
    pub market_data: Option<String>,
    pub pnl: Option<String>,
    pub historical: Option<String>,
    pub admin: Option<String>,
}

impl ChannelEndpoints {
    /// Endpoint for a given channel, if configured.
    pub fn endpoint(&self, channel: ChannelId) -> Option<&str> {
        let ep = match channel {
            ChannelId::Trading => &self.trading,
            ChannelId::MarketData => &self.market_data,
            ChannelId::Pnl => &self.pnl,
            ChannelId::Historical => &self.historical,
            ChannelId::Admin => &self.admin,
        };
        ep.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether a channel participates in the aggregate connection state.
    pub fn is_used(&self, channel: ChannelId) -> bool {
        self.endpoint(channel).is_some()
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
