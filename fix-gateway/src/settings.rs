//! Gateway settings.
//!
//! Loaded from built-in defaults, then an optional TOML file, then
//! `GATEWAY__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub market_maker: MarketMakerSettings,
    pub orders: OrderDefaults,
    pub journal: JournalSettings,
    pub pricing: PricingSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub private_key: String,
    pub cert_chain: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8888,
            use_ssl: false,
            private_key: "key.pem".into(),
            cert_chain: "cert.pem".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    pub sender_comp_id: String,
    pub target_comp_id: String,
    /// Log on as soon as the gateway starts instead of waiting for `/start`.
    pub auto_start: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sender_comp_id: "CLIENT".into(),
            target_comp_id: "MARKETMAKER".into(),
            auto_start: false,
        }
    }
}

impl SessionSettings {
    pub fn session_id(&self) -> String {
        format!("FIX.4.4:{}->{}", self.sender_comp_id, self.target_comp_id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketMakerSettings {
    pub symbols: Vec<String>,
    pub update_interval_ms: u64,
    pub entry_size: u64,
    pub seed: Option<u64>,
}

impl Default for MarketMakerSettings {
    fn default() -> Self {
        Self {
            symbols: vec!["USD/BRL".into()],
            update_interval_ms: 5000,
            entry_size: 100,
            seed: None,
        }
    }
}

impl MarketMakerSettings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OrderDefaults {
    pub default_symbol: String,
    pub default_quantity: u64,
}

impl Default for OrderDefaults {
    fn default() -> Self {
        Self {
            default_symbol: "USD/BRL".into(),
            default_quantity: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JournalSettings {
    pub path: String,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            path: "fix_messages.csv".into(),
        }
    }
}

impl JournalSettings {
    /// `None` when the journal is disabled (empty path).
    pub fn path(&self) -> Option<PathBuf> {
        let trimmed = self.path.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PricingSettings {
    /// Symbol whose mid price is used as the USD/BRL conversion rate.
    pub rate_symbol: String,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            rate_symbol: "USD/BRL".into(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (optional, any format the `config` crate
    /// recognises by extension) and the environment.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("GATEWAY").separator("__"))
            .build()?
            .try_deserialize::<Settings>()
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }

    pub fn log_settings(&self) {
        log::debug!("Settings:");
        log::debug!("  server: {}:{} (ssl: {})", self.server.host, self.server.port, self.server.use_ssl);
        log::debug!("  session: {}", self.session.session_id());
        log::debug!("  auto_start: {}", self.session.auto_start);
        log::debug!("  symbols: {:?}", self.market_maker.symbols);
        log::debug!("  update_interval_ms: {}", self.market_maker.update_interval_ms);
        log::debug!("  default order: {} x {}", self.orders.default_quantity, self.orders.default_symbol);
        log::debug!("  journal: {:?}", self.journal.path());
        log::debug!("  rate_symbol: {}", self.pricing.rate_symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(content: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bind_address(), ("0.0.0.0".to_string(), 8888));
        assert!(!settings.server.use_ssl);
        assert_eq!(settings.session.session_id(), "FIX.4.4:CLIENT->MARKETMAKER");
        assert_eq!(settings.market_maker.symbols, vec!["USD/BRL"]);
        assert_eq!(settings.market_maker.update_interval(), Duration::from_secs(5));
        assert_eq!(settings.orders.default_quantity, 100);
        assert_eq!(settings.journal.path(), Some(PathBuf::from("fix_messages.csv")));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = from_toml(
            r#"
[server]
port = 9000

[market_maker]
symbols = ["USD/BRL", "EUR/USD"]
seed = 7
"#,
        );
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.market_maker.symbols, vec!["USD/BRL", "EUR/USD"]);
        assert_eq!(settings.market_maker.seed, Some(7));
        assert_eq!(settings.market_maker.entry_size, 100);
        assert_eq!(settings.orders, OrderDefaults::default());
    }

    #[test]
    fn test_empty_journal_path_disables_journal() {
        let settings = from_toml("[journal]\npath = \"  \"\n");
        assert_eq!(settings.journal.path(), None);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let settings = Settings::load("does-not-exist.toml").unwrap();
        assert_eq!(settings.server.port, Settings::default().server.port);
    }
}
