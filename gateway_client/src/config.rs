//! Client settings
//!
//! Read from a `KEY=VALUE` properties file; `#` starts a comment line.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const SEARCH_PATHS: [&str; 2] = ["client.properties", "config.properties"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read properties file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Keys: HOST, HTTP_PORT, USE_SSL, DEFAULT_SYMBOL, DEFAULT_QUANTITY,
/// STREAM_MARKET_DATA, REQUEST_TIMEOUT_MS, HISTOGRAM_SIGNIFICANT_FIGURES
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub use_ssl: bool,
    pub default_symbol: String,
    pub default_quantity: u64,
    pub stream_market_data: bool,
    pub request_timeout_ms: u64,
    pub histogram_significant_figures: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            http_port: 8888,
            use_ssl: false,
            default_symbol: "USD/BRL".to_string(),
            default_quantity: 100,
            stream_market_data: true,
            request_timeout_ms: 5000,
            histogram_significant_figures: 3,
        }
    }
}

struct Properties(HashMap<String, String>);

impl Properties {
    fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Properties(entries)
    }

    fn text(&self, key: &str, default: String) -> String {
        self.0.get(key).cloned().unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.0
            .get(key)
            .map_or(default, |v| v.eq_ignore_ascii_case("true"))
    }

    fn number<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                reason: format!("not a number: {}", v),
            }),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_properties_str(&std::fs::read_to_string(path)?)
    }

    pub fn from_properties_str(content: &str) -> Result<Self, ConfigError> {
        let props = Properties::parse(content);
        let d = Config::default();

        let histogram_significant_figures =
            props.number("HISTOGRAM_SIGNIFICANT_FIGURES", d.histogram_significant_figures)?;
        if histogram_significant_figures > 5 {
            return Err(ConfigError::Invalid {
                key: "HISTOGRAM_SIGNIFICANT_FIGURES".to_string(),
                reason: format!("must be between 0 and 5, got {}", histogram_significant_figures),
            });
        }

        Ok(Config {
            host: props.text("HOST", d.host),
            http_port: props.number("HTTP_PORT", d.http_port)?,
            use_ssl: props.flag("USE_SSL", d.use_ssl),
            default_symbol: props.text("DEFAULT_SYMBOL", d.default_symbol),
            default_quantity: props.number("DEFAULT_QUANTITY", d.default_quantity)?,
            stream_market_data: props.flag("STREAM_MARKET_DATA", d.stream_market_data),
            request_timeout_ms: props.number("REQUEST_TIMEOUT_MS", d.request_timeout_ms)?,
            histogram_significant_figures,
        })
    }

    /// First readable file of `client.properties`, `config.properties`, else defaults.
    pub fn load_or_default() -> Self {
        let found = SEARCH_PATHS
            .iter()
            .filter(|path| Path::new(path).exists())
            .find_map(|path| match Self::load(path) {
                Ok(config) => {
                    log::info!("Using settings from {}", path);
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", path, e);
                    None
                }
            });
        found.unwrap_or_else(|| {
            log::warn!("No properties file found, using default settings");
            Self::default()
        })
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.http_port)
    }

    /// Push stream endpoint
    pub fn websocket_url(&self) -> String {
        let scheme = if self.use_ssl { "wss" } else { "ws" };
        format!("{}://{}:{}/ws", scheme, self.host, self.http_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn log_config(&self) {
        log::debug!(
            "Gateway {} (push stream {}), timeout {} ms",
            self.base_url(),
            if self.stream_market_data { "on" } else { "off" },
            self.request_timeout_ms
        );
        log::debug!(
            "Order defaults: {} x {}, histogram precision {} digits",
            self.default_symbol,
            self.default_quantity,
            self.histogram_significant_figures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_and_malformed_lines_are_skipped() {
        let config = Config::from_properties_str("# HOST=ignored\nnot a property\nHOST = spaced.host \n").unwrap();
        assert_eq!(config.host, "spaced.host");
    }

    #[test]
    fn test_parse_properties() {
        let content = r#"
HOST=gateway.local
HTTP_PORT=9000
USE_SSL=FALSE
# trading defaults
DEFAULT_SYMBOL=BRL/USD
DEFAULT_QUANTITY=250
STREAM_MARKET_DATA=false
REQUEST_TIMEOUT_MS=1500
HISTOGRAM_SIGNIFICANT_FIGURES=2
"#;
        let config = Config::from_properties_str(content).unwrap();
        assert_eq!(config.host, "gateway.local");
        assert_eq!(config.http_port, 9000);
        assert!(!config.use_ssl);
        assert_eq!(config.default_symbol, "BRL/USD");
        assert_eq!(config.default_quantity, 250);
        assert!(!config.stream_market_data);
        assert_eq!(config.request_timeout(), Duration::from_millis(1500));
        assert_eq!(config.histogram_significant_figures, 2);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(Config::from_properties_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let err = Config::from_properties_str("HTTP_PORT=eighty\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "HTTP_PORT"));
    }

    #[test]
    fn test_significant_figures_out_of_range() {
        assert!(Config::from_properties_str("HISTOGRAM_SIGNIFICANT_FIGURES=6\n").is_err());
    }

    #[test]
    fn test_urls_follow_ssl_flag() {
        let mut config = Config::default();
        config.host = "gw.example".into();
        config.http_port = 9999;
        assert_eq!(config.base_url(), "http://gw.example:9999");
        assert_eq!(config.websocket_url(), "ws://gw.example:9999/ws");

        config.use_ssl = true;
        assert_eq!(config.base_url(), "https://gw.example:9999");
        assert_eq!(config.websocket_url(), "wss://gw.example:9999/ws");
    }
}
