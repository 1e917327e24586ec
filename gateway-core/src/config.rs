//! Layered gateway configuration.
//!
//! Values are resolved in increasing priority: compiled-in defaults, an
//! optional TOML file, environment overrides with the `GATEWAY_` prefix,
//! and finally the dedicated `COINDCX_API_KEY` / `COINDCX_API_SECRET`
//! variables. Credentials are expected to arrive through the environment,
//! never through a checked-in file.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://api.coindcx.com".to_string()
}

fn default_server_port() -> u16 {
    8000
}

fn default_http_timeout_secs() -> u64 {
    20
}

fn default_ticker_refresh_interval_secs() -> f64 {
    10.0
}

fn default_ticker_ttl_secs() -> f64 {
    10.0
}

fn default_instrument_ttl_secs() -> f64 {
    60.0
}

fn default_wallet_ttl_secs() -> f64 {
    30.0
}

fn default_fx_fallback_rate() -> f64 {
    90.0
}

fn default_max_bulk_orders() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// REST base of the derivatives venue.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key, normally injected via `COINDCX_API_KEY`. Empty means the
    /// gateway runs in read-only mode and refuses signed calls.
    #[serde(default)]
    pub api_key: String,
    /// API secret, normally injected via `COINDCX_API_SECRET`.
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Cadence of the background ticker poll.
    #[serde(default = "default_ticker_refresh_interval_secs")]
    pub ticker_refresh_interval_secs: f64,
    /// Age beyond which a cached ticker triggers an inline refresh.
    #[serde(default = "default_ticker_ttl_secs")]
    pub ticker_ttl_secs: f64,
    #[serde(default = "default_instrument_ttl_secs")]
    pub instrument_ttl_secs: f64,
    #[serde(default = "default_wallet_ttl_secs")]
    pub wallet_ttl_secs: f64,
    /// Rate used for INR conversion when no USDTINR ticker is available.
    #[serde(default = "default_fx_fallback_rate")]
    pub fx_fallback_rate: f64,
    #[serde(default = "default_max_bulk_orders")]
    pub max_bulk_orders: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            api_secret: String::new(),
            server_port: default_server_port(),
            http_timeout_secs: default_http_timeout_secs(),
            ticker_refresh_interval_secs: default_ticker_refresh_interval_secs(),
            ticker_ttl_secs: default_ticker_ttl_secs(),
            instrument_ttl_secs: default_instrument_ttl_secs(),
            wallet_ttl_secs: default_wallet_ttl_secs(),
            fx_fallback_rate: default_fx_fallback_rate(),
            max_bulk_orders: default_max_bulk_orders(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from the layered sources described in the
    /// module docs. An explicit `config_path` must exist; the default
    /// `gateway.toml` is picked up only when present.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        match config_path {
            Some(path) => builder = builder.add_source(File::with_name(path).required(true)),
            None => builder = builder.add_source(File::with_name("gateway").required(false)),
        }
        builder = builder.add_source(Environment::with_prefix("GATEWAY").try_parsing(true));

        let mut cfg: GatewayConfig = builder.build()?.try_deserialize()?;

        if let Ok(v) = std::env::var("COINDCX_API_KEY") {
            cfg.api_key = v;
        }
        if let Ok(v) = std::env::var("COINDCX_API_SECRET") {
            cfg.api_secret = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Message("base_url must not be empty".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "http_timeout_secs must be at least 1".into(),
            ));
        }
        for (name, value) in [
            (
                "ticker_refresh_interval_secs",
                self.ticker_refresh_interval_secs,
            ),
            ("ticker_ttl_secs", self.ticker_ttl_secs),
            ("instrument_ttl_secs", self.instrument_ttl_secs),
            ("wallet_ttl_secs", self.wallet_ttl_secs),
            ("fx_fallback_rate", self.fx_fallback_rate),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Message(format!("{name} must be positive")));
            }
        }
        if self.max_bulk_orders == 0 {
            return Err(ConfigError::Message(
                "max_bulk_orders must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        std::env::remove_var("GATEWAY_BASE_URL");
        std::env::remove_var("GATEWAY_SERVER_PORT");
        std::env::remove_var("GATEWAY_FX_FALLBACK_RATE");
        std::env::remove_var("COINDCX_API_KEY");
        std::env::remove_var("COINDCX_API_SECRET");
    }

    #[test]
    fn defaults_load_without_sources() {
        let _lock = lock_env();
        clear_env();

        let cfg = GatewayConfig::load(None).unwrap();
        assert_eq!(cfg.base_url, "https://api.coindcx.com");
        assert_eq!(cfg.server_port, 8000);
        assert_eq!(cfg.ticker_ttl_secs, 10.0);
        assert_eq!(cfg.instrument_ttl_secs, 60.0);
        assert_eq!(cfg.wallet_ttl_secs, 30.0);
        assert_eq!(cfg.fx_fallback_rate, 90.0);
        assert_eq!(cfg.max_bulk_orders, 50);
        assert!(!cfg.has_credentials());
    }

    #[test]
    fn environment_overrides_defaults() {
        let _lock = lock_env();
        clear_env();
        std::env::set_var("GATEWAY_SERVER_PORT", "9100");
        std::env::set_var("GATEWAY_FX_FALLBACK_RATE", "83.5");

        let cfg = GatewayConfig::load(None).unwrap();
        assert_eq!(cfg.server_port, 9100);
        assert_eq!(cfg.fx_fallback_rate, 83.5);

        clear_env();
    }

    #[test]
    fn dedicated_credential_vars_take_precedence() {
        let _lock = lock_env();
        clear_env();
        std::env::set_var("COINDCX_API_KEY", "key-123");
        std::env::set_var("COINDCX_API_SECRET", "secret-456");

        let cfg = GatewayConfig::load(None).unwrap();
        assert!(cfg.has_credentials());
        assert_eq!(cfg.api_key, "key-123");

        clear_env();
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut cfg = GatewayConfig::default();
        cfg.ticker_ttl_secs = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = GatewayConfig::default();
        cfg.max_bulk_orders = 0;
        assert!(cfg.validate().is_err());
    }
}
