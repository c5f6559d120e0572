use crate::infrastructure::{BroadcasterConfig, OverflowPolicy};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown blocklist backend '{0}' (expected json or sqlite)")]
    UnknownBackend(String),

    #[error("unknown publish overflow mode '{0}' (expected drop or block)")]
    UnknownOverflow(String),

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),
}

/// Where the blocklist snapshot is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlocklistBackend {
    Json,
    Sqlite,
}

impl FromStr for BlocklistBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl BlocklistBackend {
    /// Snapshot location used when `BLOCKED_IPS_FILE_PATH` is unset.
    pub fn default_path(self) -> &'static str {
        match self {
            Self::Json => "blocked_ips.json",
            Self::Sqlite => "blocked_ips.db",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowMode {
    Drop,
    Block,
}

impl FromStr for OverflowMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "block" => Ok(Self::Block),
            _ => Err(ConfigError::UnknownOverflow(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // HTTP server
    pub listen_addr: String,
    pub debug: bool,
    pub static_dir: String,

    // Country/currency directory
    pub api_url: String,
    pub api_key: Option<String>,
    pub http_timeout_secs: u64,

    // Geolocation and blocklist storage
    pub ip_store_path: String,
    pub blocked_ips_path: String,
    pub blocklist_backend: BlocklistBackend,

    // Result cache
    pub cache_ttl_secs: u64,
    pub cache_sweep_interval_secs: u64,
    pub evict_on_block: bool,

    // Event fan-out
    pub subscriber_capacity: usize,
    pub publish_overflow: OverflowMode,
    pub publish_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9090".to_string(),
            debug: false,
            static_dir: "static".to_string(),
            api_url: "https://api.mercadolibre.com".to_string(),
            api_key: None,
            http_timeout_secs: 10,
            ip_store_path: "GeoLite2-Country.mmdb".to_string(),
            blocked_ips_path: BlocklistBackend::Json.default_path().to_string(),
            blocklist_backend: BlocklistBackend::Json,
            cache_ttl_secs: 300,
            cache_sweep_interval_secs: 60,
            evict_on_block: false,
            subscriber_capacity: 10,
            publish_overflow: OverflowMode::Drop,
            publish_timeout_ms: 250,
        }
    }
}

impl Config {
    /// Build a config from a key lookup, falling back to defaults for
    /// missing or unparsable numeric values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str| -> bool {
            lookup(key)
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(false)
        };

        let listen_addr = match (lookup("LISTEN_ADDR"), lookup("SERVER_PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => format!("0.0.0.0:{}", port.trim()),
            (None, None) => defaults.listen_addr,
        };

        let blocklist_backend = match lookup("BLOCKLIST_BACKEND") {
            Some(v) => v.parse()?,
            None => defaults.blocklist_backend,
        };

        let publish_overflow = match lookup("PUBLISH_OVERFLOW") {
            Some(v) => v.parse()?,
            None => defaults.publish_overflow,
        };

        let config = Config {
            listen_addr,
            debug: lookup("DEBUG").is_some(),
            static_dir: lookup("STATIC_DIR").unwrap_or(defaults.static_dir),
            api_url: lookup("API_URL").unwrap_or(defaults.api_url),
            api_key: lookup("API_KEY").filter(|k| !k.is_empty()),
            http_timeout_secs: number("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            ip_store_path: lookup("IP_STORE_PATH").unwrap_or(defaults.ip_store_path),
            blocked_ips_path: lookup("BLOCKED_IPS_FILE_PATH")
                .unwrap_or_else(|| blocklist_backend.default_path().to_string()),
            blocklist_backend,
            cache_ttl_secs: number("CACHE_TTL_SECS", defaults.cache_ttl_secs),
            cache_sweep_interval_secs: number(
                "CACHE_SWEEP_INTERVAL_SECS",
                defaults.cache_sweep_interval_secs,
            ),
            evict_on_block: flag("EVICT_ON_BLOCK"),
            subscriber_capacity: number("SUBSCRIBER_CAPACITY", defaults.subscriber_capacity as u64)
                as usize,
            publish_overflow,
            publish_timeout_ms: number("PUBLISH_TIMEOUT_MS", defaults.publish_timeout_ms),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::MustBePositive("CACHE_TTL_SECS"));
        }
        if self.subscriber_capacity == 0 {
            return Err(ConfigError::MustBePositive("SUBSCRIBER_CAPACITY"));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::MustBePositive("HTTP_TIMEOUT_SECS"));
        }
        if self.publish_overflow == OverflowMode::Block && self.publish_timeout_ms == 0 {
            return Err(ConfigError::MustBePositive("PUBLISH_TIMEOUT_MS"));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Sweep interval, or `None` when sweeping is disabled.
    pub fn cache_sweep_interval(&self) -> Option<Duration> {
        (self.cache_sweep_interval_secs > 0)
            .then(|| Duration::from_secs(self.cache_sweep_interval_secs))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn broadcaster_config(&self) -> BroadcasterConfig {
        let overflow = match self.publish_overflow {
            OverflowMode::Drop => OverflowPolicy::Drop,
            OverflowMode::Block => OverflowPolicy::Block {
                timeout: Duration::from_millis(self.publish_timeout_ms),
            },
        };
        BroadcasterConfig {
            capacity: self.subscriber_capacity,
            overflow,
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    Ok(Config::from_lookup(|key| std::env::var(key).ok())?)
}
