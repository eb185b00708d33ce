// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use crate::notify::Channel;
use crate::reconcile::SchedulerIntervals;
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cycle cadences
    pub scheduler: SchedulerConfig,

    /// Price cache and source settings
    pub pricing: PricingConfig,

    /// Order reconciliation settings
    pub orders: OrdersConfig,

    /// Notification settings
    pub notifications: NotificationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Optional JSON snapshot to seed the store from at startup
    pub state_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Crypto price/alert cadence in seconds
    pub crypto_interval_secs: u64,

    /// Equity price/alert cadence in seconds
    pub equity_interval_secs: u64,

    /// Order reconciliation cadence in seconds
    pub order_interval_secs: u64,

    /// Deferred-notification retry cadence in seconds
    pub notification_retry_interval_secs: u64,

    /// Per-entity lease duration in seconds
    pub lease_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Quote cache TTL for crypto symbols, in seconds
    pub crypto_ttl_secs: u64,

    /// Quote cache TTL for equity symbols, in seconds
    pub equity_ttl_secs: u64,

    /// Per-source fetch timeout in seconds
    pub source_timeout_secs: u64,

    /// Seed prices for the paper source, e.g. "BTCUSDT@BINANCE=50000"
    pub paper_prices: Vec<PaperPrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPrice {
    pub symbol: String,
    pub venue: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersConfig {
    /// Transient failures tolerated before an order goes to ERROR
    pub max_retries: u32,

    /// Timeout for a single exchange call, in seconds
    pub exchange_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Channels to dispatch on (telegram, push, sms)
    pub channels: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let scheduler = SchedulerConfig {
            crypto_interval_secs: env_u64("PW_CRYPTO_INTERVAL_SECS", 60),
            equity_interval_secs: env_u64("PW_EQUITY_INTERVAL_SECS", 240),
            order_interval_secs: env_u64("PW_ORDER_INTERVAL_SECS", 120),
            notification_retry_interval_secs: env_u64("PW_NOTIFY_RETRY_INTERVAL_SECS", 60),
            lease_timeout_secs: env_u64("PW_LEASE_TIMEOUT_SECS", 30),
        };

        let paper_prices = env::var("PW_PAPER_PRICES")
            .ok()
            .map(|raw| parse_paper_prices(&raw))
            .transpose()?
            .unwrap_or_default();

        let pricing = PricingConfig {
            crypto_ttl_secs: env_u64("PW_CRYPTO_TTL_SECS", 60),
            equity_ttl_secs: env_u64("PW_EQUITY_TTL_SECS", 240),
            source_timeout_secs: env_u64("PW_SOURCE_TIMEOUT_SECS", 5),
            paper_prices,
        };

        let orders = OrdersConfig {
            max_retries: env_u64("PW_MAX_ORDER_RETRIES", 3) as u32,
            exchange_timeout_secs: env_u64("PW_EXCHANGE_TIMEOUT_SECS", 10),
        };

        let notifications = NotificationConfig {
            channels: env::var("PW_NOTIFY_CHANNELS")
                .unwrap_or_else(|_| "telegram".to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        Ok(Config {
            scheduler,
            pricing,
            orders,
            notifications,
            logging,
            state_file: env::var("PW_STATE_FILE").ok(),
        })
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    pub fn intervals(&self) -> SchedulerIntervals {
        SchedulerIntervals {
            crypto_prices: std::time::Duration::from_secs(self.scheduler.crypto_interval_secs),
            equity_prices: std::time::Duration::from_secs(self.scheduler.equity_interval_secs),
            orders: std::time::Duration::from_secs(self.scheduler.order_interval_secs),
            notification_retry: std::time::Duration::from_secs(
                self.scheduler.notification_retry_interval_secs,
            ),
        }
    }

    pub fn crypto_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pricing.crypto_ttl_secs as i64)
    }

    pub fn equity_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pricing.equity_ttl_secs as i64)
    }

    pub fn source_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.pricing.source_timeout_secs)
    }

    pub fn exchange_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.orders.exchange_timeout_secs)
    }

    pub fn lease_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scheduler.lease_timeout_secs)
    }

    /// Parsed notification channels; unknown names are logged and dropped.
    pub fn channels(&self) -> Vec<Channel> {
        self.notifications
            .channels
            .iter()
            .filter_map(|name| match name.as_str() {
                "telegram" => Some(Channel::Telegram),
                "push" => Some(Channel::Push),
                "sms" => Some(Channel::Sms),
                other => {
                    log::warn!("Unknown notification channel '{}', ignoring", other);
                    None
                }
            })
            .collect()
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path)
                    .map_err(|e| AppError::Config(format!("Failed to create log file: {}", e)))?;
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.init();
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig {
                crypto_interval_secs: 60,
                equity_interval_secs: 240,
                order_interval_secs: 120,
                notification_retry_interval_secs: 60,
                lease_timeout_secs: 30,
            },
            pricing: PricingConfig {
                crypto_ttl_secs: 60,
                equity_ttl_secs: 240,
                source_timeout_secs: 5,
                paper_prices: Vec::new(),
            },
            orders: OrdersConfig {
                max_retries: 3,
                exchange_timeout_secs: 10,
            },
            notifications: NotificationConfig {
                channels: vec!["telegram".to_string()],
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
            state_file: None,
        }
    }
}

/// Parse "SYMBOL@VENUE=PRICE" entries separated by commas.
fn parse_paper_prices(raw: &str) -> AppResult<Vec<PaperPrice>> {
    let mut prices = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| AppError::Config(format!("Invalid paper price entry: {}", entry)))?;
        let (symbol, venue) = key
            .split_once('@')
            .ok_or_else(|| AppError::Config(format!("Invalid paper price key: {}", key)))?;
        let price = value
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid paper price value: {}", value)))?;

        prices.push(PaperPrice {
            symbol: symbol.trim().to_string(),
            venue: venue.trim().to_string(),
            price,
        });
    }

    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn paper_price_list_parses() {
        let prices = parse_paper_prices("BTCUSDT@BINANCE=50000, AAPL@NASDAQ=190.5").unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].symbol, "BTCUSDT");
        assert_eq!(prices[0].venue, "BINANCE");
        assert_eq!(prices[0].price, dec!(50000));
        assert_eq!(prices[1].price, dec!(190.5));
    }

    #[test]
    fn malformed_paper_price_is_rejected() {
        assert!(parse_paper_prices("BTCUSDT=50000").is_err());
        assert!(parse_paper_prices("BTCUSDT@BINANCE").is_err());
        assert!(parse_paper_prices("BTCUSDT@BINANCE=abc").is_err());
    }

    #[test]
    fn defaults_match_deployment_cadences() {
        let config = Config::default();
        assert_eq!(config.pricing.equity_ttl_secs, 240);
        assert_eq!(config.pricing.crypto_ttl_secs, 60);
        assert_eq!(config.scheduler.order_interval_secs, 120);
        assert_eq!(config.orders.max_retries, 3);
    }

    #[test]
    fn unknown_channel_is_dropped() {
        let mut config = Config::default();
        config.notifications.channels = vec!["telegram".to_string(), "fax".to_string()];
        assert_eq!(config.channels(), vec![Channel::Telegram]);
    }
}
