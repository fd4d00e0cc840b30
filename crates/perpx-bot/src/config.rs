//! Application configuration.
//!
//! Loaded from a TOML file, then overridden by `PERPX_<SECTION>__<KEY>`
//! environment variables (e.g. `PERPX_TRADING__BACKTEST=true`).

use std::time::Duration;

use ::config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use perpx_core::Symbol;
use perpx_executor::{ExecutorConfig, RetryPolicy};

use crate::error::{AppError, AppResult};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Margin mode of the account on this instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    /// Isolated margin with an explicit leverage.
    Fixed,
    /// Cross margin; leverage is set to 0.
    #[default]
    Crossed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Instrument in `BASE-QUOTE` form, e.g. "BTC-USDT".
    #[serde(default = "default_instrument_id")]
    pub instrument_id: String,
    #[serde(default)]
    pub margin_mode: MarginMode,
    /// Leverage for fixed margin. Default: 20.
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
}

fn default_instrument_id() -> String {
    "BTC-USDT".to_string()
}

fn default_leverage() -> Decimal {
    Decimal::from(20)
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            instrument_id: default_instrument_id(),
            margin_mode: MarginMode::default(),
            leverage: default_leverage(),
        }
    }
}

impl ExchangeConfig {
    pub fn symbol(&self) -> AppResult<Symbol> {
        Ok(Symbol::from_instrument_id(&self.instrument_id)?)
    }

    /// (buy, sell) leverage to configure on the exchange.
    pub fn leverage_pair(&self) -> (Decimal, Decimal) {
        match self.margin_mode {
            MarginMode::Fixed => (self.leverage, self.leverage),
            MarginMode::Crossed => (Decimal::ZERO, Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Simulate every order without touching the exchange.
    #[serde(default)]
    pub backtest: bool,
}

/// Order assistant switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub price_cancellation: bool,
    /// Fractional deviation. Default: 0.01 (1%).
    #[serde(default = "default_amplitude")]
    pub price_cancellation_amplitude: Decimal,
    #[serde(default)]
    pub time_cancellation: bool,
    /// Default: 10 seconds.
    #[serde(default = "default_time_cancellation_seconds")]
    pub time_cancellation_seconds: u64,
    #[serde(default)]
    pub automatic_cancellation: bool,
    /// Reissue price offset as a fraction of the last price. Default: 0.
    #[serde(default)]
    pub reissue_order: Decimal,
}

fn default_amplitude() -> Decimal {
    Decimal::new(1, 2)
}

fn default_time_cancellation_seconds() -> u64 {
    10
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            price_cancellation: false,
            price_cancellation_amplitude: default_amplitude(),
            time_cancellation: false,
            time_cancellation_seconds: default_time_cancellation_seconds(),
            automatic_cancellation: false,
            reissue_order: Decimal::ZERO,
        }
    }
}

impl AssistantConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            price_cancellation: self.price_cancellation,
            amplitude: self.price_cancellation_amplitude,
            time_cancellation: self.time_cancellation,
            delay_secs: self.time_cancellation_seconds,
            automatic_cancellation: self.automatic_cancellation,
            reissue_offset: self.reissue_order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Default: 10.
    #[serde(default = "default_max_reissues")]
    pub max_reissues: u32,
    /// Default: 200ms.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Default: 5,000ms.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_max_reissues() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_backoff_max_ms() -> u64 {
    5_000
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_reissues: default_max_reissues(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Last price the paper market starts at. Default: 30,000.
    #[serde(default = "default_initial_price")]
    pub initial_price: Decimal,
}

fn default_initial_price() -> Decimal {
    Decimal::from(30_000)
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_price: default_initial_price(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_level: Option<String>,
    /// Write the Prometheus exposition to stderr after each command.
    #[serde(default)]
    pub print_metrics: bool,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub executor: ExecutorSettings,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load `path` (if present) plus `PERPX_*` environment overrides, then validate.
    pub fn load(path: &str) -> AppResult<Self> {
        if !std::path::Path::new(path).exists() {
            tracing::warn!(path, "Config file not found, using defaults");
        }

        let config: Self = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without environment overrides.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.exchange.symbol()?;

        if self.exchange.margin_mode == MarginMode::Fixed && self.exchange.leverage <= Decimal::ZERO
        {
            return Err(AppError::Config(
                "leverage must be positive in fixed margin mode".to_string(),
            ));
        }

        let assistant = &self.assistant;
        if assistant.price_cancellation_amplitude.is_sign_negative() {
            return Err(AppError::Config(
                "price_cancellation_amplitude must not be negative".to_string(),
            ));
        }
        if assistant.reissue_order.is_sign_negative() || assistant.reissue_order >= Decimal::ONE {
            return Err(AppError::Config(
                "reissue_order must be in [0, 1)".to_string(),
            ));
        }

        if self.executor.backoff_base_ms > self.executor.backoff_max_ms {
            return Err(AppError::Config(
                "backoff_base_ms must not exceed backoff_max_ms".to_string(),
            ));
        }
        if self.paper.initial_price <= Decimal::ZERO {
            return Err(AppError::Config(
                "paper.initial_price must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn policy(&self) -> RetryPolicy {
        self.assistant.policy()
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            backtest: self.trading.backtest,
            max_reissues: self.executor.max_reissues,
            backoff_base: Duration::from_millis(self.executor.backoff_base_ms),
            backoff_max: Duration::from_millis(self.executor.backoff_max_ms),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("PERPX")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
