// Configuration management for the tick bots
//
// Three documents are read once at startup: the system config (loop timing,
// keys path, ledger directory), the strategy params and the exchange keys.
// JSON is the native format; `.toml` files are accepted as well.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::types::Symbol;

pub const OPEN_ORDERS_FILE: &str = "open_orders.csv";
pub const TRANSACTIONS_FILE: &str = "transactions.csv";
pub const ERROR_LOG_FILE: &str = "error_log.csv";
pub const ASSETS_FILE: &str = "assets.csv";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Keep ticking after the first tick
    #[serde(deserialize_with = "flag_from_bool_or_int")]
    pub loop_flag: bool,
    /// Seconds to pause between the reconcile and placement stages
    pub idle_stage: f64,
    /// Seconds to pause between ticks
    pub idle_loop: f64,
    pub keys_path: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
}

/// Grid bot parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub symbol: String,
    pub budget: f64,
    /// Price distance between two grid levels
    pub grid: f64,
    /// Quote notional of each grid buy
    pub value: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub fee_percent: f64,
    /// Distance below the last price for the first buy
    pub start_safety: f64,
}

/// Rebalance bot parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceConfig {
    pub symbol: String,
    pub fix_value: f64,
    /// Half-width of the dead-band around `fix_value`
    pub min_value: f64,
}

/// Report (chatbot) parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub symbol: String,
    #[serde(default)]
    pub grid: Option<f64>,
    #[serde(default)]
    pub init_budget: Option<f64>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ExchangeKeys {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub secret: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub subaccount: Option<String>,
    #[serde(rename = "lineToken", default)]
    pub line_token: Option<String>,
}

/// Paths of every file a bot reads or rewrites
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPaths {
    pub open_orders: PathBuf,
    pub transactions: PathBuf,
    pub error_log: PathBuf,
    pub assets: PathBuf,
}

/// Parameters documents share a symbol and a validation step
pub trait BotParams: DeserializeOwned + Clone + fmt::Debug {
    fn symbol(&self) -> &str;
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Immutable configuration handed to every component of a bot run
#[derive(Debug, Clone)]
pub struct BotContext<P> {
    pub system: SystemConfig,
    pub params: P,
    pub keys: ExchangeKeys,
    pub symbol: Symbol,
}

fn default_data_dir() -> String { ".".to_string() }
fn default_utc_offset_hours() -> i32 { 7 }
fn default_bot_name() -> String { "bot".to_string() }

fn flag_from_bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// Read a JSON or TOML document, picked by file extension
pub fn load_document<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::FileRead(format!("{}: {}", path.display(), e)))?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e))),
        _ => serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e))),
    }
}

impl SystemConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = load_document(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_stage < 0.0 {
            return Err(ConfigError::Validation("idle_stage must be non-negative".to_string()));
        }

        if self.idle_loop < 0.0 {
            return Err(ConfigError::Validation("idle_loop must be non-negative".to_string()));
        }

        if self.keys_path.trim().is_empty() {
            return Err(ConfigError::Missing("keys_path".to_string()));
        }

        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::Validation("utc_offset_hours must be within -12..=14".to_string()));
        }

        Ok(())
    }

    pub fn ledger_paths(&self) -> LedgerPaths {
        let dir = Path::new(&self.data_dir);
        LedgerPaths {
            open_orders: dir.join(OPEN_ORDERS_FILE),
            transactions: dir.join(TRANSACTIONS_FILE),
            error_log: dir.join(ERROR_LOG_FILE),
            assets: dir.join(ASSETS_FILE),
        }
    }
}

impl BotParams for GridConfig {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_symbol(&self.symbol)?;

        for (name, value) in [
            ("budget", self.budget),
            ("grid", self.grid),
            ("value", self.value),
            ("max_price", self.max_price),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::Validation(format!("{} must be positive", name)));
            }
        }

        if self.min_price < 0.0 {
            return Err(ConfigError::Validation("min_price must be non-negative".to_string()));
        }

        if self.min_price >= self.max_price {
            return Err(ConfigError::Validation("min_price must be below max_price".to_string()));
        }

        if !(0.0..100.0).contains(&self.fee_percent) {
            return Err(ConfigError::Validation("fee_percent must be within [0, 100)".to_string()));
        }

        if self.start_safety < 0.0 {
            return Err(ConfigError::Validation("start_safety must be non-negative".to_string()));
        }

        if self.value > self.budget {
            return Err(ConfigError::Validation("value per grid cannot exceed budget".to_string()));
        }

        Ok(())
    }
}

impl BotParams for RebalanceConfig {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_symbol(&self.symbol)?;

        if self.fix_value <= 0.0 {
            return Err(ConfigError::Validation("fix_value must be positive".to_string()));
        }

        if self.min_value < 0.0 || self.min_value >= self.fix_value {
            return Err(ConfigError::Validation(
                "min_value must be non-negative and below fix_value".to_string(),
            ));
        }

        Ok(())
    }
}

impl BotParams for ReportConfig {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_symbol(&self.symbol)?;

        if matches!(self.grid, Some(g) if g <= 0.0) {
            return Err(ConfigError::Validation("grid must be positive".to_string()));
        }

        Ok(())
    }
}

impl ReportConfig {
    /// Grid reports need both grid-only fields
    pub fn grid_fields(&self) -> Result<(f64, f64), ConfigError> {
        let grid = self.grid.ok_or_else(|| ConfigError::Missing("grid".to_string()))?;
        let init_budget = self
            .init_budget
            .ok_or_else(|| ConfigError::Missing("init_budget".to_string()))?;
        Ok((grid, init_budget))
    }
}

fn validate_symbol(symbol: &str) -> Result<(), ConfigError> {
    Symbol::parse(symbol)
        .map(|_| ())
        .map_err(|_| ConfigError::Validation(format!("symbol '{}' must look like BASE/QUOTE", symbol)))
}

impl ExchangeKeys {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut keys: Self = load_document(path)?;
        keys.apply_env_overrides();

        if keys.api_key.is_empty() || keys.secret.is_empty() {
            return Err(ConfigError::Missing("apiKey/secret".to_string()));
        }

        Ok(keys)
    }

    /// Environment variables win over the keys file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("KUCOIN_API_KEY") {
            self.api_key = key;
        }
        if let Ok(secret) = std::env::var("KUCOIN_API_SECRET") {
            self.secret = secret;
        }
        if let Ok(passphrase) = std::env::var("KUCOIN_API_PASSPHRASE") {
            self.password = Some(passphrase);
        }
    }
}

impl fmt::Debug for ExchangeKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeKeys")
            .field("api_key", &mask(&self.api_key))
            .field("secret", &"***")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("subaccount", &self.subaccount)
            .field("line_token", &self.line_token.as_ref().map(|_| "***"))
            .finish()
    }
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}***", visible)
}

impl<P: BotParams> BotContext<P> {
    /// Load system config, params and the keys file it points to
    pub fn load<A: AsRef<Path>, B: AsRef<Path>>(system_path: A, params_path: B) -> Result<Self, ConfigError> {
        let system = SystemConfig::from_file(system_path)?;
        let keys = ExchangeKeys::from_file(&system.keys_path)?;
        Self::from_parts(system, load_document(params_path)?, keys)
    }

    pub fn from_parts(system: SystemConfig, params: P, keys: ExchangeKeys) -> Result<Self, ConfigError> {
        params.validate()?;
        let symbol = Symbol::parse(params.symbol())
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(Self {
            system,
            params,
            keys,
            symbol,
        })
    }

    pub fn ledger_paths(&self) -> LedgerPaths {
        self.system.ledger_paths()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Missing required configuration: {0}")]
    Missing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_config() -> GridConfig {
        GridConfig {
            symbol: "BTC/USDT".to_string(),
            budget: 1000.0,
            grid: 100.0,
            value: 50.0,
            min_price: 20000.0,
            max_price: 40000.0,
            fee_percent: 0.1,
            start_safety: 50.0,
        }
    }

    #[test]
    fn test_grid_config_validation() {
        assert!(grid_config().validate().is_ok());

        let mut inverted = grid_config();
        inverted.min_price = 50000.0;
        assert!(matches!(inverted.validate(), Err(ConfigError::Validation(_))));

        let mut bad_symbol = grid_config();
        bad_symbol.symbol = "BTCUSDT".to_string();
        assert!(bad_symbol.validate().is_err());
    }

    #[test]
    fn test_rebalance_dead_band_must_fit_target() {
        let config = RebalanceConfig {
            symbol: "ETH/USDT".to_string(),
            fix_value: 100.0,
            min_value: 150.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_loop_flag_accepts_int() {
        let json = r#"{"loop_flag": 1, "idle_stage": 1, "idle_loop": 60, "keys_path": "keys.json"}"#;
        let config: SystemConfig = serde_json::from_str(json).unwrap();
        assert!(config.loop_flag);
        assert_eq!(config.data_dir, ".");
        assert_eq!(config.utc_offset_hours, 7);
    }

    #[test]
    fn test_report_grid_fields_required() {
        let config = ReportConfig {
            symbol: "BTC/USDT".to_string(),
            grid: Some(100.0),
            init_budget: None,
        };
        assert!(matches!(config.grid_fields(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_keys_debug_is_masked() {
        let keys = ExchangeKeys {
            api_key: "abcdef123".to_string(),
            secret: "topsecret".to_string(),
            password: Some("pass".to_string()),
            subaccount: None,
            line_token: None,
        };
        let printed = format!("{:?}", keys);
        assert!(!printed.contains("topsecret"));
        assert!(!printed.contains("abcdef123"));
        assert!(printed.contains("abcd***"));
    }
}
