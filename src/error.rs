//! Error handling for the tick bots
//!
//! One error type for the whole crate. The two exchange conditions the bots
//! react to (`OrderNotFound`, `InsufficientFunds`) are their own variants so
//! callers can match on them instead of parsing messages.

use std::fmt;
use std::io;

/// Main error type for the tick bots
#[derive(Debug)]
pub enum TradingError {
    // Configuration errors
    ConfigNotFound(String),
    ConfigParse(String),
    ConfigValidation(String),
    ConfigMissing(String),

    // Ledger errors
    LedgerRead(String),
    LedgerWrite(String),
    LedgerInvariant(String),
    DuplicateOrder(String),

    // API errors
    ApiConnection(String),
    ApiAuthentication(String),
    ApiRateLimit(String),
    ApiResponse(String),
    ApiTimeout(String),

    // Exchange order errors
    OrderNotFound(String),      // order id
    InsufficientFunds(String),  // exchange message
    OrderRejected(String),
    InvalidSymbol(String),

    // IO errors
    FileNotFound(String),
    FileRead(String),
    FileWrite(String),

    // Notification errors
    NotificationFailed(String),

    // General errors
    Internal(String),
}

impl TradingError {
    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            TradingError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: tick-bot init\n\
                    2. Edit config_system.json and config_params.json\n\
                    3. Try again",
                    path
                )
            }
            TradingError::ConfigValidation(msg) => {
                format!(
                    "Configuration validation error: {}\n\n\
                    💡 Check the params file for:\n\
                    - Positive numeric values\n\
                    - min_price below max_price\n\
                    - A symbol written as BASE/QUOTE",
                    msg
                )
            }
            TradingError::ApiAuthentication(msg) => {
                format!(
                    "API authentication failed: {}\n\n\
                    💡 Check:\n\
                    - apiKey and secret in the keys file\n\
                    - The API passphrase\n\
                    - Keys have trading permissions",
                    msg
                )
            }
            TradingError::InsufficientFunds(msg) => {
                format!(
                    "Insufficient funds: {}\n\n\
                    💡 Either:\n\
                    - The keys file points at the wrong (sub)account\n\
                    - The budget or target value is larger than the balance",
                    msg
                )
            }
            TradingError::LedgerInvariant(msg) => {
                format!(
                    "Ledger is inconsistent: {}\n\n\
                    💡 Compare the open orders file with the exchange and \
                    remove the rows that are no longer live",
                    msg
                )
            }
            TradingError::ApiRateLimit(msg) => {
                format!(
                    "API rate limit exceeded: {}\n\n\
                    💡 Increase idle_loop in the system config",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradingError::ApiTimeout(_)
                | TradingError::ApiConnection(_)
                | TradingError::ApiRateLimit(_)
                | TradingError::ApiResponse(_)
                | TradingError::NotificationFailed(_)
        )
    }

    /// Errors that must stop the bot instead of waiting for the next tick
    pub fn is_fatal(&self) -> bool {
        match self {
            TradingError::OrderNotFound(_) | TradingError::OrderRejected(_) => false,
            other => !other.is_retryable(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::ConfigNotFound(_)
            | TradingError::ConfigParse(_)
            | TradingError::ConfigValidation(_)
            | TradingError::ConfigMissing(_) => "config",

            TradingError::LedgerRead(_)
            | TradingError::LedgerWrite(_)
            | TradingError::LedgerInvariant(_)
            | TradingError::DuplicateOrder(_) => "ledger",

            TradingError::ApiConnection(_)
            | TradingError::ApiAuthentication(_)
            | TradingError::ApiRateLimit(_)
            | TradingError::ApiResponse(_)
            | TradingError::ApiTimeout(_) => "api",

            TradingError::OrderNotFound(_)
            | TradingError::InsufficientFunds(_)
            | TradingError::OrderRejected(_)
            | TradingError::InvalidSymbol(_) => "trading",

            TradingError::FileNotFound(_)
            | TradingError::FileRead(_)
            | TradingError::FileWrite(_) => "io",

            TradingError::NotificationFailed(_) => "notify",

            TradingError::Internal(_) => "internal",
        }
    }

    /// Tag written to the error log for the conditions the bots record
    pub fn log_tag(&self) -> Option<&'static str> {
        match self {
            TradingError::OrderNotFound(_) => Some("OrderNotFound"),
            TradingError::InsufficientFunds(_) => Some("InsufficientFunds"),
            _ => None,
        }
    }
}

impl fmt::Display for TradingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            TradingError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
            TradingError::ConfigValidation(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
            TradingError::ConfigMissing(field) => {
                write!(f, "Missing required configuration: {}", field)
            }

            TradingError::LedgerRead(msg) => {
                write!(f, "Ledger read error: {}", msg)
            }
            TradingError::LedgerWrite(msg) => {
                write!(f, "Ledger write error: {}", msg)
            }
            TradingError::LedgerInvariant(msg) => {
                write!(f, "Ledger invariant violated: {}", msg)
            }
            TradingError::DuplicateOrder(id) => {
                write!(f, "Order {} is already in the ledger", id)
            }

            TradingError::ApiConnection(msg) => {
                write!(f, "API connection error: {}", msg)
            }
            TradingError::ApiAuthentication(msg) => {
                write!(f, "API authentication failed: {}", msg)
            }
            TradingError::ApiRateLimit(msg) => {
                write!(f, "API rate limit exceeded: {}", msg)
            }
            TradingError::ApiResponse(msg) => {
                write!(f, "API response error: {}", msg)
            }
            TradingError::ApiTimeout(msg) => {
                write!(f, "API timeout: {}", msg)
            }

            TradingError::OrderNotFound(id) => {
                write!(f, "Order not found: {}", id)
            }
            TradingError::InsufficientFunds(msg) => {
                write!(f, "Insufficient funds: {}", msg)
            }
            TradingError::OrderRejected(msg) => {
                write!(f, "Order rejected: {}", msg)
            }
            TradingError::InvalidSymbol(symbol) => {
                write!(f, "Invalid symbol '{}', expected BASE/QUOTE", symbol)
            }

            TradingError::FileNotFound(path) => {
                write!(f, "File not found: {}", path)
            }
            TradingError::FileRead(msg) => {
                write!(f, "File read error: {}", msg)
            }
            TradingError::FileWrite(msg) => {
                write!(f, "File write error: {}", msg)
            }

            TradingError::NotificationFailed(msg) => {
                write!(f, "Notification failed: {}", msg)
            }

            TradingError::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for TradingError {}

// Conversion implementations for common error types

impl From<io::Error> for TradingError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => TradingError::FileNotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => TradingError::FileRead(err.to_string()),
            io::ErrorKind::TimedOut => TradingError::ApiTimeout(err.to_string()),
            _ => TradingError::Internal(format!("IO error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::ConfigParse(format!("JSON parse error: {}", err))
    }
}

impl From<toml::de::Error> for TradingError {
    fn from(err: toml::de::Error) -> Self {
        TradingError::ConfigParse(format!("TOML parse error: {}", err))
    }
}

impl From<csv::Error> for TradingError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(_) => TradingError::LedgerWrite(err.to_string()),
            _ => TradingError::LedgerRead(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for TradingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TradingError::ApiTimeout(err.to_string())
        } else if err.is_connect() {
            TradingError::ApiConnection(err.to_string())
        } else if err.is_status() {
            TradingError::ApiResponse(err.to_string())
        } else if err.is_decode() {
            TradingError::ApiResponse(format!("Undecodable body: {}", err))
        } else {
            TradingError::ApiConnection(err.to_string())
        }
    }
}

impl From<crate::config::ConfigError> for TradingError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::FileNotFound(path) => TradingError::ConfigNotFound(path),
            ConfigError::FileRead(msg) => TradingError::FileRead(msg),
            ConfigError::Parse(msg) => TradingError::ConfigParse(msg),
            ConfigError::Validation(msg) => TradingError::ConfigValidation(msg),
            ConfigError::Missing(field) => TradingError::ConfigMissing(field),
        }
    }
}

impl From<String> for TradingError {
    fn from(msg: String) -> Self {
        TradingError::Internal(msg)
    }
}

impl From<&str> for TradingError {
    fn from(msg: &str) -> Self {
        TradingError::Internal(msg.to_string())
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;
