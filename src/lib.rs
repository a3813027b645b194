// Tick Bots Library
//
// Grid and rebalance trading bots over an exchange REST API, with CSV ledgers
// and chat status reports

pub mod bots;
pub mod clients;
pub mod config;
pub mod core;
pub mod error;   // Unified error handling
pub mod ledger;  // CSV order ledgers and error log
pub mod notify;
pub mod report;

// Re-export core trading types
pub use crate::core::{
    cal_unrealised, check_open_orders, decide_rebalance, rebalance_port, reconcile_grid_orders,
    Balance, BidAsk, ExchangeOrder, Holdings, Order, OrderSide, OrderStatus, OrderType, Symbol,
    TickFlow,
};

// Re-export error types
pub use error::{TradingError, TradingResult};

// Re-export client types
pub use clients::{ExchangeGateway, KucoinClient, PaperExchange};

// Re-export configuration
pub use config::{
    BotContext, BotParams, ConfigError, ExchangeKeys, GridConfig, LedgerPaths, RebalanceConfig,
    ReportConfig, SystemConfig,
};

// Re-export runners
pub use bots::{run_loop, Bot, GridBot, RebalanceBot, TickOutcome};

pub use ledger::{ErrorLog, OpenOrderSlot, OrderLedger};
pub use notify::{LineNotifier, LogNotifier, MemoryNotifier, Notifier};
