// Common test utilities and helpers
#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use tick_bots::clients::PaperExchange;
use tick_bots::config::{
    BotContext, ExchangeKeys, GridConfig, LedgerPaths, RebalanceConfig, ReportConfig, SystemConfig,
};
use tick_bots::core::types::{ExchangeOrder, OrderSide, OrderStatus, OrderType};
use tick_bots::ledger::{init_ledgers, ErrorLog, OrderLedger};
use tick_bots::notify::MemoryNotifier;

/// Ledger directory that lives as long as the test
pub struct TestWorkspace {
    _dir: TempDir,
    pub system: SystemConfig,
    pub paths: LedgerPaths,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let system = create_test_system(dir.path().to_string_lossy().as_ref());
        let paths = system.ledger_paths();
        init_ledgers(&paths).expect("Failed to create ledgers");

        Self {
            _dir: dir,
            system,
            paths,
        }
    }

    pub fn open_orders(&self) -> OrderLedger {
        OrderLedger::load(&self.paths.open_orders).expect("Failed to load open orders")
    }

    pub fn transactions(&self) -> OrderLedger {
        OrderLedger::load(&self.paths.transactions).expect("Failed to load transactions")
    }

    pub fn error_log(&self) -> ErrorLog {
        ErrorLog::new(&self.paths.error_log)
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.error_log()
            .entries()
            .expect("Failed to read error log")
            .into_iter()
            .map(|e| e.error_message)
            .collect()
    }
}

/// Single-tick system config writing its ledgers to `data_dir`
pub fn create_test_system(data_dir: &str) -> SystemConfig {
    SystemConfig {
        loop_flag: false,
        idle_stage: 0.0,
        idle_loop: 0.0,
        keys_path: "keys.json".to_string(),
        data_dir: data_dir.to_string(),
        utc_offset_hours: 7,
        bot_name: "test_bot".to_string(),
    }
}

pub fn create_test_keys() -> ExchangeKeys {
    ExchangeKeys {
        api_key: "test-key".to_string(),
        secret: "test-secret".to_string(),
        password: Some("test-pass".to_string()),
        subaccount: None,
        line_token: None,
    }
}

pub fn create_grid_config() -> GridConfig {
    GridConfig {
        symbol: "BTC/USDT".to_string(),
        budget: 300.0,
        grid: 100.0,
        value: 100.0,
        min_price: 1000.0,
        max_price: 5000.0,
        fee_percent: 0.1,
        start_safety: 50.0,
    }
}

pub fn create_rebalance_config() -> RebalanceConfig {
    RebalanceConfig {
        symbol: "ETH/USDT".to_string(),
        fix_value: 1000.0,
        min_value: 50.0,
    }
}

pub fn create_report_config(symbol: &str) -> ReportConfig {
    ReportConfig {
        symbol: symbol.to_string(),
        grid: Some(100.0),
        init_budget: Some(1000.0),
    }
}

pub fn grid_context(ws: &TestWorkspace, params: GridConfig) -> BotContext<GridConfig> {
    BotContext::from_parts(ws.system.clone(), params, create_test_keys()).expect("Invalid grid config")
}

pub fn rebalance_context(ws: &TestWorkspace, params: RebalanceConfig) -> BotContext<RebalanceConfig> {
    BotContext::from_parts(ws.system.clone(), params, create_test_keys()).expect("Invalid rebalance config")
}

/// Paper exchange and a recording notifier, shared with the bot under test
pub fn paper_setup(last: f64) -> (Arc<PaperExchange>, Arc<MemoryNotifier>) {
    (Arc::new(PaperExchange::new(last)), Arc::new(MemoryNotifier::new()))
}

pub fn exchange_order(id: &str, symbol: &str, side: OrderSide, amount: f64, price: f64) -> ExchangeOrder {
    ExchangeOrder {
        id: id.to_string(),
        symbol: symbol.to_string(),
        order_type: OrderType::Limit,
        side,
        status: OrderStatus::Open,
        amount,
        filled: 0.0,
        price,
    }
}
