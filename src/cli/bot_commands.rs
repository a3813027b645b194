// Bot command implementations: init, grid, rebalance
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use tick_bots::bots::{run_loop, GridBot, RebalanceBot};
use tick_bots::clients::{ExchangeGateway, KucoinClient};
use tick_bots::config::{BotContext, ExchangeKeys, GridConfig, RebalanceConfig, SystemConfig};
use tick_bots::ledger::init_ledgers;
use tick_bots::notify::{self, Notifier};
use tick_bots::TradingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BotKind {
    Grid,
    Rebalance,
}

/// Live exchange client and the notifier named in the keys file
pub fn connect(keys: &ExchangeKeys) -> TradingResult<(Arc<dyn ExchangeGateway>, Arc<dyn Notifier>)> {
    if keys.subaccount.is_some() {
        warn!("⚠️  subaccount is ignored, KuCoin keys are scoped per sub-account already");
    }
    let exchange: Arc<dyn ExchangeGateway> = Arc::new(KucoinClient::new(keys)?);
    let notifier: Arc<dyn Notifier> = Arc::from(notify::from_keys(keys)?);
    Ok((exchange, notifier))
}

pub async fn run_grid(system_path: &str, params_path: &str, ticks: Option<u64>) -> TradingResult<()> {
    let ctx: BotContext<GridConfig> = BotContext::load(system_path, params_path)?;
    let params = &ctx.params;

    info!("🎯 Grid {} | budget {:.2} {}", ctx.symbol, params.budget, ctx.symbol.quote);
    info!(
        "   📏 Step {:.2}, {:.2} {} per level, range [{:.2}, {:.2}]",
        params.grid, params.value, ctx.symbol.quote, params.min_price, params.max_price
    );

    let (exchange, notifier) = connect(&ctx.keys)?;
    let bot = GridBot::new(ctx.clone(), exchange, notifier);
    run_loop(&bot, &ctx.system, ticks).await?;
    Ok(())
}

pub async fn run_rebalance(system_path: &str, params_path: &str, ticks: Option<u64>) -> TradingResult<()> {
    let ctx: BotContext<RebalanceConfig> = BotContext::load(system_path, params_path)?;

    info!(
        "⚖️  Rebalance {} | target {:.2} ± {:.2} {}",
        ctx.symbol, ctx.params.fix_value, ctx.params.min_value, ctx.symbol.quote
    );

    let (exchange, notifier) = connect(&ctx.keys)?;
    let bot = RebalanceBot::new(ctx.clone(), exchange, notifier);
    run_loop(&bot, &ctx.system, ticks).await?;
    Ok(())
}

/// Write example configs that are missing, then create the ledgers
pub async fn init_workspace(
    system_path: &str,
    params_path: &str,
    kind: BotKind,
    no_examples: bool,
) -> TradingResult<()> {
    info!("🔧 Initializing workspace...");

    if !no_examples {
        write_example(system_path, &example_system(kind))?;
        match kind {
            BotKind::Grid => write_example(params_path, &example_grid())?,
            BotKind::Rebalance => write_example(params_path, &example_rebalance())?,
        }
    }

    let system = SystemConfig::from_file(system_path)?;
    if !no_examples {
        write_example(&system.keys_path, &example_keys())?;
    }

    fs::create_dir_all(&system.data_dir)?;
    let created = init_ledgers(&system.ledger_paths())?;
    if created.is_empty() {
        warn!("⚠️  Ledgers already exist in {}, left untouched", system.data_dir);
    }

    info!("✅ Workspace initialized successfully!");
    info!("💡 Next steps:");
    info!("   1. Put your API keys in {}", system.keys_path);
    info!("   2. Edit {} for your market", params_path);
    match kind {
        BotKind::Grid => info!("   3. Run: tick-bot grid"),
        BotKind::Rebalance => info!("   3. Run: tick-bot rebalance"),
    }
    Ok(())
}

fn write_example<T: Serialize>(path: &str, value: &T) -> TradingResult<()> {
    if Path::new(path).exists() {
        warn!("⚠️  {} already exists, skipping", path);
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let content = if path.ends_with(".toml") {
        toml::to_string_pretty(value).map_err(|e| tick_bots::TradingError::Internal(e.to_string()))?
    } else {
        serde_json::to_string_pretty(value)?
    };
    fs::write(path, content)?;
    info!("📝 Created {}", path);
    Ok(())
}

fn example_system(kind: BotKind) -> SystemConfig {
    SystemConfig {
        loop_flag: true,
        idle_stage: 1.0,
        idle_loop: 60.0,
        keys_path: "keys.json".to_string(),
        data_dir: ".".to_string(),
        utc_offset_hours: 7,
        bot_name: match kind {
            BotKind::Grid => "grid_bot".to_string(),
            BotKind::Rebalance => "rebalance_bot".to_string(),
        },
    }
}

fn example_grid() -> GridConfig {
    GridConfig {
        symbol: "BTC/USDT".to_string(),
        budget: 1000.0,
        grid: 200.0,
        value: 20.0,
        min_price: 20000.0,
        max_price: 80000.0,
        fee_percent: 0.1,
        start_safety: 100.0,
    }
}

fn example_rebalance() -> RebalanceConfig {
    RebalanceConfig {
        symbol: "ETH/USDT".to_string(),
        fix_value: 1000.0,
        min_value: 20.0,
    }
}

fn example_keys() -> ExchangeKeys {
    ExchangeKeys {
        api_key: "your-api-key".to_string(),
        secret: "your-api-secret".to_string(),
        password: Some("your-api-passphrase".to_string()),
        subaccount: None,
        line_token: None,
    }
}
