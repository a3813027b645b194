// Report and status command implementations
use std::path::Path;

use tracing::{info, warn};

use tick_bots::config::{BotContext, ReportConfig, SystemConfig};
use tick_bots::core::OrderSide;
use tick_bots::ledger::{ErrorLog, OrderLedger};
use tick_bots::notify::send_best_effort;
use tick_bots::report::{pending_order_range, utc_offset, Reporter};
use tick_bots::TradingResult;

use crate::bot_commands::{connect, BotKind};

/// Build a report for one bot and push it to the chat channel
pub async fn send_report(
    system_path: &str,
    params_path: &str,
    kind: BotKind,
    push: bool,
) -> TradingResult<String> {
    let ctx: BotContext<ReportConfig> = BotContext::load(system_path, params_path)?;
    let (exchange, notifier) = connect(&ctx.keys)?;
    let paths = ctx.ledger_paths();

    let reporter = Reporter {
        exchange: exchange.as_ref(),
        paths: &paths,
        config: &ctx.params,
        symbol: &ctx.symbol,
        offset: utc_offset(ctx.system.utc_offset_hours)?,
    };

    let header = ctx.system.bot_name.clone();
    let text = match kind {
        BotKind::Grid => reporter.grid_report(&header).await?,
        BotKind::Rebalance => reporter.rebalance_report(&header).await?,
    };

    if push {
        send_best_effort(notifier.as_ref(), &text).await;
    }
    Ok(text)
}

/// Offline overview of the ledgers; no exchange calls
pub async fn show_status(system_path: &str) -> TradingResult<()> {
    info!("📊 System Status");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if !Path::new(system_path).exists() {
        info!("⚙️  Config: NOT FOUND (run: tick-bot init)");
        return Ok(());
    }
    let system = SystemConfig::from_file(system_path)?;
    info!("⚙️  Config: OK ({})", system.bot_name);

    let paths = system.ledger_paths();
    if !paths.open_orders.exists() || !paths.transactions.exists() {
        info!("💾 Ledgers: NOT FOUND in {} (run: tick-bot init)", system.data_dir);
        return Ok(());
    }

    let open_orders = OrderLedger::load(&paths.open_orders)?;
    let transactions = OrderLedger::load(&paths.transactions)?;
    let range = pending_order_range(open_orders.orders());

    info!(
        "📋 Open orders: {} ({} buy, {} sell)",
        open_orders.len(),
        open_orders.side(OrderSide::Buy).count(),
        open_orders.side(OrderSide::Sell).count()
    );
    if !open_orders.is_empty() {
        info!("   📉 Buys:  {:.2} .. {:.2}", range.min_buy, range.max_buy);
        info!("   📈 Sells: {:.2} .. {:.2}", range.min_sell, range.max_sell);
    }
    info!("🧾 Transactions: {}", transactions.len());

    let errors = ErrorLog::new(&paths.error_log).entries()?;
    match errors.last() {
        Some(last) => warn!(
            "⚠️  Error log: {} entries, last '{}' at {}",
            errors.len(),
            last.error_message,
            last.timestamp.to_rfc3339()
        ),
        None => info!("✅ Error log: empty"),
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    Ok(())
}
