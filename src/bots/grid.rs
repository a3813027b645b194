// Grid bot: settle fills, hang counter-sells, keep one buy on the ladder

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use super::{seconds, Bot, TickOutcome};
use crate::clients::ExchangeGateway;
use crate::config::{BotContext, GridConfig, LedgerPaths};
use crate::core::grid::{stale_buy_threshold, GridEngine};
use crate::core::reconcile::{reconcile_grid_orders, ReconcileContext, TickFlow};
use crate::error::TradingResult;
use crate::ledger::{ErrorLog, OrderLedger};
use crate::notify::Notifier;

pub struct GridBot {
    ctx: BotContext<GridConfig>,
    paths: LedgerPaths,
    exchange: Arc<dyn ExchangeGateway>,
    notifier: Arc<dyn Notifier>,
}

impl GridBot {
    pub fn new(
        ctx: BotContext<GridConfig>,
        exchange: Arc<dyn ExchangeGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let paths = ctx.ledger_paths();
        Self {
            ctx,
            paths,
            exchange,
            notifier,
        }
    }

    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }
}

#[async_trait]
impl Bot for GridBot {
    fn name(&self) -> &str {
        &self.ctx.system.bot_name
    }

    async fn tick(&self) -> TradingResult<TickOutcome> {
        let mut open_orders = OrderLedger::load(&self.paths.open_orders)?;
        let mut transactions = OrderLedger::load(&self.paths.transactions)?;
        let error_log = ErrorLog::new(&self.paths.error_log);
        let symbol = &self.ctx.symbol;
        let config = &self.ctx.params;

        let last_price = self.exchange.fetch_ticker(&symbol.to_string()).await?.last;
        debug!("Last price {} {}", last_price, symbol.quote);

        let reconcile = ReconcileContext {
            exchange: self.exchange.as_ref(),
            notifier: self.notifier.as_ref(),
            error_log: &error_log,
            symbol,
            bot_name: &self.ctx.system.bot_name,
        };
        let stale_below = stale_buy_threshold(last_price, &open_orders, config);
        let reconciled =
            reconcile_grid_orders(&reconcile, &mut open_orders, &mut transactions, Some(stale_below)).await?;

        sleep(seconds(self.ctx.system.idle_stage)).await;

        let engine = GridEngine {
            exchange: self.exchange.as_ref(),
            error_log: &error_log,
            symbol,
            config,
        };

        // Filled buys get their sells even on a skipped tick
        let sells = engine
            .place_counter_sells(&mut open_orders, &reconciled.awaiting_sell)
            .await?;
        if !sells.is_empty() {
            info!("📈 Placed {} counter-sell orders", sells.len());
        }

        if reconciled.flow == TickFlow::Skip {
            return Ok(TickOutcome::Skipped);
        }

        engine.open_buy_order(&mut open_orders, last_price).await?;
        Ok(TickOutcome::Completed)
    }
}
