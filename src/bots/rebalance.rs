// Rebalance bot: settle the previous order, then correct the holding

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;

use super::{seconds, Bot, TickOutcome};
use crate::clients::ExchangeGateway;
use crate::config::{BotContext, LedgerPaths, RebalanceConfig};
use crate::core::rebalance::rebalance_port;
use crate::core::reconcile::{check_open_orders, ReconcileContext, TickFlow};
use crate::error::TradingResult;
use crate::ledger::{ErrorLog, OpenOrderSlot, OrderLedger};
use crate::notify::Notifier;

pub struct RebalanceBot {
    ctx: BotContext<RebalanceConfig>,
    paths: LedgerPaths,
    exchange: Arc<dyn ExchangeGateway>,
    notifier: Arc<dyn Notifier>,
}

impl RebalanceBot {
    pub fn new(
        ctx: BotContext<RebalanceConfig>,
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
impl Bot for RebalanceBot {
    fn name(&self) -> &str {
        &self.ctx.system.bot_name
    }

    async fn tick(&self) -> TradingResult<TickOutcome> {
        let mut slot = OpenOrderSlot::load(&self.paths.open_orders)?;
        let mut transactions = OrderLedger::load(&self.paths.transactions)?;
        let error_log = ErrorLog::new(&self.paths.error_log);

        let reconcile = ReconcileContext {
            exchange: self.exchange.as_ref(),
            notifier: self.notifier.as_ref(),
            error_log: &error_log,
            symbol: &self.ctx.symbol,
            bot_name: &self.ctx.system.bot_name,
        };
        if check_open_orders(&reconcile, &mut slot, &mut transactions).await? == TickFlow::Skip {
            return Ok(TickOutcome::Skipped);
        }

        sleep(seconds(self.ctx.system.idle_stage)).await;

        let last_price = self.exchange.fetch_ticker(&self.ctx.symbol.to_string()).await?.last;
        debug!("Last price {} {}", last_price, self.ctx.symbol.quote);

        rebalance_port(
            self.exchange.as_ref(),
            &error_log,
            &mut slot,
            &self.ctx.symbol,
            &self.ctx.params,
            last_price,
        )
        .await?;

        Ok(TickOutcome::Completed)
    }
}
