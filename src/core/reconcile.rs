//! Reconciliation of the local ledgers against the exchange
//!
//! The exchange is the source of truth. Every tick each recorded open order is
//! looked up again: fills move to the transactions ledger, everything else is
//! cancelled or dropped. An order the exchange cannot find is left alone for
//! the next tick and the current tick is skipped.
//!
//! A grid buy that filled stays in the open ledger until its counter-sell
//! replaces it, so a sell that fails to go out is retried on the next tick.

use tracing::{info, warn};

use crate::clients::ExchangeGateway;
use crate::core::types::{AmountKey, ExchangeOrder, Order, OrderSide, OrderStatus, Symbol};
use crate::error::{TradingError, TradingResult};
use crate::ledger::{ErrorLog, OpenOrderSlot, OrderLedger};
use crate::notify::{send_best_effort, Notifier};

/// Whether the rest of the tick may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Skip,
}

/// Result of reconciling the grid's open orders
#[derive(Debug, Clone, PartialEq)]
pub struct GridReconciliation {
    pub flow: TickFlow,
    /// Transactions rows recorded this tick, in ledger order
    pub fills: Vec<Order>,
    /// Filled buys still waiting in the open ledger for their counter-sell
    pub awaiting_sell: Vec<Order>,
    pub cancelled: Vec<String>,
}

/// Shared collaborators of a reconciliation pass
pub struct ReconcileContext<'a> {
    pub exchange: &'a dyn ExchangeGateway,
    pub notifier: &'a dyn Notifier,
    pub error_log: &'a ErrorLog,
    pub symbol: &'a Symbol,
    pub bot_name: &'a str,
}

pub fn success_message(bot_name: &str, order: &ExchangeOrder, symbol: &Symbol) -> String {
    format!(
        "{}: {} {:.3} {} at {:.2} {}",
        bot_name, order.side, order.filled, symbol.base, order.price, symbol.quote
    )
}

impl ReconcileContext<'_> {
    /// Look an order up, logging `OrderNotFound` when the exchange has no trace of it
    async fn lookup(&self, order_id: &str) -> TradingResult<Option<ExchangeOrder>> {
        match self.exchange.fetch_order(order_id, &self.symbol.to_string()).await {
            Ok(order) => Ok(Some(order)),
            Err(TradingError::OrderNotFound(_)) => {
                self.not_found(order_id, "fetch")?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Cancel an order. Returns false when the exchange could not find it.
    async fn cancel(&self, order_id: &str) -> TradingResult<bool> {
        match self.exchange.cancel_order(order_id, &self.symbol.to_string()).await {
            Ok(()) => {
                info!("🚫 Cancel order {}", order_id);
                Ok(true)
            }
            Err(TradingError::OrderNotFound(_)) => {
                self.not_found(order_id, "cancel")?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn not_found(&self, order_id: &str, action: &str) -> TradingResult<()> {
        self.error_log.append("OrderNotFound")?;
        warn!("⚠️  Cannot {} order {}, wait for the next loop", action, order_id);
        Ok(())
    }

    async fn announce_fill(&self, order: &ExchangeOrder) {
        let message = success_message(self.bot_name, order, self.symbol);
        info!("✅ {}", message);
        send_best_effort(self.notifier, &message).await;
    }

    /// Record a fill once, announcing it only the first time it is seen
    async fn record_fill(
        &self,
        order: &ExchangeOrder,
        transactions: &mut OrderLedger,
        outcome: &mut GridReconciliation,
    ) -> TradingResult<Order> {
        let row = Order::from_exchange(order, self.symbol, AmountKey::Filled);
        if !transactions.contains(&row.order_id) {
            transactions.append(row.clone())?;
            outcome.fills.push(row.clone());
            self.announce_fill(order).await;
        }
        Ok(row)
    }
}

/// Reconcile the rebalance bot's single open order.
///
/// A closed order moves to `transactions` with its filled amount. An order
/// already cancelled on the exchange is dropped. Anything still live is
/// cancelled so the next decision starts from a clean slate.
pub async fn check_open_orders(
    ctx: &ReconcileContext<'_>,
    slot: &mut OpenOrderSlot,
    transactions: &mut OrderLedger,
) -> TradingResult<TickFlow> {
    let Some(recorded) = slot.current() else {
        return Ok(TickFlow::Continue);
    };
    let order_id = recorded.order_id.clone();

    let Some(order) = ctx.lookup(&order_id).await? else {
        return Ok(TickFlow::Skip);
    };

    if order.status == OrderStatus::Closed {
        transactions.append_if_absent(Order::from_exchange(&order, ctx.symbol, AmountKey::Filled));
        transactions.save()?;
        slot.clear();
        slot.save()?;
        ctx.announce_fill(&order).await;
        return Ok(TickFlow::Continue);
    }

    if order.status == OrderStatus::Canceled {
        info!("Order {} was cancelled on the exchange", order_id);
        slot.clear();
        slot.save()?;
        return Ok(TickFlow::Continue);
    }

    if !ctx.cancel(&order_id).await? {
        return Ok(TickFlow::Skip);
    }

    slot.clear();
    slot.save()?;
    Ok(TickFlow::Continue)
}

/// Reconcile every open order of the grid bot.
///
/// Open buys priced below `stale_below` are cancelled. Orders cancelled
/// outside the bot are dropped, and whatever part of them filled is still
/// recorded and reported as a fill. Buys with a fill are kept in `open` and
/// returned in `awaiting_sell` on every tick until a counter-sell replaces them.
pub async fn reconcile_grid_orders(
    ctx: &ReconcileContext<'_>,
    open: &mut OrderLedger,
    transactions: &mut OrderLedger,
    stale_below: Option<f64>,
) -> TradingResult<GridReconciliation> {
    let mut outcome = GridReconciliation {
        flow: TickFlow::Continue,
        fills: Vec::new(),
        awaiting_sell: Vec::new(),
        cancelled: Vec::new(),
    };
    let recorded: Vec<Order> = open.orders().to_vec();

    for entry in &recorded {
        let Some(order) = ctx.lookup(&entry.order_id).await? else {
            outcome.flow = TickFlow::Skip;
            continue;
        };

        match order.status {
            OrderStatus::Closed => {}
            OrderStatus::Canceled => {
                info!("Order {} was cancelled on the exchange", entry.order_id);
            }
            OrderStatus::Open => {
                let stale = entry.side == OrderSide::Buy
                    && stale_below.is_some_and(|threshold| entry.price < threshold);
                if !stale {
                    continue;
                }
                if !ctx.cancel(&entry.order_id).await? {
                    outcome.flow = TickFlow::Skip;
                    continue;
                }
                outcome.cancelled.push(entry.order_id.clone());
            }
        }

        if order.filled > 0.0 {
            let row = ctx.record_fill(&order, transactions, &mut outcome).await?;
            if entry.side == OrderSide::Buy {
                outcome.awaiting_sell.push(row);
                continue;
            }
        }
        open.remove(&entry.order_id);
    }

    if !outcome.fills.is_empty() {
        transactions.save()?;
    }
    if open.len() != recorded.len() {
        open.save()?;
    }

    Ok(outcome)
}
