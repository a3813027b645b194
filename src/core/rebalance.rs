// Rebalancing decision engine
//
// Keeps the base-asset holding worth `fix_value` quote units. Nothing happens
// while the value stays within `fix_value ± min_value`; outside the band one
// limit order closes the gap, bought at the bid or sold at the ask.

use tracing::{debug, info};

use crate::clients::ExchangeGateway;
use crate::config::RebalanceConfig;
use crate::core::placement::place_limit_order;
use crate::core::types::{AmountKey, Balance, BidAsk, Order, OrderSide, Symbol};
use crate::error::{TradingError, TradingResult};
use crate::ledger::{ErrorLog, OpenOrderSlot};

/// Order that brings the holding back to target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebalanceOrder {
    pub side: OrderSide,
    pub price: f64,
    pub amount: f64,
    /// Quote value the order moves
    pub deviation: f64,
}

/// Value of the base holding at `last_price`; zero when the base is absent
pub fn current_value(balance: &Balance, symbol: &Symbol, last_price: f64) -> f64 {
    balance.base_value(symbol, last_price)
}

/// Side to trade, or `None` inside the dead-band (bounds included)
pub fn band_side(current_value: f64, fix_value: f64, min_value: f64) -> Option<OrderSide> {
    if current_value < fix_value - min_value {
        Some(OrderSide::Buy)
    } else if current_value > fix_value + min_value {
        Some(OrderSide::Sell)
    } else {
        None
    }
}

pub fn decide_rebalance(
    current_value: f64,
    fix_value: f64,
    min_value: f64,
    quote: BidAsk,
) -> Option<RebalanceOrder> {
    let side = band_side(current_value, fix_value, min_value)?;
    let (price, deviation) = match side {
        OrderSide::Buy => (quote.bid, fix_value - current_value),
        OrderSide::Sell => (quote.ask, current_value - fix_value),
    };

    if price <= 0.0 {
        return None;
    }

    Some(RebalanceOrder {
        side,
        price,
        amount: deviation / price,
        deviation,
    })
}

/// Check the band and submit the correcting order, recording it in `slot`.
///
/// Lack of funds is logged as `InsufficientFunds` and returned; the slot is
/// left untouched so the caller can stop the bot.
pub async fn rebalance_port(
    exchange: &dyn ExchangeGateway,
    error_log: &ErrorLog,
    slot: &mut OpenOrderSlot,
    symbol: &Symbol,
    config: &RebalanceConfig,
    last_price: f64,
) -> TradingResult<Option<Order>> {
    let balance = exchange.fetch_balance().await?;
    let value = current_value(&balance, symbol, last_price);
    debug!("Current value {:.2} {} (target {:.2})", value, symbol.quote, config.fix_value);

    if band_side(value, config.fix_value, config.min_value).is_none() {
        info!("😴 No action, {:.2} {} is within the band", value, symbol.quote);
        return Ok(None);
    }

    let quote = exchange.fetch_best_bid_ask(&symbol.to_string()).await?;
    let decision = decide_rebalance(value, config.fix_value, config.min_value, quote).ok_or_else(|| {
        TradingError::ApiResponse(format!("No usable bid/ask for {}: {:?}", symbol, quote))
    })?;

    let placed = place_limit_order(
        exchange,
        error_log,
        symbol,
        decision.side,
        decision.amount,
        decision.price,
    )
    .await?;

    let order = Order::from_exchange(&placed, symbol, AmountKey::Requested);
    slot.place(order.clone())?;
    slot.save()?;
    Ok(Some(order))
}
