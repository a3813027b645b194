//! Grid order engine
//!
//! The ladder is rebuilt from the ledger every tick instead of being kept in
//! memory. Each filled buy gets a sell one `grid` step above its fill price;
//! a single buy rests below the market and walks down the ladder as sells
//! accumulate.

use tracing::{debug, info};

use crate::clients::ExchangeGateway;
use crate::config::GridConfig;
use crate::core::placement::place_limit_order;
use crate::core::types::{AmountKey, Order, OrderSide, Symbol};
use crate::error::TradingResult;
use crate::ledger::{ErrorLog, OrderLedger};

const EPSILON: f64 = 1e-9;

/// What the engine wants to do with the next buy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuyDecision {
    Place { price: f64, amount: f64 },
    /// A buy is already waiting on the book
    Resting,
    OutOfRange { price: f64 },
    OverBudget { committed: f64 },
}

/// Price the next grid buy should rest at
pub fn next_buy_price(last_price: f64, open_orders: &OrderLedger, config: &GridConfig) -> f64 {
    let below_market = last_price - config.start_safety;
    let lowest_sell = open_orders
        .side(OrderSide::Sell)
        .map(|o| o.price)
        .fold(f64::INFINITY, f64::min);

    if lowest_sell.is_finite() {
        below_market.min(lowest_sell - 2.0 * config.grid)
    } else {
        below_market
    }
}

/// Buys resting below this price have been left behind by the market
pub fn stale_buy_threshold(last_price: f64, open_orders: &OrderLedger, config: &GridConfig) -> f64 {
    next_buy_price(last_price, open_orders, config) - config.grid
}

/// Capital tied up in the grid: cost of held lots plus resting buys
pub fn committed_capital(open_orders: &OrderLedger, grid: f64) -> f64 {
    open_orders
        .orders()
        .iter()
        .map(|o| match o.side {
            OrderSide::Sell => (o.price - grid) * o.amount,
            OrderSide::Buy => o.value,
        })
        .sum()
}

/// Base amount left to sell once the fee, paid in base, is taken
pub fn sell_amount(filled: f64, fee_percent: f64) -> f64 {
    filled * (1.0 - fee_percent / 100.0)
}

pub fn decide_buy(last_price: f64, open_orders: &OrderLedger, config: &GridConfig) -> BuyDecision {
    if open_orders.side(OrderSide::Buy).next().is_some() {
        return BuyDecision::Resting;
    }

    let price = next_buy_price(last_price, open_orders, config);
    if price <= 0.0 || price < config.min_price || price > config.max_price {
        return BuyDecision::OutOfRange { price };
    }

    let committed = committed_capital(open_orders, config.grid);
    if committed + config.value > config.budget + EPSILON {
        return BuyDecision::OverBudget { committed };
    }

    BuyDecision::Place {
        price,
        amount: config.value / price,
    }
}

/// Grid stages that submit orders
pub struct GridEngine<'a> {
    pub exchange: &'a dyn ExchangeGateway,
    pub error_log: &'a ErrorLog,
    pub symbol: &'a Symbol,
    pub config: &'a GridConfig,
}

impl GridEngine<'_> {
    /// Place a sell one grid step above every filled buy. Returns the new sells.
    ///
    /// The buy leaves `open_orders` in the same save that records its sell.
    pub async fn place_counter_sells(
        &self,
        open_orders: &mut OrderLedger,
        filled_buys: &[Order],
    ) -> TradingResult<Vec<Order>> {
        let mut placed = Vec::new();

        for fill in filled_buys.iter().filter(|f| f.side == OrderSide::Buy) {
            let amount = sell_amount(fill.amount, self.config.fee_percent);
            if amount <= 0.0 {
                open_orders.remove(&fill.order_id);
                open_orders.save()?;
                continue;
            }
            let price = fill.price + self.config.grid;

            let order = place_limit_order(
                self.exchange,
                self.error_log,
                self.symbol,
                OrderSide::Sell,
                amount,
                price,
            )
            .await?;

            let row = Order::from_exchange(&order, self.symbol, AmountKey::Requested);
            open_orders.remove(&fill.order_id);
            open_orders.append(row.clone())?;
            open_orders.save()?;
            placed.push(row);
        }

        Ok(placed)
    }

    /// Open the next grid buy if the ladder allows one
    pub async fn open_buy_order(
        &self,
        open_orders: &mut OrderLedger,
        last_price: f64,
    ) -> TradingResult<Option<Order>> {
        match decide_buy(last_price, open_orders, self.config) {
            BuyDecision::Place { price, amount } => {
                let order = place_limit_order(
                    self.exchange,
                    self.error_log,
                    self.symbol,
                    OrderSide::Buy,
                    amount,
                    price,
                )
                .await?;

                let row = Order::from_exchange(&order, self.symbol, AmountKey::Requested);
                open_orders.append(row.clone())?;
                open_orders.save()?;
                Ok(Some(row))
            }
            BuyDecision::Resting => {
                debug!("Buy order already resting");
                Ok(None)
            }
            BuyDecision::OutOfRange { price } => {
                info!(
                    "⏸️  Next buy {:.2} {} is outside [{:.2}, {:.2}]",
                    price, self.symbol.quote, self.config.min_price, self.config.max_price
                );
                Ok(None)
            }
            BuyDecision::OverBudget { committed } => {
                info!(
                    "⏸️  Budget used: {:.2} of {:.2} {}",
                    committed, self.config.budget, self.symbol.quote
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderType;
    use tempfile::TempDir;

    fn config() -> GridConfig {
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

    fn ledger(dir: &TempDir, orders: &[(OrderSide, f64, f64)]) -> OrderLedger {
        let mut ledger = OrderLedger::empty(dir.path().join("open_orders.csv"));
        for (i, (side, amount, price)) in orders.iter().enumerate() {
            ledger
                .append(Order::new(i.to_string(), "BTC/USDT", OrderType::Limit, *side, *amount, *price))
                .unwrap();
        }
        ledger
    }

    #[test]
    fn test_first_buy_sits_start_safety_below_market() {
        let dir = TempDir::new().unwrap();
        let open = ledger(&dir, &[]);

        assert_eq!(next_buy_price(3000.0, &open, &config()), 2950.0);
        assert_eq!(
            decide_buy(3000.0, &open, &config()),
            BuyDecision::Place { price: 2950.0, amount: 100.0 / 2950.0 }
        );
    }

    #[test]
    fn test_buy_follows_lowest_sell() {
        let dir = TempDir::new().unwrap();
        let open = ledger(&dir, &[(OrderSide::Sell, 0.05, 2500.0)]);

        // lot bought at 2400, next level is 2300
        assert_eq!(next_buy_price(3000.0, &open, &config()), 2300.0);
        assert_eq!(next_buy_price(2320.0, &open, &config()), 2270.0);
        assert_eq!(stale_buy_threshold(3000.0, &open, &config()), 2200.0);
    }

    #[test]
    fn test_resting_buy_blocks_another() {
        let dir = TempDir::new().unwrap();
        let open = ledger(&dir, &[(OrderSide::Buy, 0.04, 2500.0)]);
        assert_eq!(decide_buy(3000.0, &open, &config()), BuyDecision::Resting);
    }

    #[test]
    fn test_price_range_respected() {
        let dir = TempDir::new().unwrap();
        let open = ledger(&dir, &[]);
        assert_eq!(
            decide_buy(1020.0, &open, &config()),
            BuyDecision::OutOfRange { price: 970.0 }
        );
    }

    #[test]
    fn test_budget_counts_cost_basis_of_lots() {
        let dir = TempDir::new().unwrap();
        // two lots bought at 2000 for 50 each
        let open = ledger(
            &dir,
            &[(OrderSide::Sell, 0.025, 2100.0), (OrderSide::Sell, 0.025, 2100.0)],
        );
        assert!((committed_capital(&open, 100.0) - 100.0).abs() < 1e-9);

        let mut tight = config();
        tight.budget = 150.0;
        assert!(matches!(
            decide_buy(3000.0, &open, &tight),
            BuyDecision::OverBudget { .. }
        ));
        assert!(matches!(decide_buy(3000.0, &open, &config()), BuyDecision::Place { .. }));
    }

    #[test]
    fn test_sell_amount_deducts_fee() {
        assert!((sell_amount(1.0, 0.1) - 0.999).abs() < 1e-12);
        assert_eq!(sell_amount(2.0, 0.0), 2.0);
    }
}
