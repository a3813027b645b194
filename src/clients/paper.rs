// In-memory exchange for tests and dry runs
//
// Orders rest until `fill_order` or `set_price` crosses them. Failures can be
// scripted so callers can exercise the not-found and insufficient-funds paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::ExchangeGateway;
use crate::core::types::{
    Balance, BidAsk, ExchangeOrder, OrderSide, OrderStatus, OrderType, Symbol, Ticker,
};
use crate::error::{TradingError, TradingResult};

/// Failure injected into the next matching call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    CancelNotFound,
    CreateInsufficientFunds,
    CreateRejected,
}

#[derive(Debug, Default)]
struct PaperState {
    last: f64,
    spread: f64,
    balance: Balance,
    orders: HashMap<String, ExchangeOrder>,
    order_sequence: Vec<String>,
    failures: VecDeque<ScriptedFailure>,
    created: Vec<ExchangeOrder>,
    cancelled: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PaperExchange {
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn new(last: f64) -> Self {
        Self {
            state: Mutex::new(PaperState {
                last,
                ..PaperState::default()
            }),
        }
    }

    /// Bid is `last - spread/2`, ask is `last + spread/2`
    pub fn with_spread(self, spread: f64) -> Self {
        self.lock().spread = spread;
        self
    }

    pub fn with_balance(self, currency: &str, total: f64) -> Self {
        self.lock().balance.add(currency, total);
        self
    }

    fn lock(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_next(&self, failure: ScriptedFailure) {
        self.lock().failures.push_back(failure);
    }

    /// Move the market. Resting orders the new price crosses are filled.
    pub fn set_price(&self, last: f64) {
        let crossed: Vec<String> = {
            let mut state = self.lock();
            state.last = last;
            state
                .order_sequence
                .iter()
                .filter(|id| {
                    state.orders.get(*id).is_some_and(|o| {
                        o.status == OrderStatus::Open
                            && match o.side {
                                OrderSide::Buy => last <= o.price,
                                OrderSide::Sell => last >= o.price,
                            }
                    })
                })
                .cloned()
                .collect()
        };

        for id in crossed {
            self.fill_order(&id);
        }
    }

    /// Fill an order completely and settle balances
    pub fn fill_order(&self, order_id: &str) -> bool {
        let mut state = self.lock();
        let Some(order) = state.orders.get_mut(order_id) else {
            return false;
        };
        if order.status != OrderStatus::Open {
            return false;
        }

        order.filled = order.amount;
        order.status = OrderStatus::Closed;
        let order = order.clone();

        if let Ok(symbol) = Symbol::parse(&order.symbol) {
            let value = order.amount * order.price;
            match order.side {
                OrderSide::Buy => {
                    state.balance.add(&symbol.base, order.amount);
                    state.balance.add(&symbol.quote, -value);
                }
                OrderSide::Sell => {
                    state.balance.add(&symbol.base, -order.amount);
                    state.balance.add(&symbol.quote, value);
                }
            }
        }

        debug!("📄 Paper fill {} {} {} @ {}", order.id, order.side, order.amount, order.price);
        true
    }

    /// Cancel an order as if someone did it on the exchange website
    pub fn cancel_externally(&self, order_id: &str) {
        if let Some(order) = self.lock().orders.get_mut(order_id) {
            order.status = OrderStatus::Canceled;
        }
    }

    /// Register an order that the exchange knows about
    pub fn insert_order(&self, order: ExchangeOrder) {
        let mut state = self.lock();
        state.order_sequence.push(order.id.clone());
        state.orders.insert(order.id.clone(), order);
    }

    pub fn created_orders(&self) -> Vec<ExchangeOrder> {
        self.lock().created.clone()
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.lock().cancelled.clone()
    }

    fn take_failure(state: &mut PaperState, wanted: &[ScriptedFailure]) -> Option<ScriptedFailure> {
        let index = state.failures.iter().position(|f| wanted.contains(f))?;
        state.failures.remove(index)
    }

    /// Quote (buy) or base (sell) still free after resting orders are reserved
    fn available(state: &PaperState, symbol: &Symbol, side: OrderSide) -> f64 {
        let reserved: f64 = state
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Open && o.side == side && o.symbol == symbol.to_string())
            .map(|o| match side {
                OrderSide::Buy => o.amount * o.price,
                OrderSide::Sell => o.amount,
            })
            .sum();

        match side {
            OrderSide::Buy => state.balance.total(&symbol.quote) - reserved,
            OrderSide::Sell => state.balance.total(&symbol.base) - reserved,
        }
    }
}

#[async_trait]
impl ExchangeGateway for PaperExchange {
    async fn fetch_ticker(&self, _symbol: &str) -> TradingResult<Ticker> {
        Ok(Ticker { last: self.lock().last })
    }

    async fn fetch_best_bid_ask(&self, _symbol: &str) -> TradingResult<BidAsk> {
        let state = self.lock();
        Ok(BidAsk {
            bid: state.last - state.spread / 2.0,
            ask: state.last + state.spread / 2.0,
        })
    }

    async fn fetch_balance(&self) -> TradingResult<Balance> {
        Ok(self.lock().balance.clone())
    }

    async fn fetch_order(&self, order_id: &str, _symbol: &str) -> TradingResult<ExchangeOrder> {
        self.lock()
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| TradingError::OrderNotFound(order_id.to_string()))
    }

    async fn fetch_open_orders(&self, symbol: &str) -> TradingResult<Vec<ExchangeOrder>> {
        let state = self.lock();
        Ok(state
            .order_sequence
            .iter()
            .filter_map(|id| state.orders.get(id))
            .filter(|o| o.symbol == symbol && o.status == OrderStatus::Open)
            .cloned()
            .collect())
    }

    async fn cancel_order(&self, order_id: &str, _symbol: &str) -> TradingResult<()> {
        let mut state = self.lock();
        if Self::take_failure(&mut state, &[ScriptedFailure::CancelNotFound]).is_some() {
            return Err(TradingError::OrderNotFound(order_id.to_string()));
        }

        match state.orders.get_mut(order_id) {
            Some(order) if order.status == OrderStatus::Open => {
                order.status = OrderStatus::Canceled;
                state.cancelled.push(order_id.to_string());
                Ok(())
            }
            _ => Err(TradingError::OrderNotFound(order_id.to_string())),
        }
    }

    async fn create_order(
        &self,
        symbol: &str,
        order_type: OrderType,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> TradingResult<ExchangeOrder> {
        let parsed = Symbol::parse(symbol)?;
        let mut state = self.lock();

        match Self::take_failure(
            &mut state,
            &[ScriptedFailure::CreateInsufficientFunds, ScriptedFailure::CreateRejected],
        ) {
            Some(ScriptedFailure::CreateInsufficientFunds) => {
                return Err(TradingError::InsufficientFunds("Balance insufficient!".to_string()));
            }
            Some(_) => return Err(TradingError::OrderRejected("scripted rejection".to_string())),
            None => {}
        }

        if amount <= 0.0 || price <= 0.0 {
            return Err(TradingError::OrderRejected(format!(
                "amount {} and price {} must be positive",
                amount, price
            )));
        }

        let needed = match side {
            OrderSide::Buy => amount * price,
            OrderSide::Sell => amount,
        };
        if needed > Self::available(&state, &parsed, side) + 1e-9 {
            return Err(TradingError::InsufficientFunds(format!(
                "{} {} needs {:.8}",
                side, symbol, needed
            )));
        }

        let order = ExchangeOrder {
            id: Uuid::new_v4().simple().to_string(),
            symbol: symbol.to_string(),
            order_type,
            side,
            status: OrderStatus::Open,
            amount,
            filled: 0.0,
            price,
        };

        state.order_sequence.push(order.id.clone());
        state.orders.insert(order.id.clone(), order.clone());
        state.created.push(order.clone());
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buy_fills_when_price_crosses() {
        let exchange = PaperExchange::new(100.0).with_balance("USDT", 1000.0);
        let order = exchange
            .create_order("BTC/USDT", OrderType::Limit, OrderSide::Buy, 2.0, 95.0)
            .await
            .unwrap();

        exchange.set_price(96.0);
        assert_eq!(exchange.fetch_order(&order.id, "BTC/USDT").await.unwrap().status, OrderStatus::Open);

        exchange.set_price(94.0);
        let filled = exchange.fetch_order(&order.id, "BTC/USDT").await.unwrap();
        assert_eq!(filled.status, OrderStatus::Closed);
        assert_eq!(filled.filled, 2.0);

        let balance = exchange.fetch_balance().await.unwrap();
        assert_eq!(balance.total("BTC"), 2.0);
        assert_eq!(balance.total("USDT"), 810.0);
    }

    #[tokio::test]
    async fn test_insufficient_funds_counts_resting_orders() {
        let exchange = PaperExchange::new(100.0).with_balance("USDT", 150.0);
        exchange
            .create_order("BTC/USDT", OrderType::Limit, OrderSide::Buy, 1.0, 100.0)
            .await
            .unwrap();

        let err = exchange
            .create_order("BTC/USDT", OrderType::Limit, OrderSide::Buy, 1.0, 100.0)
            .await
            .unwrap_err();
        assert!(matches!(err, TradingError::InsufficientFunds(_)));
    }

    #[tokio::test]
    async fn test_scripted_cancel_failure() {
        let exchange = PaperExchange::new(100.0).with_balance("USDT", 150.0);
        let order = exchange
            .create_order("BTC/USDT", OrderType::Limit, OrderSide::Buy, 1.0, 90.0)
            .await
            .unwrap();

        exchange.fail_next(ScriptedFailure::CancelNotFound);
        assert!(matches!(
            exchange.cancel_order(&order.id, "BTC/USDT").await,
            Err(TradingError::OrderNotFound(_))
        ));
        assert!(exchange.cancel_order(&order.id, "BTC/USDT").await.is_ok());
        assert_eq!(exchange.cancelled_ids(), vec![order.id]);
    }
}
