//! Exchange clients
//!
//! Strategies only talk to [`ExchangeGateway`]. `KucoinClient` is the live
//! implementation and `PaperExchange` keeps everything in memory.

use async_trait::async_trait;

use crate::core::types::{Balance, BidAsk, ExchangeOrder, OrderSide, OrderType, Ticker};
use crate::error::TradingResult;

pub mod kucoin;
pub mod paper;

pub use kucoin::KucoinClient;
pub use paper::PaperExchange;

/// Authenticated exchange calls used by the bots.
///
/// Implementations report a missing order as `TradingError::OrderNotFound`
/// and a rejected order for lack of balance as `TradingError::InsufficientFunds`.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn fetch_ticker(&self, symbol: &str) -> TradingResult<Ticker>;

    async fn fetch_best_bid_ask(&self, symbol: &str) -> TradingResult<BidAsk>;

    async fn fetch_balance(&self) -> TradingResult<Balance>;

    async fn fetch_order(&self, order_id: &str, symbol: &str) -> TradingResult<ExchangeOrder>;

    async fn fetch_open_orders(&self, symbol: &str) -> TradingResult<Vec<ExchangeOrder>>;

    async fn cancel_order(&self, order_id: &str, symbol: &str) -> TradingResult<()>;

    async fn create_order(
        &self,
        symbol: &str,
        order_type: OrderType,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> TradingResult<ExchangeOrder>;
}
