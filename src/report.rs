//! Status reports for the chat channel
//!
//! Everything here formats numbers that other modules computed. The only
//! side effect is the assets snapshot written next to the ledgers when a
//! grid report is built.

use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::ExchangeGateway;
use crate::config::{LedgerPaths, ReportConfig};
use crate::core::rebalance::current_value;
use crate::core::types::{Order, OrderSide, Symbol};
use crate::core::unrealised::{cal_unrealised, Holdings};
use crate::error::{TradingError, TradingResult};
use crate::ledger::OrderLedger;

/// Lowest and highest resting price per side, 0 for an empty side
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PendingRange {
    pub min_buy: f64,
    pub max_buy: f64,
    pub min_sell: f64,
    pub max_sell: f64,
}

/// Row of `assets.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetsSnapshot {
    #[serde(with = "crate::ledger::timestamp")]
    pub datetime: DateTime<Utc>,
    pub latest_price: f64,
    pub avg_price: f64,
    pub amount: f64,
    pub unrealised_loss: f64,
}

impl AssetsSnapshot {
    pub fn new(latest_price: f64, holdings: &Holdings) -> Self {
        Self {
            datetime: Utc::now(),
            latest_price,
            avg_price: holdings.avg_price,
            amount: holdings.amount,
            unrealised_loss: holdings.unrealised_loss,
        }
    }

    /// Replace the file with this single snapshot
    pub fn write<P: AsRef<Path>>(&self, path: P) -> TradingResult<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| TradingError::FileWrite(format!("{}: {}", path.display(), e)))?;
        writer.serialize(self)?;
        writer.flush()?;
        debug!("Wrote assets snapshot to {}", path.display());
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> TradingResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| TradingError::FileRead(format!("{}: {}", path.display(), e)))?;
        reader
            .deserialize::<Self>()
            .next()
            .ok_or_else(|| TradingError::FileRead(format!("{} is empty", path.display())))?
            .map_err(TradingError::from)
    }
}

pub fn pending_order_range(open_orders: &[Order]) -> PendingRange {
    let bounds = |side: OrderSide| {
        let prices = open_orders.iter().filter(|o| o.side == side).map(|o| o.price);
        let (min, max) = prices.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p), hi.max(p))
        });
        if min.is_finite() {
            (min, max)
        } else {
            (0.0, 0.0)
        }
    };

    let (min_buy, max_buy) = bounds(OrderSide::Buy);
    let (min_sell, max_sell) = bounds(OrderSide::Sell);
    PendingRange {
        min_buy,
        max_buy,
        min_sell,
        max_sell,
    }
}

pub fn utc_offset(hours: i32) -> TradingResult<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| TradingError::ConfigValidation(format!("invalid UTC offset {}h", hours)))
}

/// Calendar date at `offset`
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

fn on_date<'a>(
    transactions: &'a [Order],
    date: NaiveDate,
    offset: FixedOffset,
) -> impl Iterator<Item = &'a Order> {
    transactions
        .iter()
        .filter(move |o| local_date(o.timestamp, offset) == date)
}

/// Cash moved by the rebalance bot on `date`: sells bring cash in, buys take it out
pub fn rebalance_cash_flow(transactions: &[Order], date: NaiveDate, offset: FixedOffset) -> f64 {
    on_date(transactions, date, offset)
        .map(|o| match o.side {
            OrderSide::Sell => o.value,
            OrderSide::Buy => -o.value,
        })
        .sum()
}

/// Profit taken by the grid on `date`, one grid step per unit sold
pub fn grid_cash_flow(transactions: &[Order], grid: f64, date: NaiveDate, offset: FixedOffset) -> f64 {
    on_date(transactions, date, offset)
        .filter(|o| o.side == OrderSide::Sell)
        .map(|o| grid * o.amount)
        .sum()
}

pub fn hold_text(symbol: &Symbol, holdings: &Holdings) -> String {
    format!(
        "Hold {:.4} {} with {} orders at {:.2} {}\nUnrealised: {:.2} {}",
        holdings.amount,
        symbol.base,
        holdings.n_open_sell_orders,
        holdings.avg_price,
        symbol.quote,
        holdings.unrealised_loss,
        symbol.quote
    )
}

/// Numbers behind a rebalance report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebalanceFigures {
    pub current_value: f64,
    pub balance: f64,
    pub cash_flow: f64,
}

pub fn rebalance_text(header: &str, symbol: &Symbol, figures: &RebalanceFigures) -> String {
    let quote = &symbol.quote;
    let mut text = header.to_string();
    text += &format!("\nCurrent value: {:.2} {}", figures.current_value, quote);
    text += &format!("\nBalance: {:.2} {}", figures.balance, quote);
    text += &format!("\nCash: {:.2} {}", figures.balance - figures.current_value, quote);
    text += &format!("\nToday cash flow: {:.2} {}", figures.cash_flow, quote);
    text
}

/// Numbers behind a grid report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFigures {
    pub balance: f64,
    pub init_budget: f64,
    pub holdings: Holdings,
    pub cash_flow: f64,
    pub pending: PendingRange,
}

pub fn grid_text(header: &str, symbol: &Symbol, figures: &GridFigures) -> String {
    let quote = &symbol.quote;
    // balance - init_budget is realised plus unrealised profit
    let realised = figures.balance - figures.init_budget + figures.holdings.unrealised_loss;

    let mut text = header.to_string();
    text += &format!("\nBalance: {:.2} {}", figures.balance, quote);
    text += &format!("\n{}", hold_text(symbol, &figures.holdings));
    text += &format!("\nRealised: {:.2} {}", realised, quote);
    text += &format!("\nToday cash flow: {:.2} {}", figures.cash_flow, quote);
    text += &format!("\nMin buy price: {:.2} {}", figures.pending.min_buy, quote);
    text += &format!("\nMax buy price: {:.2} {}", figures.pending.max_buy, quote);
    text += &format!("\nMin sell price: {:.2} {}", figures.pending.min_sell, quote);
    text += &format!("\nMax sell price: {:.2} {}", figures.pending.max_sell, quote);
    text
}

/// Gathers report figures from the exchange and the ledgers
pub struct Reporter<'a> {
    pub exchange: &'a dyn ExchangeGateway,
    pub paths: &'a LedgerPaths,
    pub config: &'a ReportConfig,
    pub symbol: &'a Symbol,
    pub offset: FixedOffset,
}

impl Reporter<'_> {
    pub async fn rebalance_report(&self, header: &str) -> TradingResult<String> {
        let last = self.exchange.fetch_ticker(&self.symbol.to_string()).await?.last;
        let balance = self.exchange.fetch_balance().await?;
        let transactions = OrderLedger::load(&self.paths.transactions)?;
        let today = local_date(Utc::now(), self.offset);

        let figures = RebalanceFigures {
            current_value: current_value(&balance, self.symbol, last),
            balance: balance.total_value(self.symbol, last),
            cash_flow: rebalance_cash_flow(transactions.orders(), today, self.offset),
        };
        Ok(rebalance_text(header, self.symbol, &figures))
    }

    /// Build the grid report and refresh `assets.csv`
    pub async fn grid_report(&self, header: &str) -> TradingResult<String> {
        let (grid, init_budget) = self.config.grid_fields()?;
        let last = self.exchange.fetch_ticker(&self.symbol.to_string()).await?.last;
        let balance = self.exchange.fetch_balance().await?;
        let open_orders = OrderLedger::load(&self.paths.open_orders)?;
        let transactions = OrderLedger::load(&self.paths.transactions)?;
        let today = local_date(Utc::now(), self.offset);

        let holdings = cal_unrealised(last, open_orders.orders());
        AssetsSnapshot::new(last, &holdings).write(&self.paths.assets)?;

        let figures = GridFigures {
            balance: balance.total_value(self.symbol, last),
            init_budget,
            holdings,
            cash_flow: grid_cash_flow(transactions.orders(), grid, today, self.offset),
            pending: pending_order_range(open_orders.orders()),
        };
        Ok(grid_text(header, self.symbol, &figures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderType;
    use chrono::TimeZone;

    fn order(side: OrderSide, amount: f64, price: f64, at: DateTime<Utc>) -> Order {
        let mut order = Order::new(format!("{}{}", side, price), "BTC/USDT", OrderType::Limit, side, amount, price);
        order.timestamp = at;
        order
    }

    #[test]
    fn test_pending_range_defaults_to_zero() {
        let now = Utc::now();
        let orders = vec![
            order(OrderSide::Sell, 0.1, 120.0, now),
            order(OrderSide::Sell, 0.1, 110.0, now),
        ];

        let range = pending_order_range(&orders);
        assert_eq!(range.min_buy, 0.0);
        assert_eq!(range.max_buy, 0.0);
        assert_eq!(range.min_sell, 110.0);
        assert_eq!(range.max_sell, 120.0);
    }

    #[test]
    fn test_today_uses_local_offset() {
        let offset = utc_offset(7).unwrap();
        // 18:00 UTC is already the next day at UTC+7
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let transactions = vec![
            order(OrderSide::Sell, 1.0, 50.0, late),
            order(OrderSide::Buy, 1.0, 30.0, early),
        ];

        let march_2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let march_1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(rebalance_cash_flow(&transactions, march_2, offset), 50.0);
        assert_eq!(rebalance_cash_flow(&transactions, march_1, offset), -30.0);
        assert_eq!(grid_cash_flow(&transactions, 5.0, march_2, offset), 5.0);
        assert_eq!(grid_cash_flow(&transactions, 5.0, march_1, offset), 0.0);
    }

    #[test]
    fn test_hold_text() {
        let symbol = Symbol::parse("BTC/USDT").unwrap();
        let holdings = Holdings {
            amount: 0.5,
            avg_price: 101.0,
            n_open_sell_orders: 2,
            unrealised_loss: 3.5,
        };
        assert_eq!(
            hold_text(&symbol, &holdings),
            "Hold 0.5000 BTC with 2 orders at 101.00 USDT\nUnrealised: 3.50 USDT"
        );
    }

    #[test]
    fn test_rebalance_text_cash_line() {
        let symbol = Symbol::parse("ETH/USDT").unwrap();
        let text = rebalance_text(
            "rebalance",
            &symbol,
            &RebalanceFigures {
                current_value: 1000.0,
                balance: 1800.0,
                cash_flow: -12.5,
            },
        );
        assert!(text.starts_with("rebalance\nCurrent value: 1000.00 USDT"));
        assert!(text.contains("\nCash: 800.00 USDT"));
        assert!(text.ends_with("Today cash flow: -12.50 USDT"));
    }

    #[test]
    fn test_assets_snapshot_overwrites() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("assets.csv");
        let holdings = Holdings {
            amount: 1.0,
            avg_price: 10.0,
            n_open_sell_orders: 1,
            unrealised_loss: 1.0,
        };

        AssetsSnapshot::new(9.0, &holdings).write(&path).unwrap();
        AssetsSnapshot::new(8.0, &holdings).write(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.starts_with("datetime,latest_price,avg_price,amount,unrealised_loss"));
        assert_eq!(AssetsSnapshot::read(&path).unwrap().latest_price, 8.0);
    }
}
