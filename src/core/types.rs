// Common types used across the bots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{TradingError, TradingResult};

/// Trading pair written as `BASE/QUOTE`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub base: String,
    pub quote: String,
}

impl Symbol {
    pub fn parse(symbol: &str) -> TradingResult<Self> {
        match symbol.split_once('/') {
            Some((base, quote))
                if !base.is_empty() && !quote.is_empty() && !quote.contains('/') =>
            {
                Ok(Self {
                    base: base.trim().to_uppercase(),
                    quote: quote.trim().to_uppercase(),
                })
            }
            _ => Err(TradingError::InvalidSymbol(symbol.to_string())),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
}

/// Order as the exchange reports it
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOrder {
    pub id: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub amount: f64,
    pub filled: f64,
    pub price: f64,
}

/// Which amount of an exchange order goes into a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountKey {
    Requested,
    Filled,
}

/// One ledger row. `value` is always `amount * price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(with = "crate::ledger::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub order_id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    pub price: f64,
    pub value: f64,
}

impl Order {
    pub fn new(
        order_id: impl Into<String>,
        symbol: impl Into<String>,
        order_type: OrderType,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            order_id: order_id.into(),
            symbol: symbol.into(),
            order_type,
            side,
            amount,
            price,
            value: amount * price,
        }
    }

    pub fn from_exchange(order: &ExchangeOrder, symbol: &Symbol, key: AmountKey) -> Self {
        let amount = match key {
            AmountKey::Requested => order.amount,
            AmountKey::Filled => order.filled,
        };
        Self::new(
            order.id.clone(),
            symbol.to_string(),
            order.order_type,
            order.side,
            amount,
            order.price,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    pub last: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidAsk {
    pub bid: f64,
    pub ask: f64,
}

/// Account totals per currency. Absent currencies are a zero balance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balance {
    totals: HashMap<String, f64>,
}

impl Balance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total(mut self, currency: &str, total: f64) -> Self {
        self.add(currency, total);
        self
    }

    pub fn add(&mut self, currency: &str, amount: f64) {
        *self.totals.entry(currency.to_uppercase()).or_insert(0.0) += amount;
    }

    pub fn total(&self, currency: &str) -> f64 {
        self.totals.get(&currency.to_uppercase()).copied().unwrap_or(0.0)
    }

    /// Value of the base holding in quote units
    pub fn base_value(&self, symbol: &Symbol, last_price: f64) -> f64 {
        self.total(&symbol.base) * last_price
    }

    /// Base holding at `last_price` plus the quote cash
    pub fn total_value(&self, symbol: &Symbol, last_price: f64) -> f64 {
        self.base_value(symbol, last_price) + self.total(&symbol.quote)
    }
}
