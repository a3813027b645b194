// Unrealised P&L of the inventory parked in open sell orders

use serde::Serialize;

use crate::core::types::{Order, OrderSide};

/// Inventory held by the grid and its mark-to-market result
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Holdings {
    pub amount: f64,
    /// Amount-weighted mean of the open sell prices, 0 without sells
    pub avg_price: f64,
    pub n_open_sell_orders: usize,
    /// Positive is a loss, negative a gain
    pub unrealised_loss: f64,
}

pub fn cal_unrealised(price: f64, open_orders: &[Order]) -> Holdings {
    let (amount, notional, count) = open_orders
        .iter()
        .filter(|o| o.side == OrderSide::Sell)
        .fold((0.0, 0.0, 0usize), |(amount, notional, count), o| {
            (amount + o.amount, notional + o.amount * o.price, count + 1)
        });

    if count == 0 || amount <= 0.0 {
        return Holdings {
            n_open_sell_orders: count,
            ..Holdings::default()
        };
    }

    let avg_price = notional / amount;
    Holdings {
        amount,
        avg_price,
        n_open_sell_orders: count,
        unrealised_loss: (avg_price - price) * amount,
    }
}
