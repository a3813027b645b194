// Limit order submission shared by the rebalance and grid engines

use tracing::{error, info};

use crate::clients::ExchangeGateway;
use crate::core::types::{ExchangeOrder, OrderSide, OrderType, Symbol};
use crate::error::TradingResult;
use crate::ledger::ErrorLog;

/// Submit a limit order. A rejection for lack of funds is written to the
/// error log before the error is handed back.
pub async fn place_limit_order(
    exchange: &dyn ExchangeGateway,
    error_log: &ErrorLog,
    symbol: &Symbol,
    side: OrderSide,
    amount: f64,
    price: f64,
) -> TradingResult<ExchangeOrder> {
    match exchange
        .create_order(&symbol.to_string(), OrderType::Limit, side, amount, price)
        .await
    {
        Ok(order) => {
            info!(
                "📝 Open {} {:.3} {} at {:.2} {} (ID: {})",
                side, amount, symbol.base, price, symbol.quote, order.id
            );
            Ok(order)
        }
        Err(e) => {
            if let Some(tag) = e.log_tag() {
                error_log.append(tag)?;
            }
            error!(
                "❌ Cannot {} {:.3} {} at {:.2} {}: {}",
                side, amount, symbol.base, price, symbol.quote, e
            );
            Err(e)
        }
    }
}
