// Core trading logic modules

pub mod grid;
pub mod placement;
pub mod rebalance;
pub mod reconcile;
pub mod types;
pub mod unrealised;

// Re-export commonly used types
pub use grid::{BuyDecision, GridEngine};
pub use rebalance::{decide_rebalance, rebalance_port, RebalanceOrder};
pub use reconcile::{check_open_orders, reconcile_grid_orders, ReconcileContext, TickFlow};
pub use types::{Balance, BidAsk, ExchangeOrder, Order, OrderSide, OrderStatus, OrderType, Symbol, Ticker};
pub use unrealised::{cal_unrealised, Holdings};
