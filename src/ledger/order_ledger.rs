//! Order ledgers: open orders and transactions
//!
//! `OrderLedger` is an insertion-ordered map from order id to [`Order`].
//! `OpenOrderSlot` wraps one for the rebalance bot, which may have at most
//! one order in flight.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::types::{Order, OrderSide};
use crate::error::{TradingError, TradingResult};

pub const LEDGER_HEADERS: [&str; 8] = [
    "timestamp", "order_id", "symbol", "type", "side", "amount", "price", "value",
];

#[derive(Debug, Clone)]
pub struct OrderLedger {
    path: PathBuf,
    orders: Vec<Order>,
}

impl OrderLedger {
    /// Write an empty ledger with headers. Returns false if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> TradingResult<bool> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(false);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| TradingError::FileWrite(format!("{}: {}", parent.display(), e)))?;
        }

        Self::empty(path).save()?;
        Ok(true)
    }

    /// Ledger with no rows that will be saved to `path`
    pub fn empty<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            orders: Vec::new(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> TradingResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TradingError::LedgerRead(format!(
                "{} does not exist (run: tick-bot init)",
                path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| TradingError::LedgerRead(format!("{}: {}", path.display(), e)))?;

        let mut ledger = Self::empty(path);
        for (row, record) in reader.deserialize::<Order>().enumerate() {
            let order = record.map_err(|e| {
                TradingError::LedgerRead(format!("{} row {}: {}", path.display(), row + 1, e))
            })?;
            ledger.append(order)?;
        }

        debug!("Loaded {} orders from {}", ledger.len(), path.display());
        Ok(ledger)
    }

    /// Rewrite the whole file
    pub fn save(&self) -> TradingResult<()> {
        let tmp_path = self.path.with_extension("csv.tmp");
        let write_err = |e: &dyn std::fmt::Display| {
            TradingError::LedgerWrite(format!("{}: {}", self.path.display(), e))
        };

        {
            let file = File::create(&tmp_path).map_err(|e| write_err(&e))?;
            let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
            writer.write_record(LEDGER_HEADERS).map_err(|e| write_err(&e))?;
            for order in &self.orders {
                writer.serialize(order).map_err(|e| write_err(&e))?;
            }
            writer.flush().map_err(|e| write_err(&e))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| write_err(&e))?;
        debug!("Saved {} orders to {}", self.orders.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.get(order_id).is_some()
    }

    /// Add an order. Ids are unique within a ledger.
    pub fn append(&mut self, order: Order) -> TradingResult<()> {
        if self.contains(&order.order_id) {
            return Err(TradingError::DuplicateOrder(order.order_id));
        }
        self.orders.push(order);
        Ok(())
    }

    /// Add an order unless its id is already recorded. Returns whether it was added.
    pub fn append_if_absent(&mut self, order: Order) -> bool {
        if self.contains(&order.order_id) {
            warn!("Order {} already in {}, not recording twice", order.order_id, self.path.display());
            return false;
        }
        self.orders.push(order);
        true
    }

    pub fn remove(&mut self, order_id: &str) -> Option<Order> {
        let index = self.orders.iter().position(|o| o.order_id == order_id)?;
        Some(self.orders.remove(index))
    }

    pub fn side(&self, side: OrderSide) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(move |o| o.side == side)
    }
}

/// Open-orders ledger that can hold at most one order
#[derive(Debug, Clone)]
pub struct OpenOrderSlot {
    ledger: OrderLedger,
}

impl OpenOrderSlot {
    pub fn load<P: AsRef<Path>>(path: P) -> TradingResult<Self> {
        Self::from_ledger(OrderLedger::load(path)?)
    }

    pub fn from_ledger(ledger: OrderLedger) -> TradingResult<Self> {
        if ledger.len() > 1 {
            return Err(TradingError::LedgerInvariant(format!(
                "{} holds {} open orders, at most one is allowed",
                ledger.path().display(),
                ledger.len()
            )));
        }
        Ok(Self { ledger })
    }

    pub fn current(&self) -> Option<&Order> {
        self.ledger.orders().first()
    }

    pub fn is_occupied(&self) -> bool {
        !self.ledger.is_empty()
    }

    pub fn place(&mut self, order: Order) -> TradingResult<()> {
        if let Some(existing) = self.current() {
            return Err(TradingError::LedgerInvariant(format!(
                "cannot record order {} while {} is still open",
                order.order_id, existing.order_id
            )));
        }
        self.ledger.append(order)
    }

    pub fn clear(&mut self) -> Option<Order> {
        let id = self.current()?.order_id.clone();
        self.ledger.remove(&id)
    }

    pub fn save(&self) -> TradingResult<()> {
        self.ledger.save()
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }
}
