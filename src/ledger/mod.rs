//! CSV-backed ledgers
//!
//! Every ledger is read whole, changed in memory and rewritten whole. Rewrites
//! go through a temporary file and a rename so a crash mid-write leaves the
//! previous version in place.

use std::path::PathBuf;

use tracing::info;

use crate::config::LedgerPaths;
use crate::error::TradingResult;

pub mod error_log;
pub mod order_ledger;
pub mod timestamp;

pub use error_log::{ErrorEntry, ErrorLog};
pub use order_ledger::{OpenOrderSlot, OrderLedger, LEDGER_HEADERS};

/// Create every ledger file that does not exist yet. Returns the created paths.
pub fn init_ledgers(paths: &LedgerPaths) -> TradingResult<Vec<PathBuf>> {
    let mut created = Vec::new();

    for path in [&paths.open_orders, &paths.transactions] {
        if OrderLedger::create(path)? {
            created.push(path.clone());
        }
    }

    if ErrorLog::create(&paths.error_log)? {
        created.push(paths.error_log.clone());
    }

    for path in &created {
        info!("📝 Created ledger {}", path.display());
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let paths = LedgerPaths {
            open_orders: dir.path().join("open_orders.csv"),
            transactions: dir.path().join("transactions.csv"),
            error_log: dir.path().join("error_log.csv"),
            assets: dir.path().join("assets.csv"),
        };

        assert_eq!(init_ledgers(&paths).unwrap().len(), 3);
        assert!(init_ledgers(&paths).unwrap().is_empty());

        let header = std::fs::read_to_string(&paths.open_orders).unwrap();
        assert_eq!(header.trim(), LEDGER_HEADERS.join(","));
    }
}
