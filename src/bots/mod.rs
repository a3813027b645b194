//! Bot runners
//!
//! A bot is one `tick()`: read the ledgers, reconcile with the exchange, then
//! place whatever the strategy wants. [`run_loop`] repeats ticks with the
//! pauses from the system config.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::SystemConfig;
use crate::error::TradingResult;

pub mod grid;
pub mod rebalance;

pub use grid::GridBot;
pub use rebalance::RebalanceBot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    /// Reconciliation could not settle an order; the rest of the tick was skipped
    Skipped,
}

#[async_trait]
pub trait Bot: Send + Sync {
    fn name(&self) -> &str;

    async fn tick(&self) -> TradingResult<TickOutcome>;
}

pub(crate) fn seconds(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// Tick until `loop_flag` is off, `max_ticks` is reached or a fatal error occurs.
/// Returns the number of ticks run.
pub async fn run_loop(bot: &dyn Bot, system: &SystemConfig, max_ticks: Option<u64>) -> TradingResult<u64> {
    let idle_loop = seconds(system.idle_loop);
    let mut ticks = 0u64;

    info!("🚀 Starting {} (loop: {}, idle {:.1}s)", bot.name(), system.loop_flag, system.idle_loop);

    loop {
        ticks += 1;
        match bot.tick().await {
            Ok(TickOutcome::Completed) => info!("✅ Tick {} completed", ticks),
            Ok(TickOutcome::Skipped) => info!("⏭️  Tick {} skipped, retrying next loop", ticks),
            Err(e) if e.is_fatal() => {
                error!("❌ {} stopped on tick {} [{}]: {}", bot.name(), ticks, e.category(), e);
                return Err(e);
            }
            Err(e) => warn!("⚠️  Tick {} failed [{}]: {}", ticks, e.category(), e),
        }

        if !system.loop_flag || max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        sleep(idle_loop).await;
    }

    info!("🛑 {} finished after {} ticks", bot.name(), ticks);
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TradingError;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ScriptedBot {
        calls: AtomicU64,
        fail_on: u64,
        fatal: bool,
    }

    #[async_trait]
    impl Bot for ScriptedBot {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn tick(&self) -> TradingResult<TickOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(if self.fatal {
                    TradingError::InsufficientFunds("no cash".to_string())
                } else {
                    TradingError::ApiTimeout("slow".to_string())
                });
            }
            Ok(TickOutcome::Completed)
        }
    }

    fn system(loop_flag: bool) -> SystemConfig {
        SystemConfig {
            loop_flag,
            idle_stage: 0.0,
            idle_loop: 0.0,
            keys_path: "keys.json".to_string(),
            data_dir: ".".to_string(),
            utc_offset_hours: 7,
            bot_name: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_single_tick_without_loop_flag() {
        let bot = ScriptedBot { calls: AtomicU64::new(0), fail_on: 0, fatal: false };
        assert_eq!(run_loop(&bot, &system(false), None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transient_error_keeps_looping() {
        let bot = ScriptedBot { calls: AtomicU64::new(0), fail_on: 2, fatal: false };
        assert_eq!(run_loop(&bot, &system(true), Some(4)).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_loop() {
        let bot = ScriptedBot { calls: AtomicU64::new(0), fail_on: 2, fatal: true };
        let err = run_loop(&bot, &system(true), Some(10)).await.unwrap_err();
        assert!(matches!(err, TradingError::InsufficientFunds(_)));
        assert_eq!(bot.calls.load(Ordering::SeqCst), 2);
    }
}
