// Tick Bots - CLI
// Single entry point for the grid bot, the rebalance bot and their reports

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tick_bots::TradingError;

// Load command modules from cli directory
#[path = "../cli/bot_commands.rs"]
mod bot_commands;
#[path = "../cli/report_commands.rs"]
mod report_commands;

use bot_commands::BotKind;

#[derive(Parser)]
#[command(name = "tick-bot")]
#[command(version = "0.3.0")]
#[command(about = "Grid and rebalance trading bots", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// System configuration file (loop timing, keys path, ledger directory)
    #[arg(short, long, global = true, default_value = "config_system.json")]
    system_config: String,

    /// Strategy parameters file
    #[arg(short, long, global = true, default_value = "config_params.json")]
    params_config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create example configs and empty ledgers
    Init {
        /// Bot the example params are written for
        #[arg(short, long, value_enum, default_value = "grid")]
        bot: BotKind,

        /// Only create ledgers, no example config files
        #[arg(long)]
        no_examples: bool,
    },

    /// Run the grid bot
    Grid {
        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Run the rebalance bot
    Rebalance {
        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Build a status report and push it to the chat channel
    Report {
        /// Bot the report describes
        #[arg(value_enum)]
        bot: BotKind,

        /// Print only, do not push
        #[arg(long)]
        no_push: bool,
    },

    /// Show ledger status without calling the exchange
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging first (before config load so we can see config errors)
    let log_level = if cli.verbose { "debug" } else { "info" };
    std::env::set_var("RUST_LOG", log_level);
    tracing_subscriber::fmt::init();

    info!("🚀 Tick Bots v0.3.0");
    info!("📁 Config: {} + {}", cli.system_config, cli.params_config);

    let result = match cli.command {
        Commands::Init { bot, no_examples } => {
            bot_commands::init_workspace(&cli.system_config, &cli.params_config, bot, no_examples).await
        }
        Commands::Grid { ticks } => {
            bot_commands::run_grid(&cli.system_config, &cli.params_config, ticks).await
        }
        Commands::Rebalance { ticks } => {
            bot_commands::run_rebalance(&cli.system_config, &cli.params_config, ticks).await
        }
        Commands::Report { bot, no_push } => {
            report_commands::send_report(&cli.system_config, &cli.params_config, bot, !no_push)
                .await
                .map(|text| println!("{}", text))
        }
        Commands::Status => report_commands::show_status(&cli.system_config).await,
    };

    if let Err(e) = result {
        exit_with(e);
    }
    Ok(())
}

/// Print a helpful message and exit with status 1
fn exit_with(e: TradingError) -> ! {
    error!("❌ {} error", e.category());
    for line in e.user_message().lines() {
        error!("{}", line);
    }
    std::process::exit(1);
}
