//! Strategy lab - main entry point
//!
//! This binary provides six subcommands:
//! - backtest: Run strategy backtests
//! - optimize: Grid-search strategy parameters
//! - walk-forward: Walk-forward analysis
//! - monte-carlo: Monte Carlo trade resampling
//! - risk: Risk metrics for a strategy run
//! - download: Download historical daily bars

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "strategy-lab")]
#[command(about = "Backtesting, optimization, and validation for technical trading strategies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run strategy backtests
    Backtest {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Strategy to run (all six when omitted)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Symbol to backtest
        #[arg(long, default_value = "BTC-USD")]
        symbol: String,

        /// Comma-separated symbols for a multi-asset run (requires --strategy)
        #[arg(long)]
        symbols: Option<String>,

        /// Initial capital
        #[arg(long)]
        capital: Option<f64>,
    },

    /// Grid-search strategy parameters with an in-sample/out-of-sample split
    Optimize {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Strategy to optimize
        #[arg(short, long)]
        strategy: String,

        /// Symbol to optimize on
        #[arg(long, default_value = "BTC-USD")]
        symbol: String,

        /// In-sample share of the series, in (0, 1]
        #[arg(long)]
        split: Option<f64>,

        /// Number of top results to show
        #[arg(short, long)]
        top: Option<usize>,
    },

    /// Walk-forward analysis: optimize on each training window, verify on
    /// the next unseen window
    WalkForward {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Strategy to analyze
        #[arg(short, long)]
        strategy: String,

        /// Symbol to analyze
        #[arg(long, default_value = "BTC-USD")]
        symbol: String,

        /// Window scheme (sequential, rolling, or expanding)
        #[arg(short, long, default_value = "rolling")]
        mode: String,

        /// Number of segments (sequential mode)
        #[arg(long, default_value = "5")]
        n_splits: usize,

        /// Training share per segment (sequential mode)
        #[arg(long, default_value = "0.7")]
        train_pct: f64,

        /// Training window size in bars (rolling mode)
        #[arg(long, default_value = "200")]
        train_bars: usize,

        /// Test window size / slide in bars (rolling and expanding modes)
        #[arg(long, default_value = "100")]
        step: usize,
    },

    /// Monte Carlo resampling of a strategy's trade ledger
    MonteCarlo {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Strategy to simulate
        #[arg(short, long)]
        strategy: String,

        /// Symbol to simulate on
        #[arg(long, default_value = "BTC-USD")]
        symbol: String,

        /// Number of simulations
        #[arg(long)]
        simulations: Option<usize>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Risk metrics for a strategy run
    Risk {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/default.json")]
        config: String,

        /// Strategy to profile
        #[arg(short, long)]
        strategy: String,

        /// Symbol to profile on
        #[arg(long, default_value = "BTC-USD")]
        symbol: String,
    },

    /// Download historical daily bars
    Download {
        /// Symbols to download (comma-separated)
        #[arg(short, long, default_value = "BTC-USD,ETH-USD,SPY,QQQ,GLD")]
        symbols: String,

        /// History range (e.g. "1y", "5y", "max")
        #[arg(short, long, default_value = "5y")]
        range: String,

        /// Output directory
        #[arg(short, long, default_value = "data")]
        output: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Keep the console clean for the progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Backtest { .. } => ("backtest", false),
        Commands::Optimize { .. } => ("optimize", true),
        Commands::WalkForward { .. } => ("walkforward", true),
        Commands::MonteCarlo { .. } => ("montecarlo", false),
        Commands::Risk { .. } => ("risk", false),
        Commands::Download { .. } => ("download", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            config,
            strategy,
            symbol,
            symbols,
            capital,
        } => commands::backtest::run(config, strategy, symbol, symbols, capital),

        Commands::Optimize {
            config,
            strategy,
            symbol,
            split,
            top,
        } => commands::optimize::run(config, strategy, symbol, split, top),

        Commands::WalkForward {
            config,
            strategy,
            symbol,
            mode,
            n_splits,
            train_pct,
            train_bars,
            step,
        } => commands::walkforward::run(
            config, strategy, symbol, mode, n_splits, train_pct, train_bars, step,
        ),

        Commands::MonteCarlo {
            config,
            strategy,
            symbol,
            simulations,
            seed,
        } => commands::montecarlo::run(config, strategy, symbol, simulations, seed),

        Commands::Risk {
            config,
            strategy,
            symbol,
        } => commands::risk::run(config, strategy, symbol),

        Commands::Download {
            symbols,
            range,
            output,
        } => commands::download::run(symbols, range, output),
    }
}
