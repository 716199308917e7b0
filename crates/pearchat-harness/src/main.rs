//! Pearchat session simulator.
//!
//! Runs seeded random scripts against the connection manager and a
//! simulated gateway, checking session invariants after every step.
//!
//! # Usage
//!
//! ```bash
//! # One run of 200 steps from seed 0
//! pearchat-sim
//!
//! # Sweep 1000 seeds, dumping the final view of each
//! pearchat-sim --seed 42 --runs 1000 --dump-view --log-level debug
//! ```

use clap::Parser;
use pearchat_harness::{Session, generate};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Pearchat session simulator
#[derive(Parser, Debug)]
#[command(name = "pearchat-sim")]
#[command(about = "Seeded session simulation with invariant checking")]
#[command(version)]
struct Args {
    /// First seed
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Number of consecutive seeds to run
    #[arg(short, long, default_value = "1")]
    runs: u64,

    /// Steps per run
    #[arg(long, default_value = "200")]
    steps: usize,

    /// Log the final view of each run as JSON
    #[arg(long)]
    dump_view: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(seed = args.seed, runs = args.runs, steps = args.steps, "Simulation starting");

    for seed in args.seed..args.seed.saturating_add(args.runs) {
        let script = generate(seed, args.steps);
        let mut session = Session::new(seed);

        let view = match session.run(&script).await {
            Ok(view) => view,
            Err(failure) => {
                tracing::error!(seed, "{failure}");
                return Err(failure.into());
            },
        };

        tracing::info!(
            seed,
            steps = script.len(),
            messages = view.messages.len(),
            calls = session.gateway().calls().len(),
            "Run passed"
        );
        if args.dump_view {
            let json = serde_json::to_string(&view)?;
            tracing::info!(seed, view = %json, "Final view");
        }
    }

    tracing::info!("All runs passed");
    Ok(())
}
