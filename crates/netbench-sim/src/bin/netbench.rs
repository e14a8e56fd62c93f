//! # netbench
//!
//! Runs one scenario and prints its report as JSON on stdout.
//!
//! ```bash
//! # Built-in two-node scenario
//! netbench
//!
//! # Scenario file, overriding the seed
//! netbench --config scenarios/three_hop_lossy.toml --seed 9 --pretty
//!
//! # More detail
//! RUST_LOG=netbench_stack=debug netbench --config scenarios/lan_contention.toml
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use netbench_sim::ScenarioConfig;

/// Protocol stack simulation runner.
#[derive(Parser, Debug)]
#[command(name = "netbench", about = "Run a netbench scenario and print its report")]
struct Cli {
    /// Scenario TOML file. Without one the built-in two-node scenario runs.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the scenario seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the simulated time budget, in ticks (microseconds).
    #[arg(long)]
    max_time: Option<u64>,

    /// Pretty-print the JSON report.
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ── Scenario ────────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ScenarioConfig::from_toml_str(&text)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => ScenarioConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(max_time) = cli.max_time {
        config.max_time = max_time;
    }

    // ── Run ─────────────────────────────────────────────────────
    let report = netbench_sim::run(&config).context("scenario failed")?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    if !report.completed || !report.byte_exact {
        anyhow::bail!(
            "transfer incomplete: {} of {} bytes delivered",
            report.bytes_delivered,
            report.bytes_requested
        );
    }
    Ok(())
}
