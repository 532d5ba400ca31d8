//! Headless SAR mission simulation.
//!
//! Runs the seeded mission on a virtual clock and prints an end-of-run
//! report. Operator commands given as flags are applied before the clock
//! starts.
//!
//! Usage:
//!   cargo run -p sar-cli --bin sar-sim -- --seed 7 --duration-secs 120 --assign V-001=RT-Charlie

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use sar_cli::Headless;
use sar_core::SimulationConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Headless SAR mission simulation
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// RNG seed; omit for a random run
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated duration in seconds
    #[arg(long, default_value_t = 60)]
    duration_secs: u64,

    /// Virtual clock resolution in milliseconds
    #[arg(long, default_value_t = 100)]
    step_ms: u64,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Deploy a grounded drone before starting (repeatable)
    #[arg(long = "deploy", value_name = "DRONE")]
    deploy: Vec<String>,

    /// Send a team to a victim before starting, as VICTIM=TEAM (repeatable)
    #[arg(long = "assign", value_name = "VICTIM=TEAM", value_parser = parse_assignment)]
    assign: Vec<(String, String)>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (victim, team) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected VICTIM=TEAM, got '{raw}'"))?;
    let (victim, team) = (victim.trim(), team.trim());
    if victim.is_empty() || team.is_empty() {
        return Err(format!("expected VICTIM=TEAM, got '{raw}'"));
    }
    Ok((victim.to_string(), team.to_string()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so the report can be piped.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("sar_cli=info".parse()?),
        )
        .init();

    let config = SimulationConfig {
        seed: args.seed,
        ..SimulationConfig::default()
    };
    let mut run = Headless::new(config, Utc::now());

    for drone_id in &args.deploy {
        let now = run.now();
        match run.mission_mut().deploy_drone(drone_id, now) {
            Ok(outcome) => tracing::info!(%drone_id, ?outcome, "Deploy"),
            Err(err) => tracing::warn!(%err, "Deploy rejected"),
        }
    }
    for (victim_id, team_id) in &args.assign {
        let now = run.now();
        match run.mission_mut().assign_team(victim_id, team_id, now) {
            Ok(outcome) => tracing::info!(%victim_id, %team_id, ?outcome, "Assign"),
            Err(err) => tracing::warn!(%err, "Assignment rejected"),
        }
    }

    let duration_ms = args.duration_secs.saturating_mul(1000);
    tracing::info!(duration_ms, step_ms = args.step_ms, seed = ?args.seed, "Running simulation");
    let ticks = run.advance(duration_ms, args.step_ms);
    tracing::info!(ticks, faults = run.faults().len(), "Simulation finished");

    let report = run.report(args.seed);
    match args.format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => {
            let json = report.to_json().context("serialize report")?;
            println!("{json}");
        }
    }
    Ok(())
}
