//! Agora Simulator CLI
//!
//! Runs deterministic scenarios against the in-memory world, or a live
//! simulation against HTTP services described by a configuration file.

use agora_core::{Action, SimulationConfig, SimulationOrchestrator};
use agora_env::{HttpBackend, HttpOracle, Services};
use agora_sim::scenarios::ScenarioId;
use agora_sim::{RunExport, ScenarioResult, ScenarioRunner};
use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Agora persona simulation CLI
#[derive(Parser, Debug)]
#[command(name = "agora-sim")]
#[command(about = "Run persona social-network simulations", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time); scenarios default
    /// to 42, live runs keep the configuration's seed unless given
    #[arg(short, long)]
    seed: Option<u64>,

    /// Initial population size
    #[arg(short, long, default_value = "10")]
    agents: usize,

    /// Scenario to run (baseline, churn_storm, opinion_oracle, pages, clock_race, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Simulated days per scenario
    #[arg(short, long, default_value = "2")]
    days: u32,

    /// Slots per simulated day
    #[arg(long, default_value = "6")]
    slots: u32,

    /// Run against live services described by this JSON configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Write the JSON export to this file
    #[arg(long)]
    export: Option<String>,
}

const DEFAULT_SEED: u64 = 42;

/// Seed 0 draws a seed from the wall clock.
fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(DEFAULT_SEED)
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")
}

/// Loads a live configuration; `seed` replaces its seed only when given.
fn load_live_config(path: &str, seed: Option<u64>) -> anyhow::Result<SimulationConfig> {
    let mut config = SimulationConfig::load(path).with_context(|| format!("loading {}", path))?;
    if let Some(seed) = seed {
        config.simulation.seed = seed;
    }
    Ok(config)
}

/// Runs one simulation against the configured HTTP services.
async fn run_live(path: &str, seed: Option<u64>) -> anyhow::Result<RunExport> {
    let config = load_live_config(path, seed)?;

    let servers = &config.servers;
    let timeout = Duration::from_secs(servers.timeout_secs);
    let backend = HttpBackend::shared(servers.api.clone(), timeout)?;
    let mut oracle = HttpOracle::new(servers.llm.clone(), servers.llm_model.clone(), timeout)?;
    if let Some(key) = &servers.llm_api_key {
        oracle = oracle.with_api_key(key.clone());
    }
    if let Some(temperature) = servers.llm_temperature {
        oracle = oracle.with_temperature(temperature);
    }
    if let Some(max_tokens) = servers.llm_max_tokens {
        oracle = oracle.with_max_tokens(max_tokens);
    }
    let services = Services::from_backend(backend, Arc::new(oracle));

    info!("Live run '{}' against {}", config.simulation.name, config.servers.api);
    let mut orchestrator = SimulationOrchestrator::build(config, services).await?;
    let report = orchestrator.run().await?;

    info!(
        "✓ {} days, {} posts, {} comments, final population {}",
        report.days.len(),
        report.performed(Action::Post),
        report.performed(Action::Comment),
        report.final_population
    );
    Ok(RunExport::from_live(report))
}

async fn run_scenarios(args: &Args, base_seed: u64) -> anyhow::Result<RunExport> {
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => bail!("{}. Available scenarios: baseline, churn_storm, opinion_oracle, pages, clock_race, all", e),
        }
    };

    let runner = ScenarioRunner::new(base_seed, args.agents)
        .with_days(args.days)
        .with_slots(args.slots);

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in scenarios {
        info!("{}: {}", scenario.name(), scenario.description());
        let result = runner.run(scenario).await;
        if result.passed {
            info!("✓ {} (seed={}) PASSED", scenario.name(), base_seed);
        } else {
            error!(
                "✗ {} (seed={}) FAILED: {}",
                scenario.name(),
                base_seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
        results.push(result);
    }
    Ok(RunExport::from_scenarios(base_seed, results))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    if !args.json {
        info!("Agora Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let seed = args.seed.map(resolve_seed);
    let export = match &args.config {
        Some(path) => run_live(path, seed).await?,
        None => run_scenarios(&args, seed.unwrap_or(DEFAULT_SEED)).await?,
    };

    if let Some(path) = &args.export {
        export
            .write_to_file(path)
            .with_context(|| format!("writing export to {}", path))?;
        info!("Exported results to {}", path);
    }

    if args.json {
        println!("{}", export.to_json()?);
    } else if export.failed == 0 {
        info!("✅ All {} runs passed!", export.total);
    } else {
        error!("❌ {}/{} runs failed!", export.failed, export.total);
    }

    // Exit with proper code for CI
    if export.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
