//! PDES executive harness CLI
//!
//! Run the kernel scenarios across an in-process peer mesh.

use clap::Parser;
use pdes_core::ExecutiveConfig;
use pdes_sim::scenarios::ScenarioId;
use pdes_sim::{ScenarioResult, ScenarioRunner, SimError};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// PDES executive simulation harness
#[derive(Parser, Debug)]
#[command(name = "pdes-sim")]
#[command(about = "Run PDES executive scenarios across a peer mesh", long_about = None)]
struct Args {
    /// Master seed for the workloads
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of peers for distributed scenarios
    #[arg(short, long, default_value = "4")]
    peers: usize,

    /// Scenario to run (relay, gvt_sweep, straggler, horizon, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Simulated horizon
    #[arg(short, long, default_value = "100")]
    end_time: f64,

    /// Kernel configuration file (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn load_config(path: Option<&str>) -> Result<ExecutiveConfig, SimError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(ExecutiveConfig::default()),
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e: SimError| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: relay, gvt_sweep, straggler, horizon, all");
            std::process::exit(1);
        })]
    };

    let config = load_config(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if !args.json {
        info!("PDES executive harness v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let runner = ScenarioRunner::new(args.seed, args.peers)
        .with_end_time(args.end_time)
        .with_config(config);

    let mut results: Vec<ScenarioResult> = Vec::new();
    for scenario in scenarios {
        let result = runner.run(scenario);

        if !args.json {
            if result.passed {
                info!(
                    "✓ {} (seed={}) PASSED | events={} violations={} gvt_rounds={} ({}ms)",
                    scenario.name(),
                    result.seed,
                    result.metrics.events,
                    result.metrics.violations,
                    result.metrics.gvt_rounds,
                    result.metrics.wall_ms
                );
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        results.push(result);
    }

    let total = results.len();
    let failed = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to encode summary: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed, total);
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
