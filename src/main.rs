//! # Giro CLI
//!
//! Command-line interface for the giro library.
//! Plans circular training routes and writes them as GPX tracks.

use std::path::{Path, PathBuf};

use clap::Parser;
use giro::{Error, PlanOptions, PlanParams, Result, TrainingLevel, TravelMode};
use log::error;
use serde::Deserialize;

mod cli;

/// Command-line interface for giro
#[derive(Parser)]
#[command(name = "giro")]
#[command(about = "Circular route planner for bike and foot training loops")]
#[command(long_about = "Plans a closed training loop from a start address:
  giro \"Piazza Castello, Torino\" 25          # 25 km bike loop, suggested_route.gpx
  giro \"Alexanderplatz, Berlin\" 8 berlin.gpx --level beginner --mode walk
  giro --params /tmp/request.json             # supervised run, parameters from file

Parameter file schema (JSON):
  {\"address\": \"...\", \"distance\": 25.0, \"level\": \"intermediate\", \"output_file\": \"out.gpx\"}

Exit code is 0 on success and 1 on any failure; a failed run writes no file.")]
#[command(version)]
struct Cli {
    /// Start address, resolved through Nominatim
    address: Option<String>,

    /// Desired round-trip distance in kilometers
    distance_km: Option<f64>,

    /// Output GPX file path
    #[arg(default_value = "")]
    output: String,

    /// Training level: beginner, intermediate, advanced
    #[arg(short, long, default_value = "intermediate")]
    level: String,

    /// Travel mode: bike or walk
    #[arg(short, long, default_value = "bike")]
    mode: String,

    /// Fixed random seed for reproducible planning
    #[arg(long)]
    seed: Option<u64>,

    /// Read parameters from a JSON file instead of arguments
    #[arg(long, value_name = "FILE", conflicts_with_all = ["address", "distance_km"])]
    params: Option<PathBuf>,

    /// Show what would be planned without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Parameter file schema used by supervised runs
#[derive(Debug, Deserialize)]
struct ParamsFile {
    address: String,
    /// Kilometers
    distance: f64,
    level: String,
    output_file: String,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    if cli.verbose {
        eprintln!("🚴 Giro v{} starting...", env!("CARGO_PKG_VERSION"));
    }

    let params = match &cli.params {
        Some(path) => load_params_file(path)?,
        None => params_from_args(&cli)?,
    };

    if cli.dry_run {
        eprintln!(
            "🔍 [DRY RUN] Would plan a {:.1} km {} loop ({}) from '{}' to {}",
            params.desired_distance_km,
            params.mode,
            params.level,
            params.address,
            params.output_file.display()
        );
        return Ok(());
    }

    eprintln!(
        "🗺️  Planning a {:.1} km {} loop from '{}'",
        params.desired_distance_km, params.mode, params.address
    );

    let spinner = cli::create_spinner(format!(
        "Searching for a ~{:.1} km loop...",
        params.desired_distance_km
    ));

    let options = PlanOptions {
        seed: cli.seed,
        ..Default::default()
    };

    match giro::plan_with_options(params.clone(), options).await {
        Ok(summary) => {
            spinner.finish_and_clear();
            eprintln!(
                "✅ Found a {:.2} km loop in {} iteration(s)",
                summary.route.total_length_m / 1000.0,
                summary.attempts.len()
            );
            eprintln!("📁 Saved to: {}", params.output_file.display());
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e)
        }
    }
}

/// Build plan parameters from direct CLI arguments
fn params_from_args(cli: &Cli) -> Result<PlanParams> {
    let (Some(address), Some(distance_km)) = (&cli.address, cli.distance_km) else {
        return Err(Error::InvalidInput(
            "address and distance are required unless --params is given".to_string(),
        ));
    };

    let mode = TravelMode::from_name(&cli.mode)
        .ok_or_else(|| Error::InvalidInput(format!("unknown travel mode '{}'", cli.mode)))?;

    Ok(PlanParams {
        address: address.clone(),
        desired_distance_km: distance_km,
        level: resolve_level(&cli.level),
        mode,
        output_file: resolve_output(&cli.output),
    })
}

/// Load plan parameters from a supervised-run JSON file
fn load_params_file(path: &Path) -> Result<PlanParams> {
    let content = std::fs::read_to_string(path)?;
    let file: ParamsFile = serde_json::from_str(&content).map_err(|e| {
        Error::InvalidInput(format!("invalid parameter file {}: {e}", path.display()))
    })?;

    Ok(PlanParams {
        address: file.address,
        desired_distance_km: file.distance,
        level: resolve_level(&file.level),
        mode: TravelMode::Bike,
        output_file: resolve_output(&file.output_file),
    })
}

/// Resolve a level name, warning about the documented fallback for unknown
/// names and suggesting the closest known one
fn resolve_level(name: &str) -> TrainingLevel {
    if TrainingLevel::from_name(name).is_none() {
        match giro::suggest_level(name) {
            Some(suggestion) => eprintln!(
                "⚠️  Unknown level '{name}' (did you mean '{suggestion}'?), using intermediate"
            ),
            None => eprintln!("⚠️  Unknown level '{name}', using intermediate"),
        }
    }
    TrainingLevel::parse(name)
}

/// Resolve the output path, defaulting when none is given
fn resolve_output(output: &str) -> PathBuf {
    if output.is_empty() {
        PathBuf::from(giro::DEFAULT_OUTPUT_FILE)
    } else {
        PathBuf::from(output)
    }
}
