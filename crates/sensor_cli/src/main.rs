use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sensor_core::{AlertCreated, CycleReport, MetricsFileWriter};
use sensor_world::{open_store, StoreSource};
use std::path::Path;
use tracing_subscriber::EnvFilter;

const DEFAULT_CYCLES: u64 = 1;
const DEFAULT_METRICS_EVERY: u64 = 1;
const DEFAULT_RUNS_DIR: &str = "runs";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "sensor_cli", about = "Sensor fleet telemetry simulator")]
struct Cli {
    /// Defaults to `run` with default options.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate readings for every active sensor and raise alerts.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Number of simulation cycles to run back to back.
    #[arg(long, default_value_t = DEFAULT_CYCLES)]
    cycles: u64,
    /// Seed for the reading generator. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Run offline against this fleet JSON instead of the remote store.
    #[arg(long)]
    fleet: Option<String>,
    /// Write per-cycle metrics CSV under the runs directory.
    #[arg(long)]
    metrics: bool,
    /// Sample metrics every N cycles.
    #[arg(long, default_value_t = DEFAULT_METRICS_EVERY)]
    metrics_every: u64,
    #[arg(long, default_value = DEFAULT_RUNS_DIR)]
    runs_dir: String,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            cycles: DEFAULT_CYCLES,
            seed: None,
            fleet: None,
            metrics: false,
            metrics_every: DEFAULT_METRICS_EVERY,
            runs_dir: DEFAULT_RUNS_DIR.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn open_metrics(args: &RunArgs, seed: u64) -> Result<Option<MetricsFileWriter>> {
    if !args.metrics {
        return Ok(None);
    }
    let run_id = sensor_world::generate_run_id(seed);
    let run_dir = sensor_world::create_run_dir(Path::new(&args.runs_dir), &run_id)?;
    sensor_world::write_run_info(
        &run_dir,
        &run_id,
        seed,
        args.metrics_every,
        serde_json::json!({
            "runner": "sensor_cli",
            "cycles": args.cycles,
            "fleet": args.fleet,
        }),
    )?;
    let writer = MetricsFileWriter::new(run_dir.clone())
        .with_context(|| format!("opening metrics CSV in {}", run_dir.display()))?;
    println!("Run directory: {}", run_dir.display());
    Ok(Some(writer))
}

fn run(args: &RunArgs) -> Result<()> {
    let source = StoreSource::resolve(args.fleet.as_deref())?;
    let mut store = open_store(&source)?;

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut metrics_writer = open_metrics(args, seed)?;
    let metrics_every = args.metrics_every.max(1);

    println!(
        "Starting simulation: cycles={} seed={seed} store={}",
        args.cycles,
        source.describe(),
    );
    println!("{}", "-".repeat(80));

    for cycle in 1..=args.cycles {
        let report = sensor_core::run_cycle(&mut store, &mut rng, chrono::Utc::now())
            .with_context(|| format!("simulation cycle {cycle}"))?;

        // Print notable events before the cycle summary.
        for alert in &report.alerts_created {
            println!("{}", alert_line(cycle, alert));
        }
        for failure in &report.alert_failures {
            println!(
                "!!! alert check failed for sensor {}: {}",
                failure.sensor_id, failure.error
            );
        }
        print_status(cycle, &report);

        if let Some(ref mut writer) = metrics_writer {
            if cycle % metrics_every == 0 {
                let snapshot = sensor_core::compute_metrics(cycle, &report);
                writer.write_row(&snapshot).context("writing metrics row")?;
            }
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Simulation complete.");

    if let Some(ref mut writer) = metrics_writer {
        writer.flush().context("final metrics flush")?;
        println!("Metrics written to {}/ directory.", args.runs_dir);
    }

    Ok(())
}

fn alert_line(cycle: u64, alert: &AlertCreated) -> String {
    format!(
        "*** ALERT CREATED: sensor {} ({}) at cycle={cycle:04} ***",
        alert.sensor_name, alert.sensor_id
    )
}

fn print_status(cycle: u64, report: &CycleReport) {
    let bands = report.band_counts();
    println!(
        "[cycle={cycle:04}]  sensors={sensors:3}  readings={readings:3}  \
         normal={normal:3}  warning={warning:3}  critical={critical:3}  \
         alerts={alerts}  skipped={skipped}",
        sensors = report.sensors_seen(),
        readings = report.readings.len(),
        normal = bands.normal,
        warning = bands.warning,
        critical = bands.critical,
        alerts = report.alerts_created.len(),
        skipped = report.skipped.len(),
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(&args)?,
    }
    Ok(())
}
