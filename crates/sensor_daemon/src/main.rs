mod cycle_loop;
mod routes;
mod state;

use anyhow::{ensure, Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sensor_world::{open_store, StoreSource};
use state::{AppState, SimState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sensor_daemon",
    about = "Runs simulation cycles on an interval and serves them over HTTP"
)]
struct Cli {
    #[arg(long, default_value_t = 3001)]
    port: u16,
    /// Seconds between cycles.
    #[arg(long, default_value_t = 5.0)]
    interval_secs: f64,
    #[arg(long)]
    seed: Option<u64>,
    /// Run offline against this fleet JSON instead of the remote store.
    #[arg(long)]
    fleet: Option<String>,
    /// Stop the cycle loop after this many cycles; the server keeps running.
    #[arg(long)]
    max_cycles: Option<u64>,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let interval = cycle_interval(cli.interval_secs)?;
    let cors_origin: HeaderValue = cli
        .cors_origin
        .parse()
        .with_context(|| format!("invalid --cors-origin: {}", cli.cors_origin))?;

    // The store is opened and finally dropped outside the runtime; a blocking
    // HTTP client must not be created or dropped on an async worker.
    let source = StoreSource::resolve(cli.fleet.as_deref())?;
    let store = open_store(&source)?;
    let seed = cli.seed.unwrap_or_else(rand::random);
    let sim = Arc::new(SimState::new(store, ChaCha8Rng::seed_from_u64(seed), seed));

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let served = runtime.block_on(serve(
        &cli,
        interval,
        sim.clone(),
        seed,
        &source,
        cors_origin,
    ));
    drop(runtime);
    drop(sim);
    served
}

/// `--interval-secs` as a `Duration`: positive, finite and representable.
fn cycle_interval(secs: f64) -> Result<Duration> {
    ensure!(
        secs.is_finite() && secs > 0.0,
        "--interval-secs must be a positive number, got {secs}"
    );
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("--interval-secs {secs} is too large"))
}

async fn serve(
    cli: &Cli,
    interval: Duration,
    sim: state::SharedSim,
    seed: u64,
    source: &StoreSource,
    cors_origin: HeaderValue,
) -> Result<()> {
    let (event_tx, _) = tokio::sync::broadcast::channel(256);
    let app_state = AppState {
        sim: sim.clone(),
        event_tx: event_tx.clone(),
        run_id: uuid::Uuid::new_v4().to_string(),
        interval_secs: cli.interval_secs,
    };

    tracing::info!(
        run_id = %app_state.run_id,
        seed,
        store = %source.describe(),
        "starting sensor daemon"
    );

    tokio::spawn(cycle_loop::run_cycle_loop(sim, event_tx, interval, cli.max_cycles));

    let app = routes::make_router_with_cors(app_state, cors_origin);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}
