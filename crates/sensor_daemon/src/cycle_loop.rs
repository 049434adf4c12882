use crate::state::{CycleEvent, EventTx, SharedSim, SimState};
use sensor_core::StoreError;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Runs one cycle. Returns the attempt number and its outcome.
///
/// Blocking: the store may be a synchronous HTTP client, so callers on the
/// async runtime go through `spawn_blocking`. The status lock is only taken
/// before and after the cycle, never across store calls.
pub fn step(sim: &SimState) -> (u64, Result<CycleEvent, StoreError>) {
    let cycle = {
        let mut status = sim.status.lock();
        status.cycle += 1;
        status.cycle
    };

    let outcome = {
        let mut engine = sim.engine.lock();
        let engine = &mut *engine;
        sensor_core::run_cycle(&mut engine.store, &mut engine.rng, chrono::Utc::now())
    };

    match outcome {
        Ok(report) => {
            sim.status.lock().last_report = Some(report.clone());
            (cycle, Ok(CycleEvent { cycle, report }))
        }
        Err(err) => (cycle, Err(err)),
    }
}

pub async fn run_cycle_loop(
    sim: SharedSim,
    event_tx: EventTx,
    interval: Duration,
    max_cycles: Option<u64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // First tick completes immediately, so cycle 1 runs at startup.
        ticker.tick().await;

        let shared = sim.clone();
        let (cycle, outcome) = match tokio::task::spawn_blocking(move || step(&shared)).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "cycle task panicked, stopping loop");
                break;
            }
        };

        match outcome {
            Ok(event) => {
                tracing::info!(
                    cycle,
                    readings = event.report.readings.len(),
                    alerts = event.report.alerts_created.len(),
                    "cycle complete"
                );
                // No subscribers is fine.
                let _ = event_tx.send(event);
            }
            Err(err) => tracing::error!(cycle, error = %err, "cycle failed"),
        }

        if max_cycles.is_some_and(|max| cycle >= max) {
            tracing::info!(cycle, "reached max cycles");
            break;
        }
    }
}
