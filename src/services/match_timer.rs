//! Periodic clock for active matches.
//!
//! One task owns the cadence; each tick runs under the mutation gate so it never
//! interleaves with a referee command. Writes for different matches run concurrently and
//! fail independently: a match whose write failed keeps its committed value and is
//! retried on the next tick.

use std::time::SystemTime;

use futures::future::join_all;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    dao::storage::with_deadline,
    services::broadcast_service,
    state::{SharedState, matches::Match},
};

/// Running timer task and the switch that stops it.
pub struct TimerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Counters describing one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Matches whose new clock value was committed.
    pub committed: usize,
    /// Matches whose write failed or timed out.
    pub failed: usize,
}

/// Start the timer loop. Returns `false` when it was already running.
pub async fn start(state: &SharedState) -> bool {
    let mut slot = state.timer().lock().await;
    if slot.as_ref().is_some_and(|handle| !handle.task.is_finished()) {
        return false;
    }

    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(state.clone(), shutdown_rx));
    *slot = Some(TimerHandle { shutdown, task });
    info!(
        interval_ms = state.config().tick_interval().as_millis(),
        "match timer started"
    );
    true
}

/// Stop the timer loop and wait for the current tick to finish. Returns `false` when it
/// was not running.
pub async fn stop(state: &SharedState) -> bool {
    let handle = state.timer().lock().await.take();
    let Some(handle) = handle else {
        return false;
    };

    let _ = handle.shutdown.send(true);
    if let Err(err) = handle.task.await {
        warn!(error = %err, "match timer task ended abnormally");
    }
    info!("match timer stopped");
    true
}

/// Whether the loop is currently running.
pub async fn is_running(state: &SharedState) -> bool {
    state
        .timer()
        .lock()
        .await
        .as_ref()
        .is_some_and(|handle| !handle.task.is_finished())
}

async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(state.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let report = tick_once(&state).await;
                if report.failed > 0 {
                    warn!(
                        committed = report.committed,
                        failed = report.failed,
                        "timer tick partially persisted"
                    );
                }
            }
        }
    }
}

/// Advance every active match by one second, persist, commit and broadcast once.
pub async fn tick_once(state: &SharedState) -> TickReport {
    let gate = state.lock_mutations().await;

    let now = SystemTime::now();
    let ticked: Vec<Match> = state
        .read_matches(|table| {
            table
                .values()
                .filter(|record| record.is_active)
                .cloned()
                .filter_map(|mut record| record.tick(now).then_some(record))
                .collect()
        })
        .await;

    if ticked.is_empty() {
        return TickReport::default();
    }

    let store = match state.require_match_store().await {
        Ok(store) => store,
        Err(err) => {
            debug!(error = %err, "skipping timer tick without storage");
            return TickReport {
                committed: 0,
                failed: ticked.len(),
            };
        }
    };

    let limit = state.config().persist_timeout();
    let writes = ticked.into_iter().map(|record| {
        let store = store.clone();
        async move {
            let result =
                with_deadline("save_match", limit, store.save_match(record.clone().into())).await;
            (record, result)
        }
    });

    let mut report = TickReport::default();
    let mut committed = Vec::new();
    for (record, result) in join_all(writes).await {
        match result {
            Ok(()) => committed.push(record),
            Err(err) => {
                warn!(match_id = %record.id, error = %err, "failed to persist timer tick");
                report.failed += 1;
            }
        }
    }

    report.committed = committed.len();
    if !committed.is_empty() {
        state.commit_matches(committed).await;
    }
    drop(gate);

    if report.committed > 0 {
        broadcast_service::broadcast_all_matches(state).await;
    }
    report
}
