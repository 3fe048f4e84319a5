use ridepool_core::{Clock, CoreResult, UnitOfWorkFactory};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Trips moved by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub started: u64,
    pub completed: u64,
}

/// One pass of the time-driven trip lifecycle:
/// published → in_progress once started, in_progress → completed once over.
pub struct TripStatusSweep {
    uow: Arc<dyn UnitOfWorkFactory>,
    clock: Arc<dyn Clock>,
}

impl TripStatusSweep {
    pub fn new(uow: Arc<dyn UnitOfWorkFactory>, clock: Arc<dyn Clock>) -> Self {
        Self { uow, clock }
    }

    /// Both transitions are committed separately, in order, so a trip whose
    /// whole window has already passed goes straight to completed.
    pub async fn run_once(&self) -> CoreResult<SweepReport> {
        let now = self.clock.now();

        let mut uow = self.uow.begin().await?;
        let started = uow.start_due_trips(now).await?;
        uow.commit().await?;

        let mut uow = self.uow.begin().await?;
        let completed = uow.complete_finished_trips(now).await?;
        uow.commit().await?;

        Ok(SweepReport { started, completed })
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs `TripStatusSweep` on a fixed period in a background task
pub struct TripStatusScheduler {
    sweep: Arc<TripStatusSweep>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl TripStatusScheduler {
    pub fn new(sweep: Arc<TripStatusSweep>, period: Duration) -> Self {
        Self {
            sweep,
            period,
            running: Mutex::new(None),
        }
    }

    /// Spawn the sweep loop. Returns `false` if it is already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(sweep_loop(self.sweep.clone(), self.period, shutdown_rx));
        *running = Some(Running { shutdown: shutdown_tx, handle });

        info!("Trip status scheduler started (every {:?})", self.period);
        true
    }

    /// Signal the loop and wait for it to exit. A sweep already under way
    /// finishes first.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(Running { shutdown, handle }) = running {
            shutdown.send(true).ok();
            if let Err(e) = handle.await {
                error!("Trip status scheduler task failed: {}", e);
            }
            info!("Trip status scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

async fn sweep_loop(
    sweep: Arc<TripStatusSweep>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !*shutdown.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep.run_once().await {
                    Ok(report) if report != SweepReport::default() => info!(
                        started = report.started,
                        completed = report.completed,
                        "Trip statuses advanced"
                    ),
                    Ok(_) => debug!("Trip status sweep: nothing due"),
                    Err(e) => error!("Trip status sweep failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
