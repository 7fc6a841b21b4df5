use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::engine::{EngineSettings, TrackingEngine};
use super::snapshot::Snapshot;
use crate::core::catalog::CatalogHandle;

/// Largest accepted distance between tracked time and the wall clock.
pub const MAX_TIME_OFFSET_DAYS: i64 = 36_525;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("tracking loop already running")]
    AlreadyRunning,
    #[error("tick interval must be positive")]
    ZeroCadence,
    #[error("time offset of {seconds} s is beyond {max} days", max = MAX_TIME_OFFSET_DAYS)]
    OffsetOutOfRange { seconds: i64 },
}

#[derive(Debug)]
struct Controls {
    paused: bool,
    offset: Duration,
}

impl Controls {
    fn new() -> Self {
        Self { paused: false, offset: Duration::zero() }
    }

    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now();
        wall.checked_add_signed(self.offset).unwrap_or_else(|| {
            warn!(
                offset_seconds = self.offset.num_seconds(),
                "Time offset overflowed; using wall clock"
            );
            wall
        })
    }
}

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Drives a [`TrackingEngine`] at a fixed cadence and publishes one
/// [`Snapshot`] per tick.
pub struct TrackingScheduler {
    catalog: Arc<CatalogHandle>,
    cadence: std::time::Duration,
    settings: EngineSettings,
    controls: Arc<StdMutex<Controls>>,
    snapshots: watch::Sender<Arc<Snapshot>>,
    worker: Option<WorkerHandle>,
}

impl TrackingScheduler {
    pub fn new(
        catalog: Arc<CatalogHandle>,
        cadence: std::time::Duration,
        settings: EngineSettings,
    ) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(Snapshot::empty(Utc::now())));
        Self {
            catalog,
            cadence,
            settings,
            controls: Arc::new(StdMutex::new(Controls::new())),
            snapshots,
            worker: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }

    /// Most recently published snapshot.
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.join.is_finished())
    }

    pub fn pause(&self) {
        self.controls().paused = true;
        info!("Tracking paused");
    }

    pub fn resume(&self) {
        self.controls().paused = false;
        info!("Tracking resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.controls().paused
    }

    /// Shifts the tracked time relative to the wall clock. Takes effect on the next tick.
    pub fn set_time_offset(&self, offset: Duration) -> Result<(), SchedulerError> {
        if offset.num_days().abs() > MAX_TIME_OFFSET_DAYS {
            return Err(SchedulerError::OffsetOutOfRange { seconds: offset.num_seconds() });
        }
        self.controls().offset = offset;
        info!(offset_seconds = offset.num_seconds(), "Time offset changed");
        Ok(())
    }

    pub fn time_offset(&self) -> Duration {
        self.controls().offset
    }

    /// Jumps the tracked time to `time`; it keeps advancing with the wall clock.
    pub fn set_simulated_time(&self, time: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.set_time_offset(time - Utc::now())
    }

    pub fn simulated_now(&self) -> DateTime<Utc> {
        self.controls().now()
    }

    fn controls(&self) -> std::sync::MutexGuard<'_, Controls> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.worker.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if self.cadence.is_zero() {
            return Err(SchedulerError::ZeroCadence);
        }
        let (stop_tx, stop_rx) = oneshot::channel();
        let engine = TrackingEngine::new(self.settings);
        let join = tokio::spawn(run_tick_loop(
            engine,
            Arc::clone(&self.catalog),
            Arc::clone(&self.controls),
            self.snapshots.clone(),
            self.cadence,
            stop_rx,
        ));
        self.worker = Some(WorkerHandle { stop_tx, join });
        info!(cadence_ms = self.cadence.as_millis() as u64, "Tracking started");
        Ok(())
    }

    /// Stops the loop after any tick in progress has been published.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if let Err(e) = worker.join.await {
                warn!(error = %e, "Tracking task ended abnormally");
            }
            info!("Tracking stopped");
        }
    }
}

async fn run_tick_loop(
    mut engine: TrackingEngine,
    catalog: Arc<CatalogHandle>,
    controls: Arc<StdMutex<Controls>>,
    snapshots: watch::Sender<Arc<Snapshot>>,
    cadence: std::time::Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        let should_stop = tokio::select! {
            _ = interval.tick() => false,
            _ = &mut stop_rx => true,
        };
        if should_stop {
            return;
        }

        let (paused, time) = {
            let locked = controls.lock().unwrap_or_else(PoisonError::into_inner);
            (locked.paused, locked.now())
        };
        if paused {
            continue;
        }
        let current = catalog.load();
        let snapshot = engine.tick(&current, time);
        debug!(tick = snapshot.tick, time = %time, "Publishing snapshot");
        snapshots.send_replace(Arc::new(snapshot));
    }
}
