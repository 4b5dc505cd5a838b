//! Periodic pass trigger

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::scheduler::Scheduler;

/// Background task that runs a scheduling pass on a fixed interval
pub struct TimerTrigger {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl TimerTrigger {
    /// Spawn the timer loop
    ///
    /// With `run_on_startup` the first pass runs immediately, otherwise after
    /// one full interval. A failed pass is logged and the loop keeps going.
    pub fn start(scheduler: Arc<Scheduler>, interval: Duration, run_on_startup: bool) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let start = if run_on_startup {
            Instant::now()
        } else {
            Instant::now() + interval
        };

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, interval);
            // A slow pass pushes the next tick back instead of bursting
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_secs = interval.as_secs_f64(), "Scheduler timer started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Timer fired, running scheduling pass");
                        if let Err(e) = scheduler.run_pass().await {
                            error!(error = %e, "Timed scheduling pass failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Scheduler timer stopped");
        });

        Self { handle, shutdown }
    }

    /// Stop the loop and wait for an in-flight pass to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Scheduler timer task panicked");
        }
    }
}
