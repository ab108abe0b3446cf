//! Fixed-interval poller for fetch-and-render tasks.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// One fetch+render cycle. Cloned into every tick.
pub type Task = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`Task`].
pub fn task<F, Fut>(f: F) -> Task
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(f()) })
}

/// Fixed-period ticker. A late tick pushes the schedule back instead of
/// firing catch-up ticks back to back.
fn ticker(interval: Duration) -> Interval {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

pub struct PollScheduler;

impl PollScheduler {
    /// Run every task now, then every `interval`, until the handle is stopped or dropped.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn schedule(tasks: Vec<Task>, interval: Duration) -> PollHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));
        let tick_counter = ticks.clone();
        let task_count = tasks.len();

        let driver = tokio::spawn(async move {
            let mut ticker = ticker(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let n = tick_counter.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!("Poll tick #{n} ({task_count} tasks)");
                        for t in &tasks {
                            // Separate tokio task per section: a panic or slow fetch stays contained.
                            let fut = t();
                            tokio::spawn(async move {
                                fut.await;
                            });
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Poll driver exited");
        });

        info!(
            "Polling {} task(s) every {}ms",
            task_count,
            interval.as_millis()
        );

        PollHandle {
            stop_tx,
            driver: Some(driver),
            ticks,
        }
    }
}

/// Running schedule. Stops on [`PollHandle::stop`] or drop.
pub struct PollHandle {
    stop_tx: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl PollHandle {
    /// Stop issuing ticks. Fetches already in flight still complete and render.
    pub fn stop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        if self.stop_tx.send(true).is_err() {
            warn!("Poll driver already gone");
        }
        driver.abort();
        info!("Polling stopped after {} tick(s)", self.ticks());
    }

    pub fn is_running(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| !d.is_finished())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
