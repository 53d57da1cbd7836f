use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{CycleOutcome, Updater};

/// What drives the refresh cycles
pub enum TickSource {
    /// Fire every interval, starting one interval from now
    Every(Duration),
    /// Fire once per message; the scheduler stops when the sender is dropped
    Manual(mpsc::Receiver<()>),
}

enum Ticker {
    Interval(Interval),
    Manual(mpsc::Receiver<()>),
}

impl Ticker {
    fn new(source: TickSource) -> Self {
        match source {
            TickSource::Every(period) => {
                let mut interval = time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Ticker::Interval(interval)
            }
            TickSource::Manual(rx) => Ticker::Manual(rx),
        }
    }

    /// Wait for the next tick; `false` once the tick source is exhausted
    async fn tick(&mut self) -> bool {
        match self {
            Ticker::Interval(interval) => {
                interval.tick().await;
                true
            }
            Ticker::Manual(rx) => rx.recv().await.is_some(),
        }
    }
}

/// Background task running refresh cycles one at a time.
///
/// Cycles run inside the task itself, so a slow cycle delays later ticks
/// instead of overlapping with them.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub fn spawn(updater: Arc<Updater>, ticks: TickSource) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let mut ticker = Ticker::new(ticks);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        info!("GeoIP updater shutting down");
                        break;
                    }
                    more = ticker.tick() => {
                        if !more {
                            debug!("GeoIP updater tick source closed");
                            break;
                        }
                        refresh(&updater).await;
                    }
                }
            }
        });

        Self { shutdown_tx, task }
    }

    /// Stop after the cycle in progress (if any) and wait for the task to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "GeoIP updater task failed");
        }
    }

    /// Wait for the task to end on its own, i.e. a closed manual tick source
    pub async fn join(self) {
        let Scheduler { shutdown_tx, task } = self;
        if let Err(err) = task.await {
            warn!(error = %err, "GeoIP updater task failed");
        }
        drop(shutdown_tx);
    }
}

async fn refresh(updater: &Updater) {
    match updater.run_cycle().await {
        Ok(CycleOutcome::Updated) => info!("GeoIP database updated successfully"),
        Ok(CycleOutcome::UpToDate) => debug!("GeoIP database is up to date"),
        Err(err) => warn!(error = %err, "GeoIP database refresh failed; keeping current database"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpdateError;
    use crate::geoip::{CountryDatabase, DatabaseLoader, GeoDatabase};
    use crate::updater::DatasetSource;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{Notify, Semaphore};

    struct NoLoader;

    impl DatabaseLoader for NoLoader {
        fn open(&self, path: &Path) -> Result<Box<dyn CountryDatabase>, crate::error::GeoError> {
            Err(crate::error::GeoError::Invalid {
                path: path.to_path_buf(),
                reason: "unused".into(),
            })
        }
    }

    /// Counts probes and never asks for a download
    #[derive(Default)]
    struct CountingSource {
        probes: AtomicUsize,
    }

    #[async_trait]
    impl DatasetSource for CountingSource {
        async fn needs_refresh(&self, _local: Option<DateTime<Utc>>) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            false
        }

        async fn download(&self, _dest: &mut tokio::fs::File) -> Result<u64, UpdateError> {
            unreachable!("download is never requested")
        }
    }

    /// Holds every probe until a permit is released, tracking concurrency
    struct GatedSource {
        probes: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        entered: Notify,
        release: Semaphore,
    }

    impl GatedSource {
        fn new() -> Self {
            Self {
                probes: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                entered: Notify::new(),
                release: Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl DatasetSource for GatedSource {
        async fn needs_refresh(&self, _local: Option<DateTime<Utc>>) -> bool {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.acquire().await.unwrap().forget();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            false
        }

        async fn download(&self, _dest: &mut tokio::fs::File) -> Result<u64, UpdateError> {
            unreachable!("download is never requested")
        }
    }

    fn updater(source: Arc<dyn DatasetSource>) -> Arc<Updater> {
        let database = Arc::new(GeoDatabase::unloaded("unused.mmdb", Arc::new(NoLoader)));
        Arc::new(Updater::new(source, database))
    }

    #[tokio::test]
    async fn test_manual_ticks_run_one_cycle_each() {
        let source = Arc::new(CountingSource::default());
        let (tx, rx) = mpsc::channel(4);
        let scheduler = Scheduler::spawn(updater(Arc::clone(&source) as _), TickSource::Manual(rx));

        tx.send(()).await.unwrap();
        tx.send(()).await.unwrap();
        drop(tx);
        scheduler.join().await;

        assert_eq!(source.probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ticks_during_a_cycle_do_not_overlap() {
        let source = Arc::new(GatedSource::new());
        let (tx, rx) = mpsc::channel(4);
        let scheduler = Scheduler::spawn(updater(Arc::clone(&source) as _), TickSource::Manual(rx));

        tx.send(()).await.unwrap();
        source.entered.notified().await;
        // Two more ticks arrive while the first cycle is still blocked
        tx.send(()).await.unwrap();
        tx.send(()).await.unwrap();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.probes.load(Ordering::SeqCst), 1);

        source.release.add_permits(3);
        drop(tx);
        scheduler.join().await;

        assert_eq!(source.probes.load(Ordering::SeqCst), 3);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_skips_immediate_tick() {
        let source = Arc::new(CountingSource::default());
        let hour = Duration::from_secs(3600);
        let scheduler = Scheduler::spawn(updater(Arc::clone(&source) as _), TickSource::Every(hour));

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.probes.load(Ordering::SeqCst), 0);

        time::sleep(hour * 3).await;
        assert_eq!(source.probes.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_scheduler() {
        let source = Arc::new(CountingSource::default());
        let scheduler = Scheduler::spawn(
            updater(Arc::clone(&source) as _),
            TickSource::Every(Duration::from_secs(24 * 3600)),
        );

        time::timeout(Duration::from_secs(5), scheduler.shutdown())
            .await
            .expect("scheduler should stop promptly");
        assert_eq!(source.probes.load(Ordering::SeqCst), 0);
    }
}
