//! Periodic job driver.
//!
//! Every job runs once at start and then on a fixed interval. A job never
//! overlaps itself: a tick that finds the previous run still active is
//! skipped, not queued. Cancelling the shutdown token stops the timers;
//! runs already in flight are allowed to finish.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use solveit_core::Result;

#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    /// The previous run still held the job's lock
    Skipped,
}

/// A job with its interval and single-flight guard
pub struct ScheduledJob {
    job: Arc<dyn Job>,
    interval: Duration,
    running: Arc<Mutex<()>>,
    skipped: AtomicU64,
}

impl ScheduledJob {
    #[must_use]
    pub fn new(job: Arc<dyn Job>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            running: Arc::new(Mutex::new(())),
            skipped: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks dropped because a run was still active
    #[must_use]
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Run the job now unless a previous run is still active
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = Arc::clone(&self.running).try_lock_owned() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            info!(job = self.name(), "Skipping scheduled run, previous run still active");
            return TickOutcome::Skipped;
        };

        let started = Instant::now();
        match self.job.run().await {
            Ok(()) => info!(
                job = self.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job run finished"
            ),
            Err(e) => error!(
                job = self.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "Job run failed"
            ),
        }
        TickOutcome::Completed
    }
}

/// Owns the scheduled jobs and every task they spawn
pub struct Scheduler {
    jobs: Vec<Arc<ScheduledJob>>,
    tracker: TaskTracker,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn add(&mut self, job: Arc<dyn Job>, interval: Duration) -> Arc<ScheduledJob> {
        let scheduled = Arc::new(ScheduledJob::new(job, interval));
        self.jobs.push(Arc::clone(&scheduled));
        scheduled
    }

    #[must_use]
    pub fn jobs(&self) -> &[Arc<ScheduledJob>] {
        &self.jobs
    }

    /// Start one timer loop per job
    pub fn start(&self, shutdown: &CancellationToken) {
        for job in &self.jobs {
            self.tracker.spawn(drive(
                Arc::clone(job),
                self.tracker.clone(),
                shutdown.clone(),
            ));
        }
    }

    /// Wait for the timer loops and any in-flight runs. Returns once the
    /// shutdown token passed to [`Scheduler::start`] has fired and the last
    /// run has finished.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn drive(job: Arc<ScheduledJob>, tracker: TaskTracker, shutdown: CancellationToken) {
    info!(job = job.name(), interval = ?job.interval(), "Starting background job");

    let mut ticker = tokio::time::interval(job.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                info!(job = job.name(), "Background job shutting down");
                return;
            }
            _ = ticker.tick() => {
                let job = Arc::clone(&job);
                tracker.spawn(async move { job.tick().await });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Gate {
        started: AtomicUsize,
        finished: AtomicUsize,
        release: Notify,
        blocking: bool,
    }

    struct GatedJob(Arc<Gate>);

    #[async_trait]
    impl Job for GatedJob {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn run(&self) -> Result<()> {
            self.0.started.fetch_add(1, Ordering::SeqCst);
            if self.0.blocking {
                self.0.release.notified().await;
            }
            self.0.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn until(condition: impl Fn() -> bool) {
        while !condition() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let gate = Arc::new(Gate {
            blocking: true,
            ..Gate::default()
        });
        let job = Arc::new(ScheduledJob::new(
            Arc::new(GatedJob(Arc::clone(&gate))),
            Duration::from_secs(60),
        ));

        let first = tokio::spawn({
            let job = Arc::clone(&job);
            async move { job.tick().await }
        });
        until(|| gate.started.load(Ordering::SeqCst) == 1).await;

        assert_eq!(job.tick().await, TickOutcome::Skipped);
        assert_eq!(job.tick().await, TickOutcome::Skipped);
        assert_eq!(job.skipped_ticks(), 2);

        gate.release.notify_one();
        assert_eq!(first.await.unwrap(), TickOutcome::Completed);
        assert_eq!(gate.started.load(Ordering::SeqCst), 1);

        // The lock is free again once the run finished.
        let next = tokio::spawn({
            let job = Arc::clone(&job);
            async move { job.tick().await }
        });
        until(|| gate.started.load(Ordering::SeqCst) == 2).await;
        gate.release.notify_one();
        assert_eq!(next.await.unwrap(), TickOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_on_interval() {
        let gate = Arc::new(Gate::default());
        let mut scheduler = Scheduler::new();
        scheduler.add(Arc::new(GatedJob(Arc::clone(&gate))), Duration::from_secs(60));

        let shutdown = CancellationToken::new();
        scheduler.start(&shutdown);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(gate.finished.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(gate.finished.load(Ordering::SeqCst), 3);

        shutdown.cancel();
        scheduler.wait().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(gate.finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_lets_inflight_run_finish() {
        let gate = Arc::new(Gate {
            blocking: true,
            ..Gate::default()
        });
        let mut scheduler = Scheduler::new();
        scheduler.add(Arc::new(GatedJob(Arc::clone(&gate))), Duration::from_secs(3600));

        let shutdown = CancellationToken::new();
        scheduler.start(&shutdown);
        until(|| gate.started.load(Ordering::SeqCst) == 1).await;

        shutdown.cancel();
        let scheduler = Arc::new(scheduler);
        let waiting = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.wait().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());
        assert_eq!(gate.finished.load(Ordering::SeqCst), 0);

        gate.release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gate.finished.load(Ordering::SeqCst), 1);
    }
}
