//! Expiry sweeper: deletes bucket entries once they pass the age limit.
//!
//! One [`Sweeper`] runs per bucket for the lifetime of the process. Each
//! cycle waits `sweep_interval`, enumerates the bucket, and removes every
//! entry whose age is strictly greater than `age_limit`.
//!
//! A sweep never fails as a whole. Listing errors, entries that vanish
//! mid-pass and deletions refused by the OS are logged and skipped; the
//! next entry and the next cycle proceed as normal.

use crate::config::ServerConfig;
use crate::storage::{Bucket, Storage};
use futures::StreamExt;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters for one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries observed.
    pub scanned: usize,
    /// Entries removed by this pass.
    pub deleted: usize,
    /// Entries (or listing steps) that could not be processed.
    pub failed: usize,
}

/// Periodic expiry of one bucket.
#[derive(Debug, Clone)]
pub struct Sweeper {
    storage: Storage,
    bucket: Bucket,
    age_limit: Duration,
    interval: Duration,
}

impl Sweeper {
    pub fn new(storage: Storage, bucket: Bucket, age_limit: Duration, interval: Duration) -> Self {
        Self {
            storage,
            bucket,
            age_limit,
            interval,
        }
    }

    /// Run a single pass, judging ages against `now`.
    pub async fn sweep_once(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let mut entries = match self.storage.list(self.bucket).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("[ERROR] Cannot scan {}: {}", self.bucket, e);
                report.failed += 1;
                return report;
            }
        };

        while let Some(item) = entries.next().await {
            let info = match item {
                Ok(info) => info,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.bucket, e);
                    report.failed += 1;
                    continue;
                }
            };
            report.scanned += 1;

            if info.age(now) <= self.age_limit {
                continue;
            }

            match self.storage.delete_entry(&info).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    error!("[ERROR] Cannot delete {}/{}: {}", self.bucket, info.name, e);
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Sweep of {}: {} scanned, {} deleted, {} failed",
            self.bucket, report.scanned, report.deleted, report.failed
        );
        report
    }

    /// Sweep forever until `cancel` fires.
    ///
    /// The first pass runs one interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Started cleanup task for: {}", self.storage.dir(self.bucket).display());

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.sweep_once(SystemTime::now()).await;
                    if report.deleted > 0 || report.failed > 0 {
                        info!(
                            "Swept {}: {} deleted, {} failed",
                            self.bucket, report.deleted, report.failed
                        );
                    }
                }
            }
        }

        debug!("Cleanup task for {} stopped", self.bucket);
    }
}

/// The sweepers for both buckets, sharing one cancellation token.
pub struct SweeperSet {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl SweeperSet {
    /// Spawn one sweeper per bucket on the current tokio runtime.
    pub fn spawn(storage: &Storage, config: &ServerConfig) -> Self {
        let cancel = CancellationToken::new();
        let handles = Bucket::ALL
            .into_iter()
            .map(|bucket| {
                let sweeper = Sweeper::new(
                    storage.clone(),
                    bucket,
                    config.age_limit,
                    config.sweep_interval,
                );
                tokio::spawn(sweeper.run(cancel.child_token()))
            })
            .collect();

        Self { cancel, handles }
    }

    /// Stop every sweeper and wait for the tasks to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Cleanup task ended abnormally: {}", e);
            }
        }
    }
}
