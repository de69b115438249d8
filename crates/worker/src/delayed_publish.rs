//! Periodic publishing of scheduled page versions.
//!
//! Every sweep picks up the scheduled versions whose publish time has passed
//! and publishes them one at a time. A version that fails is logged, recorded
//! in the page history and moved out of the schedule; the sweep carries on
//! with the next one.

use std::time::Duration;

use quire_content::{ContentResult, PageStore};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Counts from a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub published: usize,
    /// Versions that were no longer due once the page lock was held.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct DelayedPublisher {
    store: PageStore,
    batch_size: i64,
    interval: Duration,
}

impl DelayedPublisher {
    pub fn new(store: PageStore, batch_size: i64, interval: Duration) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            interval,
        }
    }

    /// Publish every due version, at most `batch_size` of them.
    ///
    /// Only a failure to list the due versions is returned; per-version
    /// failures are counted in the report.
    pub async fn run(&self) -> ContentResult<SweepReport> {
        let due = self.store.due_versions(self.batch_size).await?;
        let mut report = SweepReport::default();

        for version in due {
            match self.store.publish_due(version.id).await {
                Ok(Some(published)) => {
                    report.published += 1;
                    tracing::info!(
                        page_id = published.page_id,
                        version = published.version_number,
                        "Published scheduled version",
                    );
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        error = %e,
                        page_id = version.page_id,
                        version = version.version_number,
                        "Delayed publish failed",
                    );
                    if let Err(record_err) =
                        self.store.record_publish_failure(version.id, &e.to_string()).await
                    {
                        tracing::error!(
                            error = %record_err,
                            version_id = version.id,
                            "Failed to record delayed publish failure",
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    /// Sweep on every interval tick until `cancel` fires.
    pub async fn run_loop(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Delayed publish job started",
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Delayed publish job stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.run().await {
                        Ok(report) if report == SweepReport::default() => {
                            tracing::debug!("Delayed publish: nothing due");
                        }
                        Ok(report) => {
                            tracing::info!(
                                published = report.published,
                                skipped = report.skipped,
                                failed = report.failed,
                                "Delayed publish sweep finished",
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Delayed publish sweep failed");
                        }
                    }
                }
            }
        }
    }
}
