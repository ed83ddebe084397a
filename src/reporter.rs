//! Periodic statistics reporting.
//!
//! The reporter builds a `StatsSnapshot` on a timer and hands it to a
//! `SnapshotSink`. Delivery failure is logged and the snapshot dropped; the
//! next cycle produces a fresh one, so nothing is retried while holding
//! state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::{Aggregator, StatsSnapshot};
use crate::tracker::TrackStore;

/// Destination for statistics snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn deliver(&self, snapshot: &StatsSnapshot) -> Result<()>;
}

/// Sink that renders snapshots into the process log.
pub struct LogSnapshotSink;

#[async_trait]
impl SnapshotSink for LogSnapshotSink {
    async fn deliver(&self, snapshot: &StatsSnapshot) -> Result<()> {
        info!(
            elapsed_s = snapshot.elapsed_seconds,
            total = snapshot.total_messages,
            processed = snapshot.processed_messages,
            zero_icao = snapshot.zero_icao_messages,
            errored = snapshot.errored_messages,
            "message statistics"
        );
        for band in &snapshot.bands {
            info!(
                band = %band.band,
                lifetime = band.lifetime,
                current = band.current,
                "aircraft statistics"
            );
        }
        info!(
            total = snapshot.total_aircraft,
            live = snapshot.live_aircraft,
            "aircraft totals"
        );
        Ok(())
    }
}

pub struct Reporter {
    store: Arc<TrackStore>,
    aggregator: Arc<Aggregator>,
    sink: Arc<dyn SnapshotSink>,
    period: Duration,
}

impl Reporter {
    pub fn new(
        store: Arc<TrackStore>,
        aggregator: Arc<Aggregator>,
        sink: Arc<dyn SnapshotSink>,
        period: Duration,
    ) -> Self {
        Self {
            store,
            aggregator,
            sink,
            period,
        }
    }

    /// Run until cancelled, delivering one snapshot per period.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(period_s = self.period.as_secs_f64(), "starting reporter");
        let start = tokio::time::Instant::now() + self.period;
        let mut ticker = tokio::time::interval_at(start, self.period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("reporter stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.report_once().await;
                }
            }
        }
    }

    pub async fn report_once(&self) {
        let snapshot = self.aggregator.snapshot(&self.store);
        if let Err(e) = self.sink.deliver(&snapshot).await {
            // Non-fatal: the next cycle delivers fresh numbers.
            warn!(error = %format!("{e:#}"), "failed to deliver statistics snapshot");
            metrics::counter!("reports.failed_total").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::DistanceBands;
    use crate::geometry::Cartesian;
    use chrono::Utc;
    use std::sync::Mutex;

    struct CollectingSink {
        snapshots: Mutex<Vec<StatsSnapshot>>,
    }

    #[async_trait]
    impl SnapshotSink for CollectingSink {
        async fn deliver(&self, snapshot: &StatsSnapshot) -> Result<()> {
            self.snapshots.lock().unwrap().push(snapshot.clone());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_on_each_period() {
        let store = Arc::new(TrackStore::new(Cartesian::from_geodetic(52.0, 4.5, 0.0)));
        let aggregator = Arc::new(Aggregator::new(DistanceBands::standard()));
        let sink = Arc::new(CollectingSink {
            snapshots: Mutex::new(Vec::new()),
        });
        store.touch(1, Utc::now());

        let reporter = Reporter::new(
            store,
            aggregator,
            sink.clone(),
            Duration::from_secs(300),
        );
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { reporter.run(cancel).await })
        };

        // Two full periods pass; the reporter fires twice.
        tokio::time::sleep(Duration::from_secs(601)).await;
        cancel.cancel();
        handle.await.unwrap();

        let snapshots = sink.snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].live_aircraft, 1);
    }
}
