//! Periodic expiry of idle tracks.
//!
//! Each cycle takes a snapshot of the live ICAO addresses and then removes
//! stale entries one at a time, so the store is never locked for the whole
//! scan. A track that vanished between snapshot and removal was finalized
//! by someone else and is skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregator::Aggregator;
use crate::track_log::{FinalizedTrack, TrackLogSink};
use crate::tracker::TrackStore;

pub struct Sweeper {
    store: Arc<TrackStore>,
    aggregator: Arc<Aggregator>,
    sink: Arc<dyn TrackLogSink>,
    /// A track idle longer than this is expired.
    inactivity_threshold: TimeDelta,
    /// Time between scans.
    period: Duration,
}

impl Sweeper {
    pub fn new(
        store: Arc<TrackStore>,
        aggregator: Arc<Aggregator>,
        sink: Arc<dyn TrackLogSink>,
        inactivity_threshold: TimeDelta,
        period: Duration,
    ) -> Self {
        Self {
            store,
            aggregator,
            sink,
            inactivity_threshold,
            period,
        }
    }

    /// Run until cancelled. The cancellation point is the timer wait, so an
    /// in-progress sweep always completes.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            threshold_s = self.inactivity_threshold.num_seconds(),
            period_s = self.period.as_secs_f64(),
            "starting expiry sweeper"
        );
        let mut ticker = tokio::time::interval(self.period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("expiry sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_once(Utc::now()).await;
                }
            }
        }
    }

    /// One scan: expire every track idle past the threshold. Returns the
    /// number of tracks finalized.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> usize {
        let mut finalized = 0;
        for icao in self.store.snapshot_icaos() {
            // Staleness check and removal are one atomic step; a concurrent
            // message keeps the track, a concurrent removal means the track
            // was already finalized elsewhere.
            let Some(track) = self.store.remove_stale(icao, now, self.inactivity_threshold)
            else {
                continue;
            };

            self.aggregator.record_finalized(&track);
            finalized += 1;
            metrics::counter!("tracks.finalized_total").increment(1);
            debug!(
                icao = %format!("{icao:06X}"),
                callsign = track.callsign.as_deref().unwrap_or("??"),
                distance_m = track.closest_distance.map(|d| d.round() as i64),
                "finalized idle track"
            );

            // Tracks that never reported a position have no distance to
            // log; they are counted in the unknown band above.
            if track.closest_distance.is_some() {
                let record = FinalizedTrack::from(&track);
                if let Err(e) = self.sink.record(&record).await {
                    warn!(
                        icao = %format!("{icao:06X}"),
                        error = %format!("{e:#}"),
                        "failed to write finalized track record"
                    );
                }
            }
        }
        finalized
    }
}
