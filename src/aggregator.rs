//! Cumulative message and aircraft statistics.
//!
//! One `Aggregator` instance is owned by the process root and shared by
//! handle with the ingest loop, the sweeper, and the reporter. All counters
//! are monotonic atomics; a snapshot copies them and adds a census of the
//! currently live tracks.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bands::DistanceBands;
use crate::tracker::{AircraftTrack, TrackStore};

/// What became of one ingested line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Callsign or position update applied to a track.
    Processed,
    /// Valid message with no content we use (transmission types 2, 4-8).
    Ignored,
    /// Valid frame carrying the all-zero ICAO sentinel.
    ZeroIcao,
    /// Malformed or unrecognized line, discarded.
    Errored,
}

pub struct Aggregator {
    started_at: DateTime<Utc>,
    bands: DistanceBands,
    total_messages: AtomicU64,
    processed_messages: AtomicU64,
    zero_icao_messages: AtomicU64,
    errored_messages: AtomicU64,
    total_aircraft: AtomicU64,
    /// Lifetime per-band aircraft counts, indexed like `DistanceBands`.
    band_totals: Vec<AtomicU64>,
}

impl Aggregator {
    pub fn new(bands: DistanceBands) -> Self {
        Self::with_start(bands, Utc::now())
    }

    pub fn with_start(bands: DistanceBands, started_at: DateTime<Utc>) -> Self {
        let band_totals = (0..bands.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            started_at,
            bands,
            total_messages: AtomicU64::new(0),
            processed_messages: AtomicU64::new(0),
            zero_icao_messages: AtomicU64::new(0),
            errored_messages: AtomicU64::new(0),
            total_aircraft: AtomicU64::new(0),
            band_totals,
        }
    }

    pub fn bands(&self) -> &DistanceBands {
        &self.bands
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Count one ingested line. Every line increments the total exactly
    /// once, plus the counter matching its outcome.
    pub fn record_message(&self, outcome: MessageOutcome) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        match outcome {
            MessageOutcome::Processed => {
                self.processed_messages.fetch_add(1, Ordering::Relaxed);
            }
            MessageOutcome::Ignored => {}
            MessageOutcome::ZeroIcao => {
                self.zero_icao_messages.fetch_add(1, Ordering::Relaxed);
            }
            MessageOutcome::Errored => {
                self.errored_messages.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Fold an expired track into the lifetime statistics. Called exactly
    /// once per track, by the sweeper, after the track has been removed
    /// from the store.
    pub fn record_finalized(&self, track: &AircraftTrack) {
        let band = self.bands.classify(track.closest_distance);
        self.total_aircraft.fetch_add(1, Ordering::Relaxed);
        self.band_totals[band].fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters plus a census of the live tracks.
    ///
    /// Counters are individually atomic; the live census classifies each
    /// track it visits in a consistent state but may miss tracks appearing
    /// or expiring mid-scan, which is fine for a periodic report.
    pub fn snapshot(&self, store: &TrackStore) -> StatsSnapshot {
        let mut current = vec![0u64; self.bands.len()];
        let mut live_aircraft = 0u64;
        store.for_each(|track| {
            live_aircraft += 1;
            current[self.bands.classify(track.closest_distance)] += 1;
        });

        let bands = self
            .bands
            .labels()
            .enumerate()
            .map(|(i, label)| BandCount {
                band: label.to_string(),
                lifetime: self.band_totals[i].load(Ordering::Relaxed),
                current: current[i],
            })
            .collect();

        StatsSnapshot {
            started_at: self.started_at,
            elapsed_seconds: (Utc::now() - self.started_at).num_seconds().max(0),
            total_messages: self.total_messages.load(Ordering::Relaxed),
            processed_messages: self.processed_messages.load(Ordering::Relaxed),
            zero_icao_messages: self.zero_icao_messages.load(Ordering::Relaxed),
            errored_messages: self.errored_messages.load(Ordering::Relaxed),
            total_aircraft: self.total_aircraft.load(Ordering::Relaxed),
            live_aircraft,
            bands,
        }
    }
}

/// Lifetime and currently-live aircraft counts for one band.
#[derive(Debug, Clone, Serialize)]
pub struct BandCount {
    pub band: String,
    pub lifetime: u64,
    pub current: u64,
}

/// Immutable statistics snapshot handed to report sinks.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: i64,
    pub total_messages: u64,
    pub processed_messages: u64,
    pub zero_icao_messages: u64,
    pub errored_messages: u64,
    /// Aircraft finalized since startup.
    pub total_aircraft: u64,
    /// Aircraft currently tracked.
    pub live_aircraft: u64,
    /// Per-band counts, unknown band first.
    pub bands: Vec<BandCount>,
}
