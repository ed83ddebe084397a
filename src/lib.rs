//! airprox - aircraft proximity tracker
//!
//! Consumes a decoded ADS-B message stream (SBS-1 BaseStation format),
//! tracks each aircraft's reported positions, and computes the closest
//! distance each one ever comes to a fixed ground reference point. Expired
//! tracks are classified into distance bands and aggregated over time.

pub mod aggregator;
pub mod bands;
pub mod config;
pub mod geometry;
pub mod ingest;
pub mod reporter;
pub mod sbs;
pub mod sweeper;
pub mod track_log;
pub mod tracker;

pub use aggregator::{Aggregator, MessageOutcome, StatsSnapshot};
pub use bands::{BandSpec, DistanceBands};
pub use config::Config;
pub use geometry::{Cartesian, ClosestApproach, closest_approach};
pub use ingest::MessageProcessor;
pub use reporter::{LogSnapshotSink, Reporter, SnapshotSink};
pub use sbs::{SbsClient, SbsClientConfig};
pub use sweeper::Sweeper;
pub use track_log::{FinalizedTrack, TrackLogSink, TrackLogWriter};
pub use tracker::{AircraftTrack, TrackStore};
