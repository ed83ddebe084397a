//! Applies raw BaseStation lines to the track store.
//!
//! The transport (sbs::client) hands lines here one at a time. Parsing
//! happens before any track state is touched, so a malformed line can
//! never create or mutate a track; it is counted and discarded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::aggregator::{Aggregator, MessageOutcome};
use crate::sbs::parser::{SbsError, SbsEvent, parse_line};
use crate::tracker::TrackStore;

#[derive(Clone)]
pub struct MessageProcessor {
    store: Arc<TrackStore>,
    aggregator: Arc<Aggregator>,
}

impl MessageProcessor {
    pub fn new(store: Arc<TrackStore>, aggregator: Arc<Aggregator>) -> Self {
        Self { store, aggregator }
    }

    /// Parse one line and apply it. Never fails: every outcome, including
    /// the malformed ones, is a counter increment.
    pub fn process_line(&self, line: &str, now: DateTime<Utc>) {
        match parse_line(line) {
            Ok(SbsEvent::Callsign { icao, callsign }) => {
                self.store.apply_callsign(icao, &callsign, now);
                self.aggregator.record_message(MessageOutcome::Processed);
            }
            Ok(SbsEvent::Position {
                icao,
                latitude,
                longitude,
                altitude_ft,
            }) => {
                self.store
                    .apply_position(icao, latitude, longitude, altitude_ft, now);
                self.aggregator.record_message(MessageOutcome::Processed);
            }
            Ok(SbsEvent::Other { icao }) => {
                self.store.touch(icao, now);
                self.aggregator.record_message(MessageOutcome::Ignored);
            }
            Err(SbsError::ZeroIcao) => {
                debug!("dropping message with all-zero ICAO address");
                self.aggregator.record_message(MessageOutcome::ZeroIcao);
            }
            Err(e) => {
                warn!(error = %e, line, "discarding unparseable SBS line");
                metrics::counter!("sbs.parse.failed_total").increment(1);
                self.aggregator.record_message(MessageOutcome::Errored);
            }
        }
    }
}
