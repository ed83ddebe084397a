//! Per-aircraft track state and the concurrent store that owns it.
//!
//! The store is keyed by ICAO address. DashMap gives per-entry locking, so
//! updates for different aircraft never contend and a single aircraft's
//! update is atomic with respect to concurrent readers. Sweeps snapshot the
//! key set first and then remove entries one at a time, tolerating tracks
//! that disappeared in between.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;

use crate::geometry::{Cartesian, closest_approach};

/// Accumulated state for one aircraft between its first and last message.
#[derive(Debug, Clone)]
pub struct AircraftTrack {
    /// 24-bit ICAO address, the primary key.
    pub icao: u32,
    /// Callsign from the most recent identification message, if any.
    pub callsign: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_messages: u64,
    pub position_messages: u64,
    pub current_position: Option<Cartesian>,
    pub previous_position: Option<Cartesian>,
    /// Closest distance to the reference point seen so far, meters.
    /// Defined from the first position update onward; never increases.
    pub closest_distance: Option<f64>,
    /// Set once a closest-approach point fell between two observed
    /// positions. Later updates may still lower `closest_distance`; a new
    /// segment can come closer than the one that triggered the pass.
    pub has_passed: bool,
}

impl AircraftTrack {
    fn new(icao: u32, now: DateTime<Utc>) -> Self {
        Self {
            icao,
            callsign: None,
            first_seen: now,
            last_seen: now,
            total_messages: 0,
            position_messages: 0,
            current_position: None,
            previous_position: None,
            closest_distance: None,
            has_passed: false,
        }
    }

    /// Fold a new position into the track. A position identical to the
    /// current one carries no new geometry and is skipped.
    fn update_position(&mut self, position: Cartesian, reference: Cartesian) {
        if self.current_position == Some(position) {
            return;
        }

        self.previous_position = self.current_position;
        self.current_position = Some(position);

        let Some(previous) = self.previous_position else {
            self.closest_distance = Some(position.distance_to(&reference));
            return;
        };

        // The duplicate check above rules out a zero-length segment, but
        // closest_approach guards the division anyway.
        if let Some(approach) = closest_approach(previous, position, reference) {
            if approach.passed {
                self.has_passed = true;
            }
            self.closest_distance = Some(match self.closest_distance {
                Some(existing) => existing.min(approach.distance),
                None => approach.distance,
            });
        }
    }
}

/// Concurrent collection of live aircraft tracks.
///
/// The store is the sole owner of track state: tracks are created on first
/// reference, mutated in place, and handed out by value only when removed.
pub struct TrackStore {
    tracks: DashMap<u32, AircraftTrack>,
    reference: Cartesian,
}

impl TrackStore {
    pub fn new(reference: Cartesian) -> Self {
        Self {
            tracks: DashMap::new(),
            reference,
        }
    }

    pub fn reference(&self) -> Cartesian {
        self.reference
    }

    /// Record a callsign message for an aircraft. Empty callsigns (some
    /// feeds pad or omit them) leave any earlier value in place.
    pub fn apply_callsign(&self, icao: u32, callsign: &str, now: DateTime<Utc>) {
        let mut track = self.touch_entry(icao, now);
        if !callsign.is_empty() {
            track.callsign = Some(callsign.to_string());
        }
    }

    /// Record a position message: refresh the timestamps and counters and
    /// fold the new position into the closest-approach state.
    pub fn apply_position(
        &self,
        icao: u32,
        latitude: f64,
        longitude: f64,
        altitude_ft: i32,
        now: DateTime<Utc>,
    ) {
        let position = Cartesian::from_geodetic(latitude, longitude, altitude_ft as f64);
        let mut track = self.touch_entry(icao, now);
        track.position_messages += 1;
        let reference = self.reference;
        track.update_position(position, reference);
    }

    /// Record a content-free message: only the timestamps and the total
    /// message counter move.
    pub fn touch(&self, icao: u32, now: DateTime<Utc>) {
        self.touch_entry(icao, now);
    }

    /// Get-or-create, the only creation path. `first_seen` is set exactly
    /// once, at creation; every call refreshes `last_seen` and the total
    /// message counter.
    fn touch_entry(&self, icao: u32, now: DateTime<Utc>) -> RefMut<'_, u32, AircraftTrack> {
        let mut track = self
            .tracks
            .entry(icao)
            .or_insert_with(|| AircraftTrack::new(icao, now));
        track.last_seen = now;
        track.total_messages += 1;
        track
    }

    /// Point-in-time listing of live ICAO addresses for sweeping. The list
    /// may be stale by the time entries are revisited; removal APIs below
    /// tolerate that.
    pub fn snapshot_icaos(&self) -> Vec<u32> {
        self.tracks.iter().map(|entry| *entry.key()).collect()
    }

    /// Remove a track unconditionally. Idempotent: `None` means another
    /// actor got there first.
    pub fn remove(&self, icao: u32) -> Option<AircraftTrack> {
        self.tracks.remove(&icao).map(|(_, track)| track)
    }

    /// Remove a track only if it has been idle longer than `threshold` at
    /// time `now`. The staleness check and the removal are atomic, so a
    /// message landing concurrently keeps its track alive.
    pub fn remove_stale(
        &self,
        icao: u32,
        now: DateTime<Utc>,
        threshold: TimeDelta,
    ) -> Option<AircraftTrack> {
        self.tracks
            .remove_if(&icao, |_, track| now - track.last_seen > threshold)
            .map(|(_, track)| track)
    }

    pub fn get(&self, icao: u32) -> Option<AircraftTrack> {
        self.tracks.get(&icao).map(|track| track.clone())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Visit every live track. Entries added or removed during the scan may
    /// or may not be seen; each visited track is internally consistent.
    pub fn for_each(&self, mut f: impl FnMut(&AircraftTrack)) {
        for entry in self.tracks.iter() {
            f(entry.value());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EARTH_RADIUS_M;

    fn store() -> TrackStore {
        TrackStore::new(Cartesian::from_geodetic(52.0, 4.5, 0.0))
    }

    #[test]
    fn test_track_created_on_first_message() {
        let store = store();
        let now = Utc::now();
        store.touch(0xABCDEF, now);

        let track = store.get(0xABCDEF).unwrap();
        assert_eq!(track.first_seen, now);
        assert_eq!(track.last_seen, now);
        assert_eq!(track.total_messages, 1);
        assert!(track.closest_distance.is_none());
    }

    #[test]
    fn test_first_seen_is_stable() {
        let store = store();
        let t0 = Utc::now();
        let t1 = t0 + TimeDelta::seconds(5);
        store.touch(1, t0);
        store.apply_callsign(1, "KLM123", t1);

        let track = store.get(1).unwrap();
        assert_eq!(track.first_seen, t0);
        assert_eq!(track.last_seen, t1);
        assert_eq!(track.total_messages, 2);
        assert_eq!(track.callsign.as_deref(), Some("KLM123"));
    }

    #[test]
    fn test_empty_callsign_keeps_existing() {
        let store = store();
        let now = Utc::now();
        store.apply_callsign(1, "KLM123", now);
        store.apply_callsign(1, "", now);
        assert_eq!(store.get(1).unwrap().callsign.as_deref(), Some("KLM123"));
    }

    #[test]
    fn test_first_position_sets_distance() {
        let store = store();
        let now = Utc::now();
        store.apply_position(1, 52.0, 4.5, 10_000, now);

        let track = store.get(1).unwrap();
        assert_eq!(track.position_messages, 1);
        // Directly above the reference: distance is the altitude in meters.
        let distance = track.closest_distance.unwrap();
        assert!((distance - 3048.0).abs() < 1.0, "got {distance}");
        assert!(!track.has_passed);
    }

    #[test]
    fn test_closest_distance_is_non_increasing() {
        let store = store();
        let now = Utc::now();
        // Approach the reference longitude step by step, then recede.
        let longitudes = [4.9, 4.8, 4.7, 4.6, 4.7, 4.8, 5.0];
        let mut previous_best = f64::INFINITY;
        for (i, lon) in longitudes.iter().enumerate() {
            store.apply_position(1, 52.0, *lon, 30_000, now + TimeDelta::seconds(i as i64));
            let best = store.get(1).unwrap().closest_distance.unwrap();
            assert!(best <= previous_best, "distance increased: {best} > {previous_best}");
            previous_best = best;
        }
    }

    #[test]
    fn test_duplicate_position_is_ignored_by_geometry() {
        let store = store();
        let now = Utc::now();
        store.apply_position(1, 52.1, 4.6, 20_000, now);
        let before = store.get(1).unwrap();
        store.apply_position(1, 52.1, 4.6, 20_000, now + TimeDelta::seconds(1));
        let after = store.get(1).unwrap();

        assert_eq!(after.closest_distance, before.closest_distance);
        assert_eq!(after.previous_position, before.previous_position);
        // Counters still move: the duplicate is not an error.
        assert_eq!(after.position_messages, 2);
        assert_eq!(after.total_messages, 2);
    }

    #[test]
    fn test_passing_track_uses_segment_foot() {
        // Reference on the equator at lon 0; aircraft crosses the overhead
        // meridian between two reports, so the closest point lies between
        // them and has_passed flips.
        let store = TrackStore::new(Cartesian::from_geodetic(0.0, 0.0, 0.0));
        let now = Utc::now();
        store.apply_position(1, 0.1, -0.5, 30_000, now);
        store.apply_position(1, 0.1, 0.5, 30_000, now + TimeDelta::seconds(30));

        let track = store.get(1).unwrap();
        assert!(track.has_passed);
        let best = track.closest_distance.unwrap();
        let endpoint = track
            .current_position
            .unwrap()
            .distance_to(&store.reference());
        assert!(best < endpoint);
        // Roughly abeam at 0.1 degrees latitude: a bit over 11 km.
        assert!(best > 10_000.0 && best < EARTH_RADIUS_M);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = store();
        store.touch(7, Utc::now());
        assert!(store.remove(7).is_some());
        assert!(store.remove(7).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_stale_spares_fresh_tracks() {
        let store = store();
        let t0 = Utc::now();
        store.touch(1, t0);
        store.touch(2, t0 + TimeDelta::seconds(100));

        let now = t0 + TimeDelta::seconds(121);
        let threshold = TimeDelta::seconds(120);
        assert!(store.remove_stale(1, now, threshold).is_some());
        assert!(store.remove_stale(2, now, threshold).is_none());
        assert_eq!(store.len(), 1);
    }
}
