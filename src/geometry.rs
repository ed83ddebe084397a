//! Geodetic to cartesian conversion and closest-approach geometry.
//!
//! All distances are in meters. The earth is modelled as a sphere with a
//! fixed geocentric radius; over the few tens of kilometers an SBS receiver
//! covers, the error stays well below ADS-B position accuracy.

/// Effective earth radius in meters (geocentric radius at mid latitudes).
pub const EARTH_RADIUS_M: f64 = 6_364_779.0;

const FEET_TO_METERS: f64 = 0.3048;

/// A point in earth-centered cartesian coordinates, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cartesian {
    /// Convert a geodetic position (degrees) plus altitude (feet) to
    /// cartesian coordinates with the origin at the center of the earth.
    pub fn from_geodetic(latitude_deg: f64, longitude_deg: f64, altitude_ft: f64) -> Self {
        let lat = latitude_deg.to_radians();
        let lon = longitude_deg.to_radians();
        let r = EARTH_RADIUS_M + altitude_ft * FEET_TO_METERS;
        Self {
            x: r * lat.cos() * lon.cos(),
            y: r * lat.cos() * lon.sin(),
            z: r * lat.sin(),
        }
    }

    pub fn distance_to(&self, other: &Cartesian) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Result of projecting the reference point onto one flight path segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestApproach {
    /// Distance in meters from the path to the reference point.
    pub distance: f64,
    /// True when the closest point lies on the segment itself, i.e. the
    /// aircraft passed abeam the reference between the two positions.
    pub passed: bool,
}

/// Closest distance between the straight path from `prev` to `cur` and the
/// reference point.
///
/// The segment is parametrised by `s` with `s = 0` at `prev` and `s = 1` at
/// `cur`. When the perpendicular foot falls outside the segment, the
/// endpoint closer in time (`cur`) is used instead. Returns `None` for a
/// zero-length segment; callers skip duplicate positions before getting
/// here, but the division is guarded regardless.
pub fn closest_approach(
    prev: Cartesian,
    cur: Cartesian,
    reference: Cartesian,
) -> Option<ClosestApproach> {
    let dx = cur.x - prev.x;
    let dy = cur.y - prev.y;
    let dz = cur.z - prev.z;

    let denom = dx * dx + dy * dy + dz * dz;
    if denom == 0.0 {
        return None;
    }

    let s = (dx * (reference.x - prev.x) + dy * (reference.y - prev.y) + dz * (reference.z - prev.z))
        / denom;

    if (0.0..=1.0).contains(&s) {
        let foot = Cartesian {
            x: prev.x + s * dx,
            y: prev.y + s * dy,
            z: prev.z + s * dz,
        };
        Some(ClosestApproach {
            distance: foot.distance_to(&reference),
            passed: true,
        })
    } else {
        Some(ClosestApproach {
            distance: cur.distance_to(&reference),
            passed: false,
        })
    }
}
