//! Distance band classification.
//!
//! Maps a closest-approach distance (or the absence of one) onto an ordered,
//! exhaustive set of named bands. Band thresholds come from configuration;
//! classification is a plain first-match scan over static comparisons.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// One configured distance band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSpec {
    pub name: String,
    /// Exclusive upper bound in meters. `None` marks the final, unbounded
    /// band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_meters: Option<f64>,
}

/// Validated, ordered set of distance bands.
///
/// Index 0 is always the "unknown" band for tracks that never reported a
/// position; configured bands follow in ascending threshold order with the
/// unbounded band last. Together they partition `[0, ∞)` plus "unknown",
/// so `classify` is total.
#[derive(Debug, Clone)]
pub struct DistanceBands {
    unknown_label: String,
    specs: Vec<BandSpec>,
}

impl DistanceBands {
    pub fn new(unknown_label: impl Into<String>, specs: Vec<BandSpec>) -> Result<Self> {
        if specs.is_empty() {
            bail!("at least one distance band is required");
        }
        let mut previous: Option<f64> = None;
        for (i, spec) in specs.iter().enumerate() {
            let last = i == specs.len() - 1;
            match spec.upper_meters {
                None if !last => {
                    bail!("band '{}' has no upper bound but is not last", spec.name)
                }
                None => {}
                Some(upper) if last => {
                    bail!(
                        "final band '{}' must be unbounded, found upper bound {upper}",
                        spec.name
                    )
                }
                Some(upper) => {
                    if !upper.is_finite() || upper <= 0.0 {
                        bail!("band '{}' has invalid upper bound {upper}", spec.name);
                    }
                    if let Some(prev) = previous
                        && upper <= prev
                    {
                        bail!(
                            "band '{}' upper bound {upper} does not exceed previous bound {prev}",
                            spec.name
                        );
                    }
                    previous = Some(upper);
                }
            }
        }
        Ok(Self {
            unknown_label: unknown_label.into(),
            specs,
        })
    }

    /// The band set used by default: unknown, then doubling thresholds from
    /// 1 km up to 16 km, then everything beyond.
    pub fn standard() -> Self {
        let specs = [
            ("dist_00_01_km", Some(1_000.0)),
            ("dist_01_02_km", Some(2_000.0)),
            ("dist_02_04_km", Some(4_000.0)),
            ("dist_04_08_km", Some(8_000.0)),
            ("dist_08_16_km", Some(16_000.0)),
            ("dist_16_inf_km", None),
        ]
        .into_iter()
        .map(|(name, upper_meters)| BandSpec {
            name: name.to_string(),
            upper_meters,
        })
        .collect();
        Self::new("dist_unknown", specs).expect("standard band set is valid")
    }

    /// Total number of bands, including the unknown band.
    pub fn len(&self) -> usize {
        self.specs.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Band labels, unknown band first, in classification order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.unknown_label.as_str())
            .chain(self.specs.iter().map(|s| s.name.as_str()))
    }

    /// Map a closest-approach distance onto a band index. First match wins;
    /// an absent distance always lands in the unknown band.
    pub fn classify(&self, distance: Option<f64>) -> usize {
        let Some(distance) = distance else {
            return 0;
        };
        for (i, spec) in self.specs.iter().enumerate() {
            match spec.upper_meters {
                Some(upper) if distance < upper => return i + 1,
                Some(_) => {}
                None => return i + 1,
            }
        }
        // Unreachable given validation, but stay total.
        self.specs.len()
    }
}
