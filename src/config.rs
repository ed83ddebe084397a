//! Process configuration, loaded from a TOML file.
//!
//! Everything except the reference point has a sensible default, so a
//! minimal config is just the two coordinates:
//!
//! ```toml
//! [reference]
//! latitude = 52.0
//! longitude = 4.5
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bands::{BandSpec, DistanceBands};
use crate::sbs::SbsClientConfig;

/// Location whose closest approach distances we measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Connection parameters for the BaseStation feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SbsConfig {
    pub host: String,
    pub port: u16,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_retry_delay_seconds: u64,
}

impl Default for SbsConfig {
    fn default() -> Self {
        let defaults = SbsClientConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            max_retries: defaults.max_retries,
            retry_delay_seconds: defaults.retry_delay_seconds,
            max_retry_delay_seconds: defaults.max_retry_delay_seconds,
        }
    }
}

impl From<&SbsConfig> for SbsClientConfig {
    fn from(c: &SbsConfig) -> Self {
        Self {
            host: c.host.clone(),
            port: c.port,
            max_retries: c.max_retries,
            retry_delay_seconds: c.retry_delay_seconds,
            max_retry_delay_seconds: c.max_retry_delay_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub sbs: SbsConfig,
    /// A track idle longer than this is expired, seconds.
    #[serde(default = "default_inactivity_threshold")]
    pub inactivity_threshold_seconds: u64,
    /// Time between expiry scans, seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Time between statistics reports, seconds.
    #[serde(default = "default_report_interval")]
    pub report_interval_seconds: u64,
    /// Finalized-track records are appended here.
    #[serde(default = "default_track_log_path")]
    pub track_log_path: PathBuf,
    /// Distance bands in ascending order; empty means the standard set.
    #[serde(default)]
    pub bands: Vec<BandSpec>,
}

fn default_inactivity_threshold() -> u64 {
    120
}

fn default_sweep_interval() -> u64 {
    1
}

fn default_report_interval() -> u64 {
    300
}

fn default_track_log_path() -> PathBuf {
    PathBuf::from("./airprox-tracks.log")
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn with_reference(latitude: f64, longitude: f64) -> Self {
        Self {
            reference: ReferenceConfig {
                latitude,
                longitude,
            },
            sbs: SbsConfig::default(),
            inactivity_threshold_seconds: default_inactivity_threshold(),
            sweep_interval_seconds: default_sweep_interval(),
            report_interval_seconds: default_report_interval(),
            track_log_path: default_track_log_path(),
            bands: Vec::new(),
        }
    }

    /// Build the validated band set. Misordered or non-exhaustive bands are
    /// a fatal configuration error.
    pub fn distance_bands(&self) -> Result<DistanceBands> {
        if self.bands.is_empty() {
            Ok(DistanceBands::standard())
        } else {
            DistanceBands::new("dist_unknown", self.bands.clone())
                .context("invalid [[bands]] configuration")
        }
    }
}

/// Resolve the config file path.
///
/// Priority: `AIRPROX_CONFIG` env var, then `/etc/airprox/airprox.toml` if
/// present, then `./airprox.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("AIRPROX_CONFIG") {
        return PathBuf::from(path);
    }
    let system = PathBuf::from("/etc/airprox/airprox.toml");
    if system.exists() {
        return system;
    }
    PathBuf::from("./airprox.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [reference]
            latitude = 52.0
            longitude = 4.5
            "#,
        )
        .unwrap();

        assert_eq!(config.inactivity_threshold_seconds, 120);
        assert_eq!(config.sweep_interval_seconds, 1);
        assert_eq!(config.report_interval_seconds, 300);
        assert_eq!(config.sbs.host, "localhost");
        assert_eq!(config.sbs.port, 30003);
        assert_eq!(config.distance_bands().unwrap().len(), 7);
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            inactivity_threshold_seconds = 60
            sweep_interval_seconds = 2
            report_interval_seconds = 120
            track_log_path = "/var/log/airprox/tracks.log"

            [reference]
            latitude = 51.9
            longitude = 4.4

            [sbs]
            host = "receiver.local"
            port = 30003
            max_retries = 10
            retry_delay_seconds = 2
            max_retry_delay_seconds = 30

            [[bands]]
            name = "near"
            upper_meters = 5000.0

            [[bands]]
            name = "far"
            "#,
        )
        .unwrap();

        assert_eq!(config.sbs.host, "receiver.local");
        assert_eq!(config.sbs.max_retries, 10);
        assert_eq!(config.inactivity_threshold_seconds, 60);
        let bands = config.distance_bands().unwrap();
        // unknown + near + far
        assert_eq!(bands.len(), 3);
        assert_eq!(bands.classify(Some(4_000.0)), 1);
        assert_eq!(bands.classify(Some(6_000.0)), 2);
    }

    #[test]
    fn test_invalid_bands_are_fatal() {
        let config: Config = toml::from_str(
            r#"
            [reference]
            latitude = 52.0
            longitude = 4.5

            [[bands]]
            name = "only"
            upper_meters = 5000.0
            "#,
        )
        .unwrap();
        assert!(config.distance_bands().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airprox.toml");
        std::fs::write(
            &path,
            "[reference]\nlatitude = 52.0\nlongitude = 4.5\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!((config.reference.latitude - 52.0).abs() < f64::EPSILON);

        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }
}
