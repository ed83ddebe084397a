//! Finalized-track records and the append-only log they are written to.
//!
//! When the sweeper expires a track, it hands the track's summary to a
//! `TrackLogSink`. The default sink appends one line per aircraft to a
//! plain text file; tracks that never reported a position are classified
//! and counted but produce no line, since there is no distance to report.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::tracker::AircraftTrack;

/// Placeholder written when an aircraft never sent an identification
/// message.
const NO_CALLSIGN: &str = "??";

/// Summary of one expired track.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedTrack {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub icao: u32,
    pub callsign: Option<String>,
    pub position_messages: u64,
    /// Final closest distance to the reference point, meters.
    pub closest_distance_m: Option<f64>,
}

impl From<&AircraftTrack> for FinalizedTrack {
    fn from(track: &AircraftTrack) -> Self {
        Self {
            first_seen: track.first_seen,
            last_seen: track.last_seen,
            icao: track.icao,
            callsign: track.callsign.clone(),
            position_messages: track.position_messages,
            closest_distance_m: track.closest_distance,
        }
    }
}

impl fmt::Display for FinalizedTrack {
    /// One log line: first seen, last seen, ICAO address, callsign or
    /// placeholder, position-message count, integer-rounded meters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let callsign = self.callsign.as_deref().unwrap_or(NO_CALLSIGN);
        let distance = match self.closest_distance_m {
            Some(d) => format!("{:6}", d.round() as i64),
            None => format!("{:>6}", "-"),
        };
        write!(
            f,
            "{} {} {:06X} {:<8} {:3} {}",
            self.first_seen.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.last_seen.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.icao,
            callsign,
            self.position_messages,
            distance,
        )
    }
}

/// Destination for finalized-track records. Delivery failures are
/// non-fatal; the sweeper logs them and moves on.
#[async_trait]
pub trait TrackLogSink: Send + Sync {
    async fn record(&self, track: &FinalizedTrack) -> Result<()>;
}

/// Append-only file sink.
pub struct TrackLogWriter {
    file: Mutex<File>,
}

impl TrackLogWriter {
    /// Open (or create) the log file and write a start-of-acquisition
    /// banner, so restarts are visible in the log.
    pub async fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open track log {}", path.display()))?;
        let banner = format!(
            "{} Start data acquisition\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        file.write_all(banner.as_bytes())
            .await
            .with_context(|| format!("failed to write to track log {}", path.display()))?;
        file.flush().await?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl TrackLogSink for TrackLogWriter {
    async fn record(&self, track: &FinalizedTrack) -> Result<()> {
        let line = format!("{track}\n");
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .context("failed to append finalized track record")?;
        file.flush().await.context("failed to flush track log")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> FinalizedTrack {
        let first = Utc.with_ymd_and_hms(2019, 6, 28, 12, 0, 0).unwrap();
        FinalizedTrack {
            first_seen: first,
            last_seen: first + chrono::TimeDelta::seconds(95),
            icao: 0x4840D6,
            callsign: Some("KLM1023".to_string()),
            position_messages: 42,
            closest_distance_m: Some(1234.56),
        }
    }

    #[test]
    fn test_display_format() {
        let line = sample().to_string();
        assert_eq!(
            line,
            "2019-06-28T12:00:00Z 2019-06-28T12:01:35Z 4840D6 KLM1023   42   1235"
        );
    }

    #[test]
    fn test_display_placeholder_callsign() {
        let track = FinalizedTrack {
            callsign: None,
            ..sample()
        };
        assert!(track.to_string().contains(" ??       "));
    }

    #[tokio::test]
    async fn test_writer_appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.log");

        let writer = TrackLogWriter::open(&path).await.unwrap();
        writer.record(&sample()).await.unwrap();
        writer.record(&sample()).await.unwrap();
        drop(writer);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("Start data acquisition"));
        assert!(lines[1].contains("4840D6 KLM1023"));
        assert_eq!(lines[1], lines[2]);
    }
}
