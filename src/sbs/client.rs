//! TCP client for the BaseStation message feed.
//!
//! Connects to the decoder's port 30003 output, reads CRLF-delimited lines
//! and hands each one to the message processor. Connection establishment
//! is retried with exponential backoff; a connection lost mid-stream is
//! reconnected with the backoff reset. Once the retry budget is exhausted
//! the client returns an error, which the process root treats as fatal.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::ingest::MessageProcessor;

/// Reconnect instead of waiting forever when the feed goes quiet.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// How a single connection attempt ended.
enum ConnectionResult {
    /// Could not establish the connection.
    ConnectFailed(anyhow::Error),
    /// Connection was up and then closed, timed out, or errored.
    Lost(anyhow::Error),
    /// Cancelled from outside while the connection was up.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SbsClientConfig {
    /// Decoder hostname.
    pub host: String,
    /// Decoder port (typically 30003).
    pub port: u16,
    /// Connection attempts before giving up.
    pub max_retries: u32,
    /// Initial delay between reconnection attempts, seconds.
    pub retry_delay_seconds: u64,
    /// Cap for the exponential backoff, seconds.
    pub max_retry_delay_seconds: u64,
}

impl Default for SbsClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 30003,
            max_retries: 5,
            retry_delay_seconds: 1,
            max_retry_delay_seconds: 60,
        }
    }
}

pub struct SbsClient {
    config: SbsClientConfig,
    processor: MessageProcessor,
}

impl SbsClient {
    pub fn new(config: SbsClientConfig, processor: MessageProcessor) -> Self {
        Self { config, processor }
    }

    /// Run the ingest loop until cancelled or the upstream source is lost
    /// for good.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut retry_count = 0u32;
        let mut current_delay = self.config.retry_delay_seconds.max(1);

        loop {
            if cancel.is_cancelled() {
                info!("shutdown requested, stopping SBS client");
                return Ok(());
            }

            match self.connect_and_process(&cancel).await {
                ConnectionResult::Cancelled => {
                    info!("shutdown requested, stopping SBS client");
                    return Ok(());
                }
                ConnectionResult::ConnectFailed(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "giving up on SBS server {}:{} after {} attempts: {e:#}",
                            self.config.host, self.config.port, retry_count
                        );
                        return Err(e.context("SBS connection retries exhausted"));
                    }
                    metrics::counter!("sbs.connection.failed_total").increment(1);
                    warn!(
                        "failed to connect to SBS server {}:{} (attempt {}/{}): {e:#} - retrying in {}s",
                        self.config.host,
                        self.config.port,
                        retry_count,
                        self.config.max_retries,
                        current_delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = sleep(Duration::from_secs(current_delay)) => {}
                    }
                    current_delay =
                        (current_delay * 2).min(self.config.max_retry_delay_seconds.max(1));
                }
                ConnectionResult::Lost(e) => {
                    metrics::counter!("sbs.connection.lost_total").increment(1);
                    warn!(
                        "SBS connection to {}:{} lost: {e:#} - reconnecting in 1s",
                        self.config.host, self.config.port
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = sleep(Duration::from_secs(1)) => {}
                    }
                    // The connection did come up, so the retry budget resets.
                    retry_count = 0;
                    current_delay = self.config.retry_delay_seconds.max(1);
                }
            }
        }
    }

    async fn connect_and_process(&self, cancel: &CancellationToken) -> ConnectionResult {
        let address = format!("{}:{}", self.config.host, self.config.port);
        info!("connecting to SBS server at {address}");

        let stream = match TcpStream::connect(&address).await {
            Ok(stream) => {
                info!("connected to SBS server at {address}");
                metrics::gauge!("sbs.connection.connected").set(1.0);
                stream
            }
            Err(e) => {
                metrics::gauge!("sbs.connection.connected").set(0.0);
                return ConnectionResult::ConnectFailed(anyhow::anyhow!(
                    "failed to connect to {address}: {e}"
                ));
            }
        };

        let result = self.process_connection(stream, cancel).await;
        metrics::gauge!("sbs.connection.connected").set(0.0);
        result
    }

    async fn process_connection(
        &self,
        stream: TcpStream,
        cancel: &CancellationToken,
    ) -> ConnectionResult {
        let connection_start = std::time::Instant::now();
        let mut lines = BufReader::new(stream).lines();
        let mut message_count = 0u64;
        let mut last_stats_log = std::time::Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(
                        "closing SBS connection after {:.1}s, {} messages",
                        connection_start.elapsed().as_secs_f64(),
                        message_count
                    );
                    return ConnectionResult::Cancelled;
                }
                result = tokio::time::timeout(IDLE_TIMEOUT, lines.next_line()) => {
                    match result {
                        Err(_) => {
                            return ConnectionResult::Lost(anyhow::anyhow!(
                                "no data for {}s",
                                IDLE_TIMEOUT.as_secs()
                            ));
                        }
                        Ok(Ok(None)) => {
                            return ConnectionResult::Lost(anyhow::anyhow!(
                                "connection closed by server after {} messages",
                                message_count
                            ));
                        }
                        Ok(Err(e)) => {
                            return ConnectionResult::Lost(anyhow::anyhow!("read error: {e}"));
                        }
                        Ok(Ok(Some(line))) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            trace!(line, "received SBS line");
                            metrics::counter!("sbs.lines.received_total").increment(1);
                            self.processor.process_line(line, Utc::now());
                            message_count += 1;

                            if last_stats_log.elapsed().as_secs() >= 10 {
                                let rate = message_count as f64
                                    / connection_start.elapsed().as_secs_f64();
                                trace!("SBS stats: {rate:.1} msg/s, {message_count} total");
                                metrics::gauge!("sbs.message_rate").set(rate);
                                last_stats_log = std::time::Instant::now();
                            }
                        }
                    }
                }
            }
        }
    }
}
