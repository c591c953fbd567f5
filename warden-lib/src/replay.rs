//! Replay of recorded request events through a detector.
//!
//! One event per line: `client path timestamp`, whitespace separated. A
//! client of `-` stands for a request without a client identifier. Blank
//! lines and lines starting with `#` are ignored.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::config::EndpointClass;
use crate::error::{Result, WardenError};
use crate::security::{AbuseDetector, Decision, LimiterStats};

/// One request as seen by the HTTP layer
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub client: String,
    pub path: String,
    pub timestamp: f64,
}

/// Output line for one replayed event
#[derive(Debug, Serialize)]
pub struct ReplayRecord<'a> {
    pub client: &'a str,
    pub path: &'a str,
    pub class: EndpointClass,
    pub timestamp: f64,
    pub decision: &'a Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Events evaluated
    pub events: u64,
    /// Malformed lines skipped
    pub skipped: u64,
    pub stats: LimiterStats,
}

/// Parse one input line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_event_line(line: &str) -> Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let (Some(client), Some(path), Some(timestamp), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(WardenError::Parse(format!(
            "expected `client path timestamp`, got `{line}`"
        )));
    };

    let timestamp = timestamp
        .parse::<f64>()
        .map_err(|e| WardenError::Parse(format!("invalid timestamp `{timestamp}`: {e}")))?;
    let client = if client == "-" { String::new() } else { client.to_string() };

    Ok(Some(Event { client, path: path.to_string(), timestamp }))
}

/// Evaluate every event from `reader`, writing one JSON object per line to
/// `writer`. Idle sweeps run on event time, every
/// `eviction.sweep_interval_secs`.
pub async fn replay<R, W>(detector: &AbuseDetector, reader: R, writer: &mut W) -> Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let sweep_every = detector.config().eviction.sweep_interval_secs as f64;
    let mut next_sweep: Option<f64> = None;
    let mut events = 0u64;
    let mut skipped = 0u64;
    let mut line_no = 0u64;

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let event = match parse_event_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                warn!(line = line_no, %err, "skipping malformed event");
                skipped += 1;
                continue;
            }
        };

        if event.timestamp.is_finite() {
            match next_sweep {
                None => next_sweep = Some(event.timestamp + sweep_every),
                Some(deadline) if event.timestamp >= deadline => {
                    detector.sweep_idle(event.timestamp);
                    next_sweep = Some(event.timestamp + sweep_every);
                }
                Some(_) => {}
            }
        }

        let class = detector.classify_endpoint(&event.path);
        let decision = detector.evaluate(&event.client, &event.path, event.timestamp);
        let record = ReplayRecord {
            client: &event.client,
            path: &event.path,
            class,
            timestamp: event.timestamp,
            decision: &decision,
        };

        let mut json = serde_json::to_vec(&record)
            .map_err(|e| WardenError::Parse(format!("Failed to encode decision: {e}")))?;
        json.push(b'\n');
        writer.write_all(&json).await?;
        events += 1;
    }
    writer.flush().await?;

    Ok(ReplaySummary { events, skipped, stats: detector.stats() })
}
