//! Shared utilities for CLI commands.

use std::io::BufRead;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use gauge_core::WeightSample;
use serde::Deserialize;

/// Longest reporting window accepted by `--days`.
const MAX_WINDOW_DAYS: u32 = 10 * 365;

/// Parse a timestamp given as RFC 3339 or Unix milliseconds.
///
/// Supports:
/// - RFC 3339: "2025-02-01T08:00:00Z"
/// - Unix milliseconds: "1738396800000"
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let Ok(millis) = s.parse::<i64>() else {
        bail!(
            "Invalid timestamp: {s}. Use RFC 3339 (e.g., 2025-02-01T08:00:00Z) or Unix milliseconds"
        );
    };
    DateTime::from_timestamp_millis(millis).ok_or_else(|| anyhow!("Timestamp out of range: {millis}"))
}

/// Half-open window covering the last `days` days up to `now`.
pub fn window(days: u32, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    if days == 0 || days > MAX_WINDOW_DAYS {
        bail!("--days must be between 1 and {MAX_WINDOW_DAYS}, got {days}");
    }
    // End is exclusive; nudge it past `now` so a reading taken this instant counts.
    let end = now + Duration::milliseconds(1);
    Ok((now - Duration::days(i64::from(days)), end))
}

/// One line of a weight sample file.
#[derive(Debug, Deserialize)]
struct SampleLine {
    weight_kg: f64,
    timestamp: RawTimestamp,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// Reads JSONL weight samples, skipping blank lines.
pub fn parse_samples<R: BufRead>(reader: R) -> Result<Vec<WeightSample>> {
    let mut samples = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: SampleLine = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        let timestamp = match parsed.timestamp {
            RawTimestamp::Millis(millis) => DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| anyhow!("Timestamp out of range: {millis}")),
            RawTimestamp::Text(text) => parse_timestamp(&text),
        }
        .with_context(|| format!("invalid sample on line {}", idx + 1))?;
        samples.push(WeightSample::new(parsed.weight_kg, timestamp));
    }
    Ok(samples)
}
