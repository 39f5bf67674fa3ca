//! Bar loading
//!
//! Reads `timestamp,open,high,low,close,volume` CSV files into validated bars
//! in strictly increasing time order.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{info, warn};

use crate::Bar;

/// RFC 3339, or `%Y-%m-%d %H:%M:%S` taken as UTC
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .with_context(|| format!("Failed to parse timestamp: {}", s))
}

fn decimal_field(record: &csv::StringRecord, idx: usize, name: &str) -> Result<Decimal> {
    record
        .get(idx)
        .with_context(|| format!("Missing {} column", name))?
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", name))
}

/// Load bars from CSV.
///
/// Rows that fail bar validation, or that do not move time forward, are
/// skipped with a warning. Unparseable rows are an error.
pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut bars: Vec<Bar> = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        // +2: 1-indexed plus header row
        let line = row_idx + 2;
        let record = result.with_context(|| format!("Failed to read line {}", line))?;

        let ts_str = record.get(0).context("Missing timestamp column")?;
        let timestamp = parse_timestamp(ts_str.trim())?;
        let open = decimal_field(&record, 1, "open")?;
        let high = decimal_field(&record, 2, "high")?;
        let low = decimal_field(&record, 3, "low")?;
        let close = decimal_field(&record, 4, "close")?;
        let volume = decimal_field(&record, 5, "volume")?;

        let bar = match Bar::new(timestamp, open, high, low, close, volume) {
            Ok(bar) => bar,
            Err(e) => {
                skipped += 1;
                warn!(line, error = %e, "Skipping invalid bar");
                continue;
            }
        };

        if let Some(prev) = bars.last() {
            if bar.timestamp <= prev.timestamp {
                skipped += 1;
                warn!(
                    line,
                    timestamp = %bar.timestamp,
                    previous = %prev.timestamp,
                    "Skipping out-of-order bar"
                );
                continue;
            }
        }

        bars.push(bar);
    }

    if skipped > 0 {
        warn!(
            skipped,
            total = skipped + bars.len(),
            file = ?path.file_name().unwrap_or_default(),
            "Skipped rows while loading bars"
        );
    }
    info!(bars = bars.len(), file = %path.display(), "Loaded bars");

    Ok(bars)
}
