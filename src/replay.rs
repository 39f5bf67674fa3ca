//! Historical replay
//!
//! Drives an engine over a bar series in order. No cash, fees or order
//! handling: the report is the engine's own view of what it decided.

use anyhow::{ensure, Result};
use serde::Serialize;
use tracing::info;

use crate::engine::DecisionEngine;
use crate::metrics::{CompletedTrade, GridMetrics};
use crate::{Bar, IndicatorSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub bars_processed: usize,
    pub opens: usize,
    pub closes: usize,
    pub metrics: GridMetrics,
    pub trades: Vec<CompletedTrade>,
}

/// Step `engine` through `bars`, pairing each with the snapshot at the same index
pub fn run<E: DecisionEngine>(
    engine: &mut E,
    bars: &[Bar],
    snapshots: &[IndicatorSnapshot],
) -> Result<ReplayReport> {
    ensure!(
        bars.len() == snapshots.len(),
        "bar and indicator series differ in length ({} vs {})",
        bars.len(),
        snapshots.len()
    );

    let mut opens = 0;
    let mut closes = 0;
    let mut trades = Vec::new();

    for (bar, snapshot) in bars.iter().zip(snapshots) {
        let decision = engine.step(bar, snapshot);
        opens += decision.opened.len();
        closes += decision.closed.len();
        trades.extend(decision.closed);
    }

    let metrics = engine.metrics();
    info!(
        bars = bars.len(),
        opens,
        closes,
        fill_rate = format!("{:.2}%", metrics.fill_rate * 100.0),
        total_pnl = %metrics.total_pnl.round_dp(6),
        "Replay complete"
    );

    Ok(ReplayReport {
        bars_processed: bars.len(),
        opens,
        closes,
        metrics,
        trades,
    })
}
