//! Completed trade log and derived grid statistics
//!
//! Everything here is computed on demand from engine state. Nothing is cached,
//! so asking twice without a new bar gives the same answer.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exit::ExitReason;
use crate::grid::Grid;
use crate::position::PositionTracker;
use crate::Direction;

/// A closed grid position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTrade {
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Price change fraction times position size
    pub pnl: Decimal,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub reason: ExitReason,
}

impl CompletedTrade {
    pub fn duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }
}

/// Counters the engine keeps between bars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub consecutive_losses: u32,
    pub rebalances: u64,
    pub trails: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridMetrics {
    pub fill_rate: f64,
    pub active_positions: usize,
    pub completed_trades: usize,
    pub avg_trade_profit: Decimal,
    pub consecutive_losses: u32,
    /// `None` until the first grid is built
    pub grid_center: Option<Decimal>,
    pub buy_level_count: usize,
    pub sell_level_count: usize,

    pub long_trades: usize,
    pub short_trades: usize,
    /// Undefined without short trades
    pub long_short_ratio: Option<f64>,
    pub total_pnl: Decimal,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: Option<f64>,
    pub rebalance_count: u64,
    pub trail_count: u64,
}

pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn compute(
        grid: Option<&Grid>,
        positions: &PositionTracker,
        trades: &[CompletedTrade],
        counters: EngineCounters,
    ) -> GridMetrics {
        let fill_rate = match grid {
            Some(g) if g.total_levels() > 0 => g.filled_levels() as f64 / g.total_levels() as f64,
            _ => 0.0,
        };

        let total_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
        let avg_trade_profit = if trades.is_empty() {
            Decimal::ZERO
        } else {
            total_pnl / Decimal::from(trades.len())
        };

        let long_trades = trades
            .iter()
            .filter(|t| t.direction == Direction::Long)
            .count();
        let short_trades = trades.len() - long_trades;
        let long_short_ratio = (short_trades > 0).then(|| long_trades as f64 / short_trades as f64);

        let winning_trades = trades.iter().filter(|t| t.is_win()).count();
        let losing_trades = trades.len() - winning_trades;
        let win_rate = (!trades.is_empty()).then(|| winning_trades as f64 / trades.len() as f64);

        GridMetrics {
            fill_rate,
            active_positions: positions.len(),
            completed_trades: trades.len(),
            avg_trade_profit,
            consecutive_losses: counters.consecutive_losses,
            grid_center: grid.map(|g| g.center_price),
            buy_level_count: grid.map_or(0, |g| g.buy_levels.len()),
            sell_level_count: grid.map_or(0, |g| g.sell_levels.len()),
            long_trades,
            short_trades,
            long_short_ratio,
            total_pnl,
            winning_trades,
            losing_trades,
            win_rate,
            rebalance_count: counters.rebalances,
            trail_count: counters.trails,
        }
    }
}

impl GridMetrics {
    /// Average pnl as f64 for display
    pub fn avg_trade_profit_f64(&self) -> f64 {
        self.avg_trade_profit.to_f64().unwrap_or(0.0)
    }
}
