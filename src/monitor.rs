//! Rebalance and trail triggers
//!
//! Both monitors only decide. The engine performs the rebuild, always at the
//! current close, and never touches open positions when it does.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::grid::Grid;
use crate::{Side, Trend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceReason {
    /// Price drifted further from center than `rebalance_threshold`
    PriceDeviation,
    /// Too many levels on one side are already filled
    FillSaturation(Side),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailDirection {
    Up,
    Down,
}

pub struct RebalanceMonitor<'a> {
    config: &'a GridConfig,
}

impl<'a> RebalanceMonitor<'a> {
    pub fn new(config: &'a GridConfig) -> Self {
        Self { config }
    }

    pub fn check(&self, grid: &Grid, price: Decimal) -> Option<RebalanceReason> {
        if grid.deviation(price) > self.config.rebalance_threshold {
            return Some(RebalanceReason::PriceDeviation);
        }

        [Side::Buy, Side::Sell]
            .into_iter()
            .find(|&side| self.side_saturated(grid, side))
            .map(RebalanceReason::FillSaturation)
    }

    fn side_saturated(&self, grid: &Grid, side: Side) -> bool {
        let total = grid.levels(side).len();
        if total == 0 {
            return false;
        }
        let ratio = Decimal::from(grid.filled_count(side)) / Decimal::from(total);
        ratio > self.config.rebalance_fill_ratio
    }
}

pub struct TrailMonitor<'a> {
    config: &'a GridConfig,
}

impl<'a> TrailMonitor<'a> {
    pub fn new(config: &'a GridConfig) -> Self {
        Self { config }
    }

    /// Trail only when the move beyond `trailing_threshold` agrees with the trend
    pub fn check(&self, grid: &Grid, price: Decimal, trend: Trend) -> Option<TrailDirection> {
        if !self.config.trailing_grid {
            return None;
        }
        if grid.deviation(price) <= self.config.trailing_threshold {
            return None;
        }

        match trend {
            Trend::Up if price > grid.center_price => Some(TrailDirection::Up),
            Trend::Down if price < grid.center_price => Some(TrailDirection::Down),
            _ => None,
        }
    }
}
