//! Fill detection against the current ladder

use rust_decimal::Decimal;
use tracing::warn;

use crate::config::GridConfig;
use crate::grid::Grid;
use crate::Side;

/// A level the current close has touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub side: Side,
    pub level_price: Decimal,
    /// Order size after any extreme-condition boost
    pub size: Decimal,
    pub boosted: bool,
}

pub struct FillDetector<'a> {
    config: &'a GridConfig,
}

impl<'a> FillDetector<'a> {
    pub fn new(config: &'a GridConfig) -> Self {
        Self { config }
    }

    /// Unfilled level on `side` nearest to `price` within tolerance; equal
    /// distances go to the level nearer the center. Returns `None` when
    /// nothing matches, the ladder is inactive or the position cap is hit.
    pub fn detect(
        &self,
        grid: &Grid,
        side: Side,
        price: Decimal,
        oscillator: Option<f64>,
        open_positions: usize,
    ) -> Option<Fill> {
        if !grid.active {
            return None;
        }

        let level = grid
            .levels(side)
            .iter()
            .filter(|l| !l.filled && self.within_tolerance(l.price, price))
            .min_by_key(|l| (price - l.price).abs())?;

        if open_positions >= self.config.max_concurrent_positions {
            warn!(
                side = ?side,
                level = %level.price,
                open_positions,
                max = self.config.max_concurrent_positions,
                "Fill rejected: concurrent position limit reached"
            );
            return None;
        }

        let boosted = self.is_extreme(side, oscillator);
        let size = if boosted {
            level.size * self.config.extreme_boost_factor
        } else {
            level.size
        };

        Some(Fill {
            side,
            level_price: level.price,
            size,
            boosted,
        })
    }

    fn within_tolerance(&self, level_price: Decimal, price: Decimal) -> bool {
        if level_price <= Decimal::ZERO {
            return false;
        }
        (price - level_price).abs() / level_price <= self.config.fill_tolerance
    }

    fn is_extreme(&self, side: Side, oscillator: Option<f64>) -> bool {
        match (side, oscillator) {
            (Side::Buy, Some(osc)) => osc < self.config.oversold_level,
            (Side::Sell, Some(osc)) => osc > self.config.overbought_level,
            _ => false,
        }
    }
}
