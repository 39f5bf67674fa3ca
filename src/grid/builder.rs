//! Ladder construction around a center price

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{Grid, GridLevel};
use crate::config::{BiasMode, GridConfig};
use crate::error::{GridError, GridResult};
use crate::{Side, Trend};

const HUNDRED: Decimal = dec!(100);

/// Builds complete ladders from the engine configuration
pub struct GridInitializer<'a> {
    config: &'a GridConfig,
}

impl<'a> GridInitializer<'a> {
    pub fn new(config: &'a GridConfig) -> Self {
        Self { config }
    }

    /// Base spacing widened by `1 + volatility_ratio` when a ratio is given
    pub fn adjusted_spacing(&self, volatility_ratio: Option<Decimal>) -> Decimal {
        match volatility_ratio {
            Some(ratio) => self.config.spacing_pct * (Decimal::ONE + ratio),
            None => self.config.spacing_pct,
        }
    }

    /// (buy, sell) level counts for the configured bias.
    /// `trend` is only consulted in adaptive mode.
    pub fn level_counts(&self, trend: Trend) -> (usize, usize) {
        let n = self.config.grid_levels;
        match self.config.bias_mode {
            BiasMode::Neutral => (n, n),
            BiasMode::LongBias => (n * 3 / 2, n / 2),
            BiasMode::ShortBias => (n / 2, n * 3 / 2),
            BiasMode::Adaptive => match trend {
                Trend::Up => (n * 13 / 10, n * 7 / 10),
                Trend::Down => (n * 7 / 10, n * 13 / 10),
                Trend::Flat => (n, n),
            },
        }
    }

    /// Size of the `index`-th level (1-based) on either side
    pub fn level_size(&self, index: usize) -> Decimal {
        let base = self.config.position_per_grid;
        if !self.config.pyramid_mode {
            return base;
        }
        let steps = Decimal::from(index.saturating_sub(1));
        base * (Decimal::ONE + steps * dec!(0.1) * self.config.pyramid_factor)
    }

    /// Build a fresh ladder with every level unfilled
    pub fn build(
        &self,
        center: Decimal,
        volatility_ratio: Option<Decimal>,
        trend: Trend,
        generation: u64,
        now: DateTime<Utc>,
    ) -> GridResult<Grid> {
        if center <= Decimal::ZERO {
            return Err(GridError::InvalidCenterPrice(center));
        }

        let spacing = self.adjusted_spacing(volatility_ratio);
        if spacing <= Decimal::ZERO {
            return Err(GridError::InvalidSpacing(spacing));
        }

        let lower_bound = center * (Decimal::ONE - self.config.lower_bound_pct / HUNDRED);
        let upper_bound = center * (Decimal::ONE + self.config.upper_bound_pct / HUNDRED);
        let (buy_count, sell_count) = self.level_counts(trend);

        let buy_levels = (1..=buy_count)
            .map(|i| {
                let offset = spacing * Decimal::from(i) / HUNDRED;
                (i, center * (Decimal::ONE - offset))
            })
            .filter(|&(_, price)| price >= lower_bound && price > Decimal::ZERO)
            .map(|(i, price)| GridLevel::new(price, Side::Buy, self.level_size(i)))
            .collect();

        let sell_levels = (1..=sell_count)
            .map(|i| {
                let offset = spacing * Decimal::from(i) / HUNDRED;
                (i, center * (Decimal::ONE + offset))
            })
            .filter(|&(_, price)| price <= upper_bound)
            .map(|(i, price)| GridLevel::new(price, Side::Sell, self.level_size(i)))
            .collect();

        Ok(Grid {
            center_price: center,
            buy_levels,
            sell_levels,
            bias_mode: self.config.bias_mode,
            active: true,
            last_rebalance_time: now,
            generation,
            spacing_pct: spacing,
            upper_bound,
            lower_bound,
        })
    }
}
