//! Grid ladder
//!
//! A `Grid` is a ladder of buy levels below and sell levels above a center
//! price. Ladders are never patched: a rebalance or trail replaces the whole
//! grid, which also resets every level's `filled` flag.

mod builder;

pub use builder::GridInitializer;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::BiasMode;
use crate::position::PositionId;
use crate::Side;

/// A single trigger price on the ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub price: Decimal,
    pub side: Side,
    /// Fraction of capital committed when this level fills
    pub size: Decimal,
    pub filled: bool,
    pub position_ref: Option<PositionId>,
    pub entry_time: Option<DateTime<Utc>>,
}

impl GridLevel {
    pub fn new(price: Decimal, side: Side, size: Decimal) -> Self {
        Self {
            price,
            side,
            size,
            filled: false,
            position_ref: None,
            entry_time: None,
        }
    }

    pub(crate) fn mark_filled(&mut self, position: PositionId, time: DateTime<Utc>) {
        self.filled = true;
        self.position_ref = Some(position);
        self.entry_time = Some(time);
    }

    /// Re-arm the level after its position took profit
    pub(crate) fn rearm(&mut self) {
        self.filled = false;
        self.position_ref = None;
        self.entry_time = None;
    }

    /// Detach the closed position but keep the level blocked
    pub(crate) fn release_blocked(&mut self) {
        self.position_ref = None;
    }
}

/// Full ladder around a center price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub center_price: Decimal,
    /// Ordered nearest-to-center first
    pub buy_levels: Vec<GridLevel>,
    /// Ordered nearest-to-center first
    pub sell_levels: Vec<GridLevel>,
    pub bias_mode: BiasMode,
    /// Cleared when a rebuild fails; an inactive ladder never fills
    pub active: bool,
    pub last_rebalance_time: DateTime<Utc>,
    /// Build counter; positions remember the generation they were opened in
    pub generation: u64,
    /// Spacing actually used, percent of center
    pub spacing_pct: Decimal,
    pub upper_bound: Decimal,
    pub lower_bound: Decimal,
}

impl Grid {
    pub fn levels(&self, side: Side) -> &[GridLevel] {
        match side {
            Side::Buy => &self.buy_levels,
            Side::Sell => &self.sell_levels,
        }
    }

    pub(crate) fn levels_mut(&mut self, side: Side) -> &mut [GridLevel] {
        match side {
            Side::Buy => &mut self.buy_levels,
            Side::Sell => &mut self.sell_levels,
        }
    }

    /// Level identified by (price, side)
    pub fn level(&self, side: Side, price: Decimal) -> Option<&GridLevel> {
        self.levels(side).iter().find(|l| l.price == price)
    }

    pub(crate) fn level_mut(&mut self, side: Side, price: Decimal) -> Option<&mut GridLevel> {
        self.levels_mut(side).iter_mut().find(|l| l.price == price)
    }

    pub fn filled_count(&self, side: Side) -> usize {
        self.levels(side).iter().filter(|l| l.filled).count()
    }

    pub fn total_levels(&self) -> usize {
        self.buy_levels.len() + self.sell_levels.len()
    }

    pub fn filled_levels(&self) -> usize {
        self.filled_count(Side::Buy) + self.filled_count(Side::Sell)
    }

    /// |price - center| / center
    pub fn deviation(&self, price: Decimal) -> Decimal {
        if self.center_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (price - self.center_price).abs() / self.center_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn sample_grid() -> Grid {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Grid {
            center_price: dec!(100),
            buy_levels: vec![
                GridLevel::new(dec!(99), Side::Buy, dec!(0.1)),
                GridLevel::new(dec!(98), Side::Buy, dec!(0.1)),
            ],
            sell_levels: vec![GridLevel::new(dec!(101), Side::Sell, dec!(0.1))],
            bias_mode: BiasMode::Neutral,
            active: true,
            last_rebalance_time: ts,
            generation: 1,
            spacing_pct: dec!(1),
            upper_bound: dec!(105),
            lower_bound: dec!(95),
        }
    }

    #[test]
    fn test_level_lifecycle() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut level = GridLevel::new(dec!(99), Side::Buy, dec!(0.1));
        assert!(!level.filled);

        level.mark_filled(PositionId(7), ts);
        assert!(level.filled);
        assert_eq!(level.position_ref, Some(PositionId(7)));
        assert_eq!(level.entry_time, Some(ts));

        level.release_blocked();
        assert!(level.filled);
        assert_eq!(level.position_ref, None);

        level.rearm();
        assert!(!level.filled);
        assert_eq!(level.entry_time, None);
    }

    #[test]
    fn test_grid_counts() {
        let mut grid = sample_grid();
        assert_eq!(grid.total_levels(), 3);
        assert_eq!(grid.filled_levels(), 0);

        let ts = grid.last_rebalance_time;
        grid.level_mut(Side::Buy, dec!(98))
            .unwrap()
            .mark_filled(PositionId(1), ts);
        assert_eq!(grid.filled_count(Side::Buy), 1);
        assert_eq!(grid.filled_count(Side::Sell), 0);
        assert!(grid.level(Side::Sell, dec!(98)).is_none());
    }

    #[test]
    fn test_deviation() {
        let grid = sample_grid();
        assert_eq!(grid.deviation(dec!(105)), dec!(0.05));
        assert_eq!(grid.deviation(dec!(95)), dec!(0.05));
    }
}
