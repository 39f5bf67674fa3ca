//! Open position tracking
//!
//! Positions are keyed by a synthetic id handed out at fill time. Each one
//! carries a copy of the level it came from, so rebuilding the ladder never
//! leaves a position pointing at a level that no longer exists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Direction, Side};

/// Stable identifier assigned when a position opens. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl std::fmt::Display for PositionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The level a position was opened from, copied at fill time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelOrigin {
    pub price: Decimal,
    pub side: Side,
    /// Grid generation the level belonged to
    pub generation: u64,
    /// Center of that grid; the stop-loss stays anchored here across rebuilds
    pub center: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub entry_price: Decimal,
    pub direction: Direction,
    pub size: Decimal,
    pub entry_time: DateTime<Utc>,
    pub origin: LevelOrigin,
}

impl Position {
    /// Signed move in the position's favor, as a fraction of entry
    pub fn price_change(&self, price: Decimal) -> Decimal {
        if self.entry_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self.direction {
            Direction::Long => (price - self.entry_price) / self.entry_price,
            Direction::Short => (self.entry_price - price) / self.entry_price,
        }
    }
}

/// Open positions of one engine instance
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    positions: BTreeMap<PositionId, Position>,
    next_id: u64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(
        &mut self,
        entry_price: Decimal,
        direction: Direction,
        size: Decimal,
        entry_time: DateTime<Utc>,
        origin: LevelOrigin,
    ) -> PositionId {
        self.next_id += 1;
        let id = PositionId(self.next_id);
        self.positions.insert(
            id,
            Position {
                id,
                entry_price,
                direction,
                size,
                entry_time,
                origin,
            },
        );
        id
    }

    pub fn close(&mut self, id: PositionId) -> Option<Position> {
        self.positions.remove(&id)
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    /// Positions in opening order
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn iter_direction(&self, direction: Direction) -> impl Iterator<Item = &Position> {
        self.positions
            .values()
            .filter(move |p| p.direction == direction)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.iter_direction(direction).count()
    }

    /// Whether a position opened from `origin` is still open
    pub fn has_open_from(&self, origin: &LevelOrigin) -> bool {
        self.positions.values().any(|p| p.origin == *origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn origin(price: Decimal, side: Side) -> LevelOrigin {
        LevelOrigin {
            price,
            side,
            generation: 1,
            center: dec!(100),
        }
    }

    #[test]
    fn test_open_and_close() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut tracker = PositionTracker::new();
        assert!(tracker.is_empty());

        let a = tracker.open(dec!(99), Direction::Long, dec!(0.1), ts, origin(dec!(99), Side::Buy));
        let b = tracker.open(dec!(101), Direction::Short, dec!(0.1), ts, origin(dec!(101), Side::Sell));
        assert_ne!(a, b);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.count(Direction::Long), 1);
        assert!(tracker.has_open_from(&origin(dec!(99), Side::Buy)));

        let closed = tracker.close(a).unwrap();
        assert_eq!(closed.entry_price, dec!(99));
        assert!(tracker.close(a).is_none());
        assert!(!tracker.has_open_from(&origin(dec!(99), Side::Buy)));

        // ids are never reused
        let c = tracker.open(dec!(99), Direction::Long, dec!(0.1), ts, origin(dec!(99), Side::Buy));
        assert!(c > b);
    }

    #[test]
    fn test_price_change() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut tracker = PositionTracker::new();
        let long = tracker.open(dec!(100), Direction::Long, dec!(0.1), ts, origin(dec!(100), Side::Buy));
        let short = tracker.open(dec!(100), Direction::Short, dec!(0.1), ts, origin(dec!(100), Side::Sell));

        assert_eq!(tracker.get(long).unwrap().price_change(dec!(102)), dec!(0.02));
        assert_eq!(tracker.get(short).unwrap().price_change(dec!(102)), dec!(-0.02));
    }
}
