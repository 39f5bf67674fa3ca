//! Grid decision engine
//!
//! One `GridEngine` per symbol. The caller owns the bar loop and feeds each
//! bar with its indicator snapshot through `step`; the engine answers with a
//! `Decision` and keeps the four boolean queries pointing at it until the
//! next bar.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::config::GridConfig;
use crate::error::GridResult;
use crate::exit::{ExitEvaluator, ExitReason};
use crate::fill::{Fill, FillDetector};
use crate::grid::{Grid, GridInitializer};
use crate::metrics::{CompletedTrade, EngineCounters, GridMetrics, MetricsAggregator};
use crate::monitor::{RebalanceMonitor, TrailMonitor};
use crate::position::{LevelOrigin, PositionId, PositionTracker};
use crate::{Bar, Direction, IndicatorSnapshot, Side, Symbol};

// =============================================================================
// DecisionEngine Trait
// =============================================================================

/// Bar-driven trading decisions.
///
/// The queries report on the most recent `step`; calling them never changes
/// state.
pub trait DecisionEngine: Send + Sync {
    fn step(&mut self, bar: &Bar, indicators: &IndicatorSnapshot) -> Decision;

    fn should_open_long(&self) -> bool;

    fn should_open_short(&self) -> bool;

    fn should_close_long(&self) -> bool;

    fn should_close_short(&self) -> bool;

    /// Size of the order opened by the last step, if any
    fn current_order_size(&self) -> Option<Decimal>;

    fn metrics(&self) -> GridMetrics;
}

/// Outcome of a single bar
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub open_long: bool,
    pub open_short: bool,
    pub close_long: bool,
    pub close_short: bool,
    pub order_size: Option<Decimal>,
    pub opened: Vec<PositionId>,
    pub closed: Vec<CompletedTrade>,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }

    fn record_open(&mut self, id: PositionId, fill: &Fill) {
        match fill.side.direction() {
            Direction::Long => self.open_long = true,
            Direction::Short => self.open_short = true,
        }
        if self.order_size.is_none() {
            self.order_size = Some(fill.size);
        }
        self.opened.push(id);
    }

    fn record_close(&mut self, trade: CompletedTrade) {
        match trade.direction {
            Direction::Long => self.close_long = true,
            Direction::Short => self.close_short = true,
        }
        self.closed.push(trade);
    }
}

// =============================================================================
// GridEngine
// =============================================================================

#[derive(Debug)]
pub struct GridEngine {
    symbol: Symbol,
    config: GridConfig,
    grid: Option<Grid>,
    positions: PositionTracker,
    trades: Vec<CompletedTrade>,
    counters: EngineCounters,
    last_decision: Decision,
    last_timestamp: Option<DateTime<Utc>>,
}

impl GridEngine {
    /// Validates `config`; an invalid configuration never produces an engine
    pub fn new(symbol: Symbol, config: GridConfig) -> GridResult<Self> {
        config.validate()?;
        Ok(Self {
            symbol,
            config,
            grid: None,
            positions: PositionTracker::new(),
            trades: Vec::new(),
            counters: EngineCounters::default(),
            last_decision: Decision::default(),
            last_timestamp: None,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Current ladder, `None` until the first warmed-up bar
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn positions(&self) -> &PositionTracker {
        &self.positions
    }

    pub fn trades(&self) -> &[CompletedTrade] {
        &self.trades
    }

    pub fn counters(&self) -> EngineCounters {
        self.counters
    }

    pub fn last_decision(&self) -> &Decision {
        &self.last_decision
    }

    fn build_grid(
        &self,
        price: Decimal,
        indicators: &IndicatorSnapshot,
        generation: u64,
        now: DateTime<Utc>,
    ) -> GridResult<Grid> {
        let volatility = if self.config.volatility_spacing {
            indicators.volatility_ratio(price)
        } else {
            None
        };
        let grid = GridInitializer::new(&self.config).build(
            price,
            volatility,
            indicators.trend(),
            generation,
            now,
        )?;

        info!(
            symbol = %self.symbol,
            center = %grid.center_price,
            spacing_pct = %grid.spacing_pct.round_dp(4),
            buy_levels = grid.buy_levels.len(),
            sell_levels = grid.sell_levels.len(),
            generation,
            "Grid built"
        );
        Ok(grid)
    }

    /// Lazy init on the first warmed-up bar, then rebalance or trail.
    ///
    /// A failed rebuild leaves the old ladder in place but inactive; the next
    /// warmed-up bar rebuilds it unconditionally.
    fn maintain_grid(&mut self, bar: &Bar, indicators: &IndicatorSnapshot) -> GridResult<()> {
        let result = self.refresh_grid(bar, indicators);
        if result.is_err() {
            if let Some(grid) = self.grid.as_mut() {
                grid.active = false;
            }
        }
        result
    }

    fn refresh_grid(&mut self, bar: &Bar, indicators: &IndicatorSnapshot) -> GridResult<()> {
        let price = bar.close;
        let Some(grid) = self.grid.as_ref() else {
            self.grid = Some(self.build_grid(price, indicators, 1, bar.timestamp)?);
            return Ok(());
        };

        let generation = grid.generation + 1;
        if !grid.active {
            info!(
                symbol = %self.symbol,
                old_center = %grid.center_price,
                price = %price,
                "Rebuilding inactive grid"
            );
            self.grid = Some(self.build_grid(price, indicators, generation, bar.timestamp)?);
        } else if let Some(reason) = RebalanceMonitor::new(&self.config).check(grid, price) {
            info!(
                symbol = %self.symbol,
                old_center = %grid.center_price,
                price = %price,
                reason = ?reason,
                open_positions = self.positions.len(),
                "Rebalancing grid"
            );
            self.grid = Some(self.build_grid(price, indicators, generation, bar.timestamp)?);
            self.counters.rebalances += 1;
        } else if let Some(direction) =
            TrailMonitor::new(&self.config).check(grid, price, indicators.trend())
        {
            info!(
                symbol = %self.symbol,
                old_center = %grid.center_price,
                price = %price,
                direction = ?direction,
                "Trailing grid"
            );
            self.grid = Some(self.build_grid(price, indicators, generation, bar.timestamp)?);
            self.counters.trails += 1;
        }
        Ok(())
    }

    fn process_fills(&mut self, bar: &Bar, indicators: &IndicatorSnapshot, decision: &mut Decision) {
        for side in [Side::Buy, Side::Sell] {
            let Some(grid) = self.grid.as_ref() else {
                return;
            };
            let fill = FillDetector::new(&self.config).detect(
                grid,
                side,
                bar.close,
                indicators.oscillator(),
                self.positions.len(),
            );
            let Some(fill) = fill else {
                continue;
            };
            let origin = LevelOrigin {
                price: fill.level_price,
                side: fill.side,
                generation: grid.generation,
                center: grid.center_price,
            };
            if self.positions.has_open_from(&origin) {
                debug!(
                    symbol = %self.symbol,
                    level = %fill.level_price,
                    side = ?fill.side,
                    "Level already backs an open position"
                );
                continue;
            }
            let id = self.open_position(&fill, origin, bar.timestamp);
            decision.record_open(id, &fill);
        }
    }

    fn open_position(
        &mut self,
        fill: &Fill,
        origin: LevelOrigin,
        time: DateTime<Utc>,
    ) -> PositionId {
        let direction = fill.side.direction();
        let id = self
            .positions
            .open(fill.level_price, direction, fill.size, time, origin);

        if let Some(level) = self
            .grid
            .as_mut()
            .and_then(|g| g.level_mut(fill.side, fill.level_price))
        {
            level.mark_filled(id, time);
        }

        debug!(
            symbol = %self.symbol,
            id = %id,
            level = %fill.level_price,
            direction = ?direction,
            size = %fill.size,
            boosted = fill.boosted,
            "Position opened"
        );
        id
    }

    fn process_exits(&mut self, price: Decimal, time: DateTime<Utc>, decision: &mut Decision) {
        let evaluator = ExitEvaluator::new(&self.config);
        let exits: Vec<(PositionId, ExitReason)> = self
            .positions
            .iter()
            .filter_map(|p| evaluator.evaluate(p, price).map(|r| (p.id, r)))
            .collect();

        for (id, reason) in exits {
            if let Some(trade) = self.close_position(id, reason, price, time) {
                decision.record_close(trade);
            }
        }
    }

    fn close_position(
        &mut self,
        id: PositionId,
        reason: ExitReason,
        price: Decimal,
        time: DateTime<Utc>,
    ) -> Option<CompletedTrade> {
        let position = self.positions.close(id)?;
        let pnl = position.price_change(price) * position.size;
        let origin = position.origin;

        // Levels from a discarded ladder are gone; only the live one is touched
        let level = self
            .grid
            .as_mut()
            .filter(|g| g.generation == origin.generation)
            .and_then(|g| g.level_mut(origin.side, origin.price));

        match reason {
            ExitReason::TakeProfit => {
                self.counters.consecutive_losses = 0;
                if let Some(level) = level {
                    level.rearm();
                }
            }
            ExitReason::StopLoss => {
                self.counters.consecutive_losses += 1;
                if let Some(level) = level {
                    level.release_blocked();
                }
            }
        }

        debug!(
            symbol = %self.symbol,
            id = %id,
            entry = %position.entry_price,
            exit = %price,
            direction = ?position.direction,
            pnl = %pnl.round_dp(6),
            reason = ?reason,
            "Position closed"
        );

        let trade = CompletedTrade {
            entry_price: position.entry_price,
            exit_price: price,
            pnl,
            direction: position.direction,
            entry_time: position.entry_time,
            exit_time: time,
            reason,
        };
        self.trades.push(trade.clone());
        Some(trade)
    }

    fn finish(&mut self, decision: Decision) -> Decision {
        self.last_decision = decision.clone();
        decision
    }
}

impl DecisionEngine for GridEngine {
    fn step(&mut self, bar: &Bar, indicators: &IndicatorSnapshot) -> Decision {
        if let Some(previous) = self.last_timestamp {
            if bar.timestamp <= previous {
                warn!(
                    symbol = %self.symbol,
                    timestamp = %bar.timestamp,
                    previous = %previous,
                    "Ignoring out-of-order bar"
                );
                return self.finish(Decision::default());
            }
        }
        self.last_timestamp = Some(bar.timestamp);

        let mut decision = Decision::default();

        if !indicators.is_warmed_up() {
            self.process_exits(bar.close, bar.timestamp, &mut decision);
            return self.finish(decision);
        }

        if let Err(e) = self.maintain_grid(bar, indicators) {
            warn!(symbol = %self.symbol, price = %bar.close, error = %e, "Grid rebuild failed");
            self.process_exits(bar.close, bar.timestamp, &mut decision);
            return self.finish(decision);
        }

        self.process_fills(bar, indicators, &mut decision);
        self.process_exits(bar.close, bar.timestamp, &mut decision);
        self.finish(decision)
    }

    fn should_open_long(&self) -> bool {
        self.last_decision.open_long
    }

    fn should_open_short(&self) -> bool {
        self.last_decision.open_short
    }

    fn should_close_long(&self) -> bool {
        self.last_decision.close_long
    }

    fn should_close_short(&self) -> bool {
        self.last_decision.close_short
    }

    fn current_order_size(&self) -> Option<Decimal> {
        self.last_decision.order_size
    }

    fn metrics(&self) -> GridMetrics {
        MetricsAggregator::compute(
            self.grid.as_ref(),
            &self.positions,
            &self.trades,
            self.counters,
        )
    }
}

// =============================================================================
// SharedEngine
// =============================================================================

/// Engine behind a single lock, for a market-data callback and a monitoring
/// task that both need the same symbol's state.
#[derive(Debug, Clone)]
pub struct SharedEngine(Arc<Mutex<GridEngine>>);

impl SharedEngine {
    pub fn new(engine: GridEngine) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    // step never panics on market data; a poisoned lock is taken over as-is
    fn lock(&self) -> MutexGuard<'_, GridEngine> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn step(&self, bar: &Bar, indicators: &IndicatorSnapshot) -> Decision {
        self.lock().step(bar, indicators)
    }

    pub fn metrics(&self) -> GridMetrics {
        self.lock().metrics()
    }

    /// Run `f` against the engine while holding the lock
    pub fn with<R>(&self, f: impl FnOnce(&GridEngine) -> R) -> R {
        f(&self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, GridError};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i)
    }

    fn warm() -> IndicatorSnapshot {
        IndicatorSnapshot::new(None, 100.0, 100.0, 50.0)
    }

    fn engine() -> GridEngine {
        GridEngine::new(Symbol::new("BTCUSDT"), GridConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_refused() {
        let config = GridConfig {
            grid_levels: 0,
            ..GridConfig::default()
        };
        let err = GridEngine::new(Symbol::new("BTCUSDT"), config).unwrap_err();
        assert_eq!(err, GridError::Config(ConfigError::ZeroGridLevels));
    }

    #[test]
    fn test_no_grid_during_warmup() {
        let mut engine = engine();
        let decision = engine.step(&Bar::at_price(ts(0), dec!(50000)), &IndicatorSnapshot::default());
        assert!(decision.is_empty());
        assert!(engine.grid().is_none());
        assert!(!engine.should_open_long());
        assert!(!engine.should_open_short());
        assert_eq!(engine.current_order_size(), None);
    }

    #[test]
    fn test_first_warm_bar_builds_grid() {
        let mut engine = engine();
        engine.step(&Bar::at_price(ts(0), dec!(50000)), &warm());
        let grid = engine.grid().unwrap();
        assert_eq!(grid.center_price, dec!(50000));
        assert_eq!(grid.generation, 1);
        assert_eq!(grid.total_levels(), 10);
    }

    #[test]
    fn test_fill_opens_long() {
        let mut engine = engine();
        engine.step(&Bar::at_price(ts(0), dec!(50000)), &warm());
        let decision = engine.step(&Bar::at_price(ts(1), dec!(49500)), &warm());

        assert!(decision.open_long);
        assert!(!decision.open_short);
        assert_eq!(decision.order_size, Some(dec!(0.1)));
        assert!(engine.should_open_long());
        assert_eq!(engine.current_order_size(), Some(dec!(0.1)));

        let id = decision.opened[0];
        let position = engine.positions().get(id).unwrap();
        assert_eq!(position.entry_price, dec!(49500));
        assert_eq!(position.direction, Direction::Long);

        let level = engine.grid().unwrap().level(Side::Buy, dec!(49500)).unwrap();
        assert!(level.filled);
        assert_eq!(level.position_ref, Some(id));
        assert_eq!(level.entry_time, Some(ts(1)));
    }

    #[test]
    fn test_out_of_order_bar_ignored() {
        let mut engine = engine();
        engine.step(&Bar::at_price(ts(0), dec!(50000)), &warm());
        engine.step(&Bar::at_price(ts(2), dec!(49500)), &warm());
        assert!(engine.should_open_long());

        let decision = engine.step(&Bar::at_price(ts(1), dec!(49000)), &warm());
        assert!(decision.is_empty());
        assert!(!engine.should_open_long());
        assert_eq!(engine.positions().len(), 1);

        let decision = engine.step(&Bar::at_price(ts(2), dec!(49000)), &warm());
        assert!(decision.is_empty());
    }

    #[test]
    fn test_take_profit_rearms_level() {
        let mut engine = engine();
        engine.step(&Bar::at_price(ts(0), dec!(50000)), &warm());
        engine.step(&Bar::at_price(ts(1), dec!(49500)), &warm());

        // clear of the 50500 sell level so nothing new opens
        let decision = engine.step(&Bar::at_price(ts(2), dec!(50600)), &warm());
        assert!(decision.close_long);
        assert!(!decision.open_short);
        assert_eq!(decision.closed[0].reason, ExitReason::TakeProfit);
        assert!(decision.closed[0].pnl > Decimal::ZERO);
        assert!(engine.positions().is_empty());

        let level = engine.grid().unwrap().level(Side::Buy, dec!(49500)).unwrap();
        assert!(!level.filled);
        assert_eq!(level.position_ref, None);
        assert_eq!(engine.counters().consecutive_losses, 0);
    }

    #[test]
    fn test_failed_rebuild_deactivates_grid() {
        let mut engine = engine();
        engine.step(&Bar::at_price(ts(0), dec!(50000)), &warm());

        // a zero close breaks the deviation threshold but cannot center a ladder
        let decision = engine.step(&Bar::at_price(ts(1), Decimal::ZERO), &warm());
        assert!(decision.is_empty());
        let grid = engine.grid().unwrap();
        assert!(!grid.active);
        assert_eq!(grid.generation, 1);

        // back near the old center: no rebalance trigger, rebuilt anyway
        let decision = engine.step(&Bar::at_price(ts(2), dec!(49500)), &warm());
        assert!(!decision.open_long);
        let grid = engine.grid().unwrap();
        assert!(grid.active);
        assert_eq!(grid.generation, 2);
        assert_eq!(grid.center_price, dec!(49500));
        assert_eq!(engine.counters().rebalances, 0);
    }

    #[test]
    fn test_origin_with_open_position_not_reopened() {
        let mut engine = engine();
        engine.step(&Bar::at_price(ts(0), dec!(50000)), &warm());
        engine.step(&Bar::at_price(ts(1), dec!(49500)), &warm());
        assert_eq!(engine.positions().len(), 1);

        let level = engine
            .grid
            .as_mut()
            .and_then(|g| g.level_mut(Side::Buy, dec!(49500)))
            .unwrap();
        level.rearm();

        let decision = engine.step(&Bar::at_price(ts(2), dec!(49500)), &warm());
        assert!(!decision.open_long);
        assert_eq!(engine.positions().len(), 1);
    }

    #[test]
    fn test_stop_survives_rebalance() {
        let mut engine = engine();
        engine.step(&Bar::at_price(ts(0), dec!(50000)), &warm());
        let opened = engine.step(&Bar::at_price(ts(1), dec!(49500)), &warm());
        let id = opened.opened[0];
        assert_eq!(engine.positions().get(id).unwrap().origin.center, dec!(50000));

        // gap far enough to rebalance and to reach 50000 * 0.87
        let decision = engine.step(&Bar::at_price(ts(2), dec!(43500)), &warm());
        assert_eq!(engine.grid().unwrap().center_price, dec!(43500));
        assert!(decision.close_long);
        assert_eq!(decision.closed[0].reason, ExitReason::StopLoss);
        assert_eq!(engine.counters().consecutive_losses, 1);
    }

    #[test]
    fn test_shared_engine_recovers_state() {
        let shared = SharedEngine::new(engine());
        shared.step(&Bar::at_price(ts(0), dec!(50000)), &warm());
        shared.step(&Bar::at_price(ts(1), dec!(50500)), &warm());

        assert_eq!(shared.metrics().active_positions, 1);
        assert!(shared.with(|e| e.should_open_short()));
    }
}
