//! Take-profit and stop-loss decisions for open positions

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::position::Position;
use crate::Direction;

const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

pub struct ExitEvaluator<'a> {
    config: &'a GridConfig,
}

impl<'a> ExitEvaluator<'a> {
    pub fn new(config: &'a GridConfig) -> Self {
        Self { config }
    }

    /// Favorable move measured in base spacing units
    pub fn grid_moves(&self, position: &Position, price: Decimal) -> Decimal {
        position.price_change(price) / (self.config.spacing_pct / HUNDRED)
    }

    /// Stop price for `direction` around a grid `center`
    pub fn stop_price(&self, center: Decimal, direction: Direction) -> Decimal {
        match direction {
            Direction::Long => {
                let distance = (self.config.lower_bound_pct + self.config.stop_loss_pct) / HUNDRED;
                center * (Decimal::ONE - distance)
            }
            Direction::Short => {
                let distance = (self.config.upper_bound_pct + self.config.stop_loss_pct) / HUNDRED;
                center * (Decimal::ONE + distance)
            }
        }
    }

    /// Take-profit wins when both conditions hold on the same bar.
    ///
    /// The stop is measured from the center of the grid the position was
    /// opened in, not from the current one.
    pub fn evaluate(&self, position: &Position, price: Decimal) -> Option<ExitReason> {
        if self.grid_moves(position, price) >= self.config.take_profit_grids {
            return Some(ExitReason::TakeProfit);
        }

        let stop = self.stop_price(position.origin.center, position.direction);
        let stopped = match position.direction {
            Direction::Long => price <= stop,
            Direction::Short => price >= stop,
        };
        stopped.then_some(ExitReason::StopLoss)
    }
}
