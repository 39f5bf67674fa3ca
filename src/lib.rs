//! Grid Trading Decision Engine
//!
//! Maintains a ladder of buy levels below and sell levels above a moving
//! center price, and turns each incoming bar into open/close decisions for
//! one trading symbol.
//!
//! - Volatility-adjusted spacing with neutral, long, short or trend-adaptive bias
//! - Optional pyramiding of level sizes away from center
//! - Full rebuilds on price deviation or fill saturation, trailing on
//!   confirmed trends
//! - Take-profit in grid moves, stop-loss beyond the grid bounds
//!
//! The engine performs no I/O. The caller owns the bar loop, computes the
//! indicator series upstream and executes whatever the engine decides.
//!
//! ## Example
//! ```no_run
//! use grid_engine::{Bar, DecisionEngine, GridConfig, GridEngine, IndicatorSnapshot, Symbol};
//! use rust_decimal_macros::dec;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut engine = GridEngine::new(Symbol::new("BTCUSDT"), GridConfig::default())?;
//!     let bar = Bar::at_price(chrono::Utc::now(), dec!(50000));
//!     let indicators = IndicatorSnapshot::new(Some(400.0), 50100.0, 49800.0, 45.0);
//!
//!     engine.step(&bar, &indicators);
//!     if engine.should_open_long() {
//!         println!("buy {:?}", engine.current_order_size());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod exit;
pub mod fill;
pub mod grid;
pub mod indicators;
pub mod metrics;
pub mod monitor;
pub mod position;
pub mod replay;
pub mod types;

pub use config::{BiasMode, Config, GridConfig, IndicatorConfig};
pub use engine::{Decision, DecisionEngine, GridEngine, SharedEngine};
pub use error::{ConfigError, GridError, GridResult};
pub use exit::ExitReason;
pub use grid::{Grid, GridLevel};
pub use metrics::{CompletedTrade, GridMetrics};
pub use position::{Position, PositionId};
pub use types::*;
