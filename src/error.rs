//! Error types for grid construction and configuration

use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration rejected at construction time
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("grid_levels must be greater than 0")]
    ZeroGridLevels,

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: Decimal },

    #[error("position_per_grid must be in (0, 1], got {0}")]
    PositionSizeOutOfRange(Decimal),

    #[error("max_concurrent_positions must be greater than 0")]
    ZeroMaxPositions,

    #[error("fill_tolerance must be in (0, 1), got {0}")]
    FillToleranceOutOfRange(Decimal),

    #[error("extreme_boost_factor must be >= 1, got {0}")]
    BoostFactorTooSmall(Decimal),

    #[error("oscillator levels must satisfy 0 <= oversold ({oversold}) < overbought ({overbought}) <= 100")]
    OscillatorLevels { oversold: f64, overbought: f64 },

    #[error("rebalance_fill_ratio must be in (0, 1], got {0}")]
    FillRatioOutOfRange(Decimal),

    #[error("indicator period {name} must be greater than 0")]
    ZeroPeriod { name: &'static str },

    #[error("sma_fast_period ({fast}) must be shorter than sma_slow_period ({slow})")]
    AveragePeriods { fast: usize, slow: usize },
}

/// Errors raised while (re)building the grid
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GridError {
    #[error("center price must be positive, got {0}")]
    InvalidCenterPrice(Decimal),

    #[error("adjusted spacing must be positive, got {0}")]
    InvalidSpacing(Decimal),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type GridResult<T> = Result<T, GridError>;
