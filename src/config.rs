//! Configuration management
//!
//! `GridConfig` is the validated parameter set of one engine instance.
//! `Config` is the application file: symbol, engine parameters, indicator
//! periods and replay inputs, loaded from JSON.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::Symbol;

/// Policy controlling the relative number of buy vs sell levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasMode {
    #[default]
    Neutral,
    LongBias,
    ShortBias,
    /// Pick long or short bias from the fast/slow average at build time
    Adaptive,
}

/// Grid engine parameters
///
/// Fields ending in `_pct` are percent units (`1.0` = 1%). `rebalance_threshold`,
/// `trailing_threshold`, `fill_tolerance` and `rebalance_fill_ratio` are plain
/// fractions (`0.05` = 5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Levels per side at neutral bias
    pub grid_levels: usize,
    /// Base distance between adjacent levels, percent of center
    pub spacing_pct: Decimal,
    pub upper_bound_pct: Decimal,
    pub lower_bound_pct: Decimal,
    /// Base size of each level as a fraction of capital
    pub position_per_grid: Decimal,
    pub max_concurrent_positions: usize,
    #[serde(default)]
    pub pyramid_mode: bool,
    #[serde(default = "default_pyramid_factor")]
    pub pyramid_factor: Decimal,
    #[serde(default)]
    pub bias_mode: BiasMode,
    pub rebalance_threshold: Decimal,
    pub take_profit_grids: Decimal,
    pub stop_loss_pct: Decimal,
    #[serde(default)]
    pub trailing_grid: bool,
    #[serde(default = "default_trailing_threshold")]
    pub trailing_threshold: Decimal,

    /// Widen spacing by ATR / center when ATR is available
    #[serde(default = "default_true")]
    pub volatility_spacing: bool,
    /// Relative distance from a level within which the close counts as a touch
    #[serde(default = "default_fill_tolerance")]
    pub fill_tolerance: Decimal,
    /// Size multiplier for fills taken at oscillator extremes
    #[serde(default = "default_boost_factor")]
    pub extreme_boost_factor: Decimal,
    #[serde(default = "default_oversold")]
    pub oversold_level: f64,
    #[serde(default = "default_overbought")]
    pub overbought_level: f64,
    /// Share of filled levels on one side that forces a rebalance
    #[serde(default = "default_fill_ratio")]
    pub rebalance_fill_ratio: Decimal,
}

fn default_true() -> bool {
    true
}

fn default_pyramid_factor() -> Decimal {
    dec!(1.0)
}

fn default_trailing_threshold() -> Decimal {
    dec!(0.02)
}

fn default_fill_tolerance() -> Decimal {
    dec!(0.001)
}

fn default_boost_factor() -> Decimal {
    dec!(1.2)
}

fn default_oversold() -> f64 {
    20.0
}

fn default_overbought() -> f64 {
    80.0
}

fn default_fill_ratio() -> Decimal {
    dec!(0.8)
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            grid_levels: 5,
            spacing_pct: dec!(1.0),
            upper_bound_pct: dec!(5.0),
            lower_bound_pct: dec!(5.0),
            position_per_grid: dec!(0.1),
            max_concurrent_positions: 10,
            pyramid_mode: false,
            pyramid_factor: default_pyramid_factor(),
            bias_mode: BiasMode::Neutral,
            rebalance_threshold: dec!(0.05),
            take_profit_grids: dec!(2),
            stop_loss_pct: dec!(8.0),
            trailing_grid: false,
            trailing_threshold: default_trailing_threshold(),
            volatility_spacing: true,
            fill_tolerance: default_fill_tolerance(),
            extreme_boost_factor: default_boost_factor(),
            oversold_level: default_oversold(),
            overbought_level: default_overbought(),
            rebalance_fill_ratio: default_fill_ratio(),
        }
    }
}

impl GridConfig {
    /// Reject invalid combinations before any bar is processed
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_levels == 0 {
            return Err(ConfigError::ZeroGridLevels);
        }

        let positives = [
            ("spacing_pct", self.spacing_pct),
            ("upper_bound_pct", self.upper_bound_pct),
            ("lower_bound_pct", self.lower_bound_pct),
            ("pyramid_factor", self.pyramid_factor),
            ("rebalance_threshold", self.rebalance_threshold),
            ("take_profit_grids", self.take_profit_grids),
            ("stop_loss_pct", self.stop_loss_pct),
            ("trailing_threshold", self.trailing_threshold),
        ];
        for (name, value) in positives {
            if value <= Decimal::ZERO {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        if self.position_per_grid <= Decimal::ZERO || self.position_per_grid > Decimal::ONE {
            return Err(ConfigError::PositionSizeOutOfRange(self.position_per_grid));
        }

        if self.max_concurrent_positions == 0 {
            return Err(ConfigError::ZeroMaxPositions);
        }

        if self.fill_tolerance <= Decimal::ZERO || self.fill_tolerance >= Decimal::ONE {
            return Err(ConfigError::FillToleranceOutOfRange(self.fill_tolerance));
        }

        if self.extreme_boost_factor < Decimal::ONE {
            return Err(ConfigError::BoostFactorTooSmall(self.extreme_boost_factor));
        }

        let levels_ok = self.oversold_level.is_finite()
            && self.overbought_level.is_finite()
            && self.oversold_level >= 0.0
            && self.oversold_level < self.overbought_level
            && self.overbought_level <= 100.0;
        if !levels_ok {
            return Err(ConfigError::OscillatorLevels {
                oversold: self.oversold_level,
                overbought: self.overbought_level,
            });
        }

        if self.rebalance_fill_ratio <= Decimal::ZERO || self.rebalance_fill_ratio > Decimal::ONE {
            return Err(ConfigError::FillRatioOutOfRange(self.rebalance_fill_ratio));
        }

        Ok(())
    }

    pub fn with_bias(mut self, bias_mode: BiasMode) -> Self {
        self.bias_mode = bias_mode;
        self
    }

    pub fn with_pyramiding(mut self, factor: Decimal) -> Self {
        self.pyramid_mode = true;
        self.pyramid_factor = factor;
        self
    }

    pub fn with_trailing(mut self, threshold: Decimal) -> Self {
        self.trailing_grid = true;
        self.trailing_threshold = threshold;
        self
    }
}

/// Periods of the upstream indicator series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub atr_period: usize,
    pub sma_fast_period: usize,
    pub sma_slow_period: usize,
    pub oscillator_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            atr_period: 14,
            sma_fast_period: 10,
            sma_slow_period: 30,
            oscillator_period: 14,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("atr_period", self.atr_period),
            ("sma_fast_period", self.sma_fast_period),
            ("sma_slow_period", self.sma_slow_period),
            ("oscillator_period", self.oscillator_period),
        ];
        for (name, period) in periods {
            if period == 0 {
                return Err(ConfigError::ZeroPeriod { name });
            }
        }

        if self.sma_fast_period >= self.sma_slow_period {
            return Err(ConfigError::AveragePeriods {
                fast: self.sma_fast_period,
                slow: self.sma_slow_period,
            });
        }

        Ok(())
    }

    /// Bars needed before every snapshot field can be populated
    pub fn warmup_bars(&self) -> usize {
        self.atr_period
            .max(self.sma_slow_period)
            .max(self.oscillator_period)
    }
}

/// Replay inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// CSV with `timestamp,open,high,low,close,volume` rows
    #[serde(default)]
    pub data_file: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub symbol: Symbol,
    pub engine: GridConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl Config {
    /// Load and validate configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .context("Invalid engine configuration")?;
        self.indicators
            .validate()
            .context("Invalid indicator configuration")?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            symbol: Symbol::new("BTCUSDT"),
            engine: GridConfig::default(),
            indicators: IndicatorConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GridConfig::default().validate().is_ok());
        assert!(IndicatorConfig::default().validate().is_ok());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_levels() {
        let config = GridConfig {
            grid_levels: 0,
            ..GridConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroGridLevels));
    }

    #[test]
    fn test_rejects_non_positive_spacing() {
        for spacing in [dec!(0), dec!(-0.5)] {
            let config = GridConfig {
                spacing_pct: spacing,
                ..GridConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::NonPositive {
                    name: "spacing_pct",
                    value: spacing
                })
            );
        }
    }

    #[test]
    fn test_rejects_position_size_out_of_range() {
        for size in [dec!(0), dec!(1.5)] {
            let config = GridConfig {
                position_per_grid: size,
                ..GridConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::PositionSizeOutOfRange(_))
            ));
        }

        let full = GridConfig {
            position_per_grid: dec!(1),
            ..GridConfig::default()
        };
        assert!(full.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_tuning_parameters() {
        let config = GridConfig {
            max_concurrent_positions: 0,
            ..GridConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxPositions));

        let config = GridConfig {
            extreme_boost_factor: dec!(0.9),
            ..GridConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BoostFactorTooSmall(_))
        ));

        let config = GridConfig {
            oversold_level: 80.0,
            overbought_level: 20.0,
            ..GridConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OscillatorLevels { .. })
        ));

        let config = GridConfig {
            rebalance_fill_ratio: dec!(1.1),
            ..GridConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FillRatioOutOfRange(_))
        ));
    }

    #[test]
    fn test_indicator_periods() {
        let config = IndicatorConfig {
            sma_fast_period: 30,
            sma_slow_period: 10,
            ..IndicatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AveragePeriods { .. })
        ));
        assert_eq!(IndicatorConfig::default().warmup_bars(), 30);
    }

    #[test]
    fn test_bias_mode_parsing() {
        let mode: BiasMode = serde_json::from_str("\"long_bias\"").unwrap();
        assert_eq!(mode, BiasMode::LongBias);
        let mode: BiasMode = serde_json::from_str("\"adaptive\"").unwrap();
        assert_eq!(mode, BiasMode::Adaptive);
        assert!(serde_json::from_str::<BiasMode>("\"sideways\"").is_err());
    }

    #[test]
    fn test_config_from_json_defaults() {
        let json = r#"{
            "symbol": "ETHUSDT",
            "engine": {
                "grid_levels": 4,
                "spacing_pct": 0.5,
                "upper_bound_pct": 3,
                "lower_bound_pct": 3,
                "position_per_grid": 0.05,
                "max_concurrent_positions": 6,
                "bias_mode": "short_bias",
                "rebalance_threshold": 0.04,
                "take_profit_grids": 1.5,
                "stop_loss_pct": 6
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.symbol.as_str(), "ETHUSDT");
        assert_eq!(config.engine.bias_mode, BiasMode::ShortBias);
        assert_eq!(config.engine.spacing_pct, dec!(0.5));
        assert_eq!(config.engine.fill_tolerance, dec!(0.001));
        assert_eq!(config.engine.extreme_boost_factor, dec!(1.2));
        assert!(!config.engine.trailing_grid);
        assert_eq!(config.indicators, IndicatorConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file_rejects_invalid() {
        let mut config = Config::default();
        config.engine.grid_levels = 0;
        let path = std::env::temp_dir().join(format!(
            "grid_engine_invalid_{}.json",
            std::process::id()
        ));
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let result = Config::from_file(&path);
        let _ = fs::remove_file(&path);
        assert!(result.is_err());
    }
}
