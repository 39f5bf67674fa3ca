//! Core data types shared by the grid engine

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for bar data
#[derive(Debug, Error, PartialEq)]
pub enum BarValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: Decimal, low: Decimal },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(Decimal),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange {
        open: Decimal,
        low: Decimal,
        high: Decimal,
    },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange {
        close: Decimal,
        low: Decimal,
        high: Decimal,
    },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    },
}

/// OHLCV bar. `close` is the price every grid comparison uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Create a new bar with validation
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Result<Self, BarValidationError> {
        let bar = Self::new_unchecked(timestamp, open, high, low, close, volume);
        bar.validate()?;
        Ok(bar)
    }

    /// Create a bar without validation (trusted sources, tests)
    pub fn new_unchecked(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Flat bar where every price equals `price`
    pub fn at_price(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self::new_unchecked(timestamp, price, price, price, price, Decimal::ZERO)
    }

    pub fn validate(&self) -> Result<(), BarValidationError> {
        let zero = Decimal::ZERO;
        if self.open <= zero || self.high <= zero || self.low <= zero || self.close <= zero {
            return Err(BarValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < zero {
            return Err(BarValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }
}

/// Indicator values aligned with a single bar.
///
/// Every field is optional: during warm-up the upstream series have no value
/// yet, and the engine treats that as "no trade", not as an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub atr: Option<f64>,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    /// RSI-like oscillator in [0, 100]
    pub oscillator: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn new(atr: Option<f64>, sma_fast: f64, sma_slow: f64, oscillator: f64) -> Self {
        Self {
            atr,
            sma_fast: Some(sma_fast),
            sma_slow: Some(sma_slow),
            oscillator: Some(oscillator),
        }
    }

    /// True once the averages and the oscillator are all available.
    /// ATR is optional; without it spacing is simply not volatility-adjusted.
    pub fn is_warmed_up(&self) -> bool {
        finite(self.sma_fast).is_some()
            && finite(self.sma_slow).is_some()
            && finite(self.oscillator).is_some()
    }

    pub fn trend(&self) -> Trend {
        match (finite(self.sma_fast), finite(self.sma_slow)) {
            (Some(fast), Some(slow)) if fast > slow => Trend::Up,
            (Some(fast), Some(slow)) if fast < slow => Trend::Down,
            _ => Trend::Flat,
        }
    }

    pub fn oscillator(&self) -> Option<f64> {
        finite(self.oscillator)
    }

    /// ATR as a fraction of `price`, if ATR is known
    pub fn volatility_ratio(&self, price: Decimal) -> Option<Decimal> {
        let atr = Decimal::from_f64(finite(self.atr)?)?;
        if price <= Decimal::ZERO || atr < Decimal::ZERO {
            return None;
        }
        Some(atr / price)
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Trading pair symbol using Arc<str> for cheap cloning
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ladder side a level sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Direction of the position a fill on this side opens
    pub fn direction(self) -> Direction {
        match self {
            Side::Buy => Direction::Long,
            Side::Sell => Direction::Short,
        }
    }
}

/// Position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

/// Trend read from the fast/slow average pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_bar_validation() {
        assert!(Bar::new(ts(), dec!(100), dec!(105), dec!(95), dec!(102), dec!(10)).is_ok());

        let err = Bar::new(ts(), dec!(100), dec!(95), dec!(105), dec!(100), dec!(10)).unwrap_err();
        assert!(matches!(err, BarValidationError::HighLessThanLow { .. }));

        let err = Bar::new(ts(), dec!(0), dec!(105), dec!(95), dec!(100), dec!(10)).unwrap_err();
        assert!(matches!(err, BarValidationError::NonPositivePrice { .. }));

        let err = Bar::new(ts(), dec!(100), dec!(105), dec!(95), dec!(110), dec!(10)).unwrap_err();
        assert!(matches!(err, BarValidationError::CloseOutOfRange { .. }));

        let err = Bar::new(ts(), dec!(100), dec!(105), dec!(95), dec!(100), dec!(-1)).unwrap_err();
        assert_eq!(err, BarValidationError::NegativeVolume(dec!(-1)));
    }

    #[test]
    fn test_snapshot_warmup() {
        assert!(!IndicatorSnapshot::default().is_warmed_up());

        let partial = IndicatorSnapshot {
            atr: Some(1.0),
            sma_fast: Some(10.0),
            sma_slow: None,
            oscillator: Some(50.0),
        };
        assert!(!partial.is_warmed_up());

        let nan = IndicatorSnapshot::new(None, f64::NAN, 10.0, 50.0);
        assert!(!nan.is_warmed_up());

        assert!(IndicatorSnapshot::new(None, 10.0, 9.0, 50.0).is_warmed_up());
    }

    #[test]
    fn test_snapshot_trend() {
        assert_eq!(IndicatorSnapshot::new(None, 11.0, 10.0, 50.0).trend(), Trend::Up);
        assert_eq!(IndicatorSnapshot::new(None, 9.0, 10.0, 50.0).trend(), Trend::Down);
        assert_eq!(IndicatorSnapshot::new(None, 10.0, 10.0, 50.0).trend(), Trend::Flat);
        assert_eq!(IndicatorSnapshot::default().trend(), Trend::Flat);
    }

    #[test]
    fn test_volatility_ratio() {
        let snap = IndicatorSnapshot::new(Some(500.0), 1.0, 1.0, 50.0);
        assert_eq!(snap.volatility_ratio(dec!(50000)), Some(dec!(0.01)));
        assert_eq!(IndicatorSnapshot::default().volatility_ratio(dec!(50000)), None);
    }

    #[test]
    fn test_side_direction() {
        assert_eq!(Side::Buy.direction(), Direction::Long);
        assert_eq!(Side::Sell.direction(), Direction::Short);
    }
}
