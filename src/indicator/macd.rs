use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::indicator::ma::Ema;

/// One MACD observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdPoint {
    pub fn is_bullish(&self) -> bool {
        self.macd > self.signal
    }
}

pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
        })
    }

    /// Calculate the MACD line, signal line and histogram for every price.
    pub fn calculate_full(
        &self,
        prices: &[f64],
    ) -> Result<Vec<MacdPoint>, Report<IndicatorError>> {
        if prices.len() < self.required_prices() {
            bail!(IndicatorError::InsufficientData {
                required: self.required_prices(),
                available: prices.len(),
            });
        }

        let fast_ema = Ema::new(self.fast_period)?.calculate(prices)?;
        let slow_ema = Ema::new(self.slow_period)?.calculate(prices)?;

        // Both EMAs are full length, so they align index for index
        let macd_line: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal_line = Ema::new(self.signal_period)?.calculate(&macd_line)?;

        Ok(macd_line
            .iter()
            .zip(signal_line.iter())
            .map(|(&macd, &signal)| MacdPoint {
                macd,
                signal,
                histogram: macd - signal,
            })
            .collect())
    }

    pub fn latest_point(&self, prices: &[f64]) -> Result<MacdPoint, Report<IndicatorError>> {
        self.calculate_full(prices)?
            .last()
            .copied()
            .ok_or_else(|| {
                Report::new(IndicatorError::InsufficientData {
                    required: self.required_prices(),
                    available: prices.len(),
                })
            })
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    /// Warm-up length before the slow EMA and the signal line carry
    /// meaningful weight.
    fn required_prices(&self) -> usize {
        self.slow_period + self.signal_period
    }

    /// Returns MACD line values only.
    fn calculate(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        Ok(self
            .calculate_full(prices)?
            .into_iter()
            .map(|p| p.macd)
            .collect())
    }
}
