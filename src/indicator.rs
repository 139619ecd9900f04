pub mod ma;
pub mod macd;
pub mod roc;

use error_stack::Report;

use crate::error::IndicatorError;

/// A technical analysis indicator over a daily close series.
///
/// Prices must be in ascending chronological order (oldest first).
pub trait Indicator: Send {
    /// Unique name of this indicator (e.g., "sma", "ema").
    fn name(&self) -> &str;

    /// Minimum number of prices required to produce at least one output value.
    fn required_prices(&self) -> usize;

    /// Calculate indicator values from prices.
    ///
    /// Returns one value per output point. The number of values may be less
    /// than the number of input prices depending on the indicator's lookback;
    /// the last value always corresponds to the last price.
    fn calculate(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>>;

    /// Value at the most recent price.
    fn latest(&self, prices: &[f64]) -> Result<f64, Report<IndicatorError>> {
        let values = self.calculate(prices)?;
        values.last().copied().ok_or_else(|| {
            Report::new(IndicatorError::InsufficientData {
                required: self.required_prices(),
                available: prices.len(),
            })
        })
    }
}
