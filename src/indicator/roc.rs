use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::Indicator;

/// Trailing simple return over `period` steps: `(p[t] - p[t-n]) / p[t-n]`.
pub struct TrailingReturn {
    period: usize,
}

impl TrailingReturn {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for TrailingReturn {
    fn name(&self) -> &str {
        "return"
    }

    fn required_prices(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        if prices.len() < self.required_prices() {
            bail!(IndicatorError::InsufficientData {
                required: self.required_prices(),
                available: prices.len(),
            });
        }
        prices
            .windows(self.period + 1)
            .map(|w| {
                if w[0] == 0.0 {
                    return Err(Report::new(IndicatorError::InvalidParameter {
                        name: "base price is zero".into(),
                    }));
                }
                Ok((w[self.period] - w[0]) / w[0])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_invalid() {
        assert!(TrailingReturn::new(0).is_err());
    }

    #[test]
    fn needs_period_plus_one_prices() {
        let ret = TrailingReturn::new(3).unwrap();
        assert!(ret.calculate(&[1.0, 2.0, 3.0]).is_err());
        assert_eq!(ret.calculate(&[1.0, 2.0, 3.0, 4.0]).unwrap().len(), 1);
    }

    #[test]
    fn known_value() {
        let ret = TrailingReturn::new(2).unwrap();
        let values = ret.calculate(&[100.0, 50.0, 110.0, 55.0]).unwrap();
        assert!((values[0] - 0.10).abs() < 1e-12);
        assert!((values[1] - 0.10).abs() < 1e-12);
    }

    #[test]
    fn latest_looks_back_exactly_period_steps() {
        let ret = TrailingReturn::new(20).unwrap();
        let mut prices = vec![1.0; 40];
        prices[19] = 2.0; // 20 steps before the last index
        prices[39] = 3.0;
        assert!((ret.latest(&prices).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_base_price_rejected() {
        let ret = TrailingReturn::new(1).unwrap();
        assert!(ret.calculate(&[0.0, 1.0]).is_err());
    }

    #[test]
    fn zero_latest_price_is_a_full_loss() {
        let ret = TrailingReturn::new(2).unwrap();
        assert_eq!(ret.latest(&[5.0, 4.0, 0.0]).unwrap(), -1.0);
    }
}
