use chrono::NaiveDate;
use error_stack::{Report, ResultExt, bail};
use serde::Serialize;

use crate::config::{SignalConfig, WindowConfig};
use crate::error::{IndicatorError, SignalError};
use crate::indicator::Indicator;
use crate::indicator::ma::Sma;
use crate::indicator::macd::{Macd, MacdPoint};
use crate::indicator::roc::TrailingReturn;
use crate::model::{MarketHistory, PriceSeries, Role};

/// Every intermediate value the decision is derived from, as of the latest row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub as_of: NaiveDate,
    pub vix_spot: f64,
    pub vix_3m: f64,
    pub vix_change_5d: f64,
    pub high_yield_return: f64,
    pub treasury_return: f64,
    pub tech_return: f64,
    pub broad_return: f64,
    pub tracked_symbol: String,
    pub tracked_price: f64,
    pub tracked_sma: f64,
    pub macd: MacdPoint,
    pub dollar_price: f64,
    pub dollar_sma: f64,
    pub gold_price: f64,
    pub gold_sma: f64,
}

/// Boolean readings derived from a snapshot. Ties fall to the `false` side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketFlags {
    pub panic: bool,
    pub credit_stress: bool,
    pub macro_safe: bool,
    pub tech_leads: bool,
    pub above_sma: bool,
    pub macd_bullish: bool,
    pub dollar_up: bool,
    pub gold_up: bool,
    pub vol_crush: bool,
}

impl IndicatorSnapshot {
    pub fn flags(&self, signal: &SignalConfig) -> MarketFlags {
        let panic = self.vix_spot > self.vix_3m;
        let credit_stress = self.high_yield_return < self.treasury_return;
        MarketFlags {
            panic,
            credit_stress,
            macro_safe: !(panic || credit_stress),
            tech_leads: self.tech_leads(),
            above_sma: self.tracked_price > self.tracked_sma,
            macd_bullish: self.macd.is_bullish(),
            dollar_up: self.dollar_price > self.dollar_sma,
            gold_up: self.gold_price > self.gold_sma,
            vol_crush: self.vix_change_5d < signal.vol_crush_threshold,
        }
    }

    pub fn tech_leads(&self) -> bool {
        self.tech_return > self.broad_return
    }

    /// Compute the snapshot from validated history.
    ///
    /// History must already have passed the integrity and length checks in
    /// [`crate::signal::SignalEngine`].
    pub fn compute(
        history: &MarketHistory,
        windows: &WindowConfig,
    ) -> Result<Self, Report<SignalError>> {
        let broad = history.get(Role::BroadMarket);
        let tech = history.get(Role::Technology);
        let dollar = history.get(Role::Dollar);
        let gold = history.get(Role::Gold);
        let vix = history.get(Role::VolatilitySpot);

        let as_of = history
            .latest_date()
            .ok_or_else(|| Report::new(SignalError::DataIntegrity { symbols: Vec::new() }))?;

        let credit = TrailingReturn::new(windows.credit_return).change_context(config_error())?;
        let leadership =
            TrailingReturn::new(windows.leadership_return).change_context(config_error())?;
        let vol_change =
            TrailingReturn::new(windows.vol_crush_return).change_context(config_error())?;

        let tech_return = latest(&leadership, tech)?;
        let broad_return = latest(&leadership, broad)?;
        let tracked = if tech_return > broad_return { tech } else { broad };

        let trend_sma = Sma::new(windows.trend_sma).change_context(config_error())?;
        let macd = Macd::new(windows.macd_fast, windows.macd_slow, windows.macd_signal)
            .change_context(config_error())?;
        let macd = macd
            .latest_point(&contiguous_closes(tracked, macd.required_prices())?)
            .change_context_lazy(|| indicator_error(tracked))?;

        Ok(Self {
            as_of,
            vix_spot: last_close(vix)?,
            vix_3m: last_close(history.get(Role::Volatility3M))?,
            vix_change_5d: latest(&vol_change, vix)?,
            high_yield_return: latest(&credit, history.get(Role::HighYield))?,
            treasury_return: latest(&credit, history.get(Role::ShortTreasury))?,
            tech_return,
            broad_return,
            tracked_symbol: tracked.symbol.clone(),
            tracked_price: last_close(tracked)?,
            tracked_sma: latest(&trend_sma, tracked)?,
            macd,
            dollar_price: last_close(dollar)?,
            dollar_sma: latest(
                &Sma::new(windows.dollar_sma).change_context(config_error())?,
                dollar,
            )?,
            gold_price: last_close(gold)?,
            gold_sma: latest(
                &Sma::new(windows.gold_sma).change_context(config_error())?,
                gold,
            )?,
        })
    }
}

fn config_error() -> SignalError {
    SignalError::Indicator {
        symbol: "<configuration>".into(),
    }
}

fn indicator_error(series: &PriceSeries) -> SignalError {
    SignalError::Indicator {
        symbol: series.symbol.clone(),
    }
}

/// Closes of the last `rows` rows. A gap anywhere in that window refuses.
fn window_closes(series: &PriceSeries, rows: usize) -> Result<Vec<f64>, Report<SignalError>> {
    let tail = series.tail(rows).ok_or_else(|| {
        Report::new(SignalError::InsufficientHistory {
            symbol: series.symbol.clone(),
            required: rows,
            available: series.points.len(),
        })
    })?;
    tail.iter()
        .map(|p| {
            p.close.ok_or_else(|| {
                Report::new(SignalError::GapInWindow {
                    symbol: series.symbol.clone(),
                    date: p.date,
                })
            })
        })
        .collect()
}

/// Closes after the most recent gap; the recursive MACD needs an unbroken run
/// of at least `required` rows.
fn contiguous_closes(
    series: &PriceSeries,
    required: usize,
) -> Result<Vec<f64>, Report<SignalError>> {
    let tail = series.contiguous_tail();
    if tail.len() < required {
        let gap = series.points.len() - tail.len();
        bail!(match gap.checked_sub(1) {
            Some(i) => SignalError::GapInWindow {
                symbol: series.symbol.clone(),
                date: series.points[i].date,
            },
            None => SignalError::InsufficientHistory {
                symbol: series.symbol.clone(),
                required,
                available: series.points.len(),
            },
        });
    }
    Ok(tail.iter().filter_map(|p| p.close).collect())
}

fn latest(
    indicator: &dyn Indicator,
    series: &PriceSeries,
) -> Result<f64, Report<SignalError>> {
    indicator
        .latest(&window_closes(series, indicator.required_prices())?)
        .change_context_lazy(|| indicator_error(series))
        .attach_with(|| format!("indicator: {}", indicator.name()))
}

fn last_close(series: &PriceSeries) -> Result<f64, Report<SignalError>> {
    window_closes(series, 1)?.last().copied().ok_or_else(|| {
        Report::new(IndicatorError::InsufficientData {
            required: 1,
            available: 0,
        })
        .change_context(indicator_error(series))
    })
}
