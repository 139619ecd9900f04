pub mod freshness;
pub mod rules;
pub mod snapshot;

use std::fmt;

use chrono::{DateTime, Utc};
use error_stack::{Report, bail};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{
    AppConfig, BasketConfig, FreshnessConfig, SignalConfig, StalePolicy, WindowConfig,
};
use crate::error::SignalError;
use crate::model::{MarketHistory, Role};
use freshness::Staleness;
use snapshot::{IndicatorSnapshot, MarketFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendStatus {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Green => write!(f, "GREEN"),
            Self::Yellow => write!(f, "YELLOW"),
            Self::Red => write!(f, "RED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum SignalClass {
    Green,
    Yellow,
    RedHedge,
    RedGold,
    RedCash,
}

impl SignalClass {
    pub fn is_defense(self) -> bool {
        matches!(self, Self::RedHedge | Self::RedGold | Self::RedCash)
    }

    pub fn headline(self) -> &'static str {
        match self {
            Self::Green => "GREEN SIGNAL: BUY",
            Self::Yellow => "YELLOW SIGNAL: HOLD",
            Self::RedHedge => "RED SIGNAL: HEDGE",
            Self::RedGold => "RED SIGNAL: GOLD",
            Self::RedCash => "RED SIGNAL: CASH",
        }
    }
}

impl fmt::Display for SignalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Green => write!(f, "GREEN"),
            Self::Yellow => write!(f, "YELLOW"),
            Self::RedHedge => write!(f, "RED-HEDGE"),
            Self::RedGold => write!(f, "RED-GOLD"),
            Self::RedCash => write!(f, "RED-CASH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeverageFamily {
    Tech,
    Spy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Leverage {
    #[serde(rename = "2x")]
    X2,
    #[serde(rename = "3x")]
    X3,
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X2 => write!(f, "2x"),
            Self::X3 => write!(f, "3x"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeveragedPosition {
    pub family: LeverageFamily,
    pub leverage: Leverage,
    pub ticker: String,
}

/// The engine's output for one run. Built once, rendered once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub signal: SignalClass,
    pub trend: TrendStatus,
    /// Present only for GREEN.
    pub position: Option<LeveragedPosition>,
    pub allocation: String,
    pub rationale: String,
    pub flags: MarketFlags,
    pub diagnostics: IndicatorSnapshot,
}

/// A decision plus the staleness warning the caller chose to surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub record: DecisionRecord,
    pub stale: Option<Staleness>,
}

/// Stateless evaluator over an immutable strategy configuration.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    windows: WindowConfig,
    signal: SignalConfig,
    baskets: BasketConfig,
    freshness: FreshnessConfig,
}

impl SignalEngine {
    pub fn new(
        windows: WindowConfig,
        signal: SignalConfig,
        baskets: BasketConfig,
        freshness: FreshnessConfig,
    ) -> Self {
        Self {
            windows,
            signal,
            baskets,
            freshness,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.windows.clone(),
            config.signal.clone(),
            config.baskets.clone(),
            config.freshness.clone(),
        )
    }

    /// Number of trailing rows a role's series must carry.
    pub fn required_history(&self, role: Role) -> usize {
        let w = &self.windows;
        match role {
            Role::BroadMarket | Role::Technology => w
                .trend_sma
                .max(w.leadership_return + 1)
                .max(w.macd_slow + w.macd_signal),
            Role::HighYield | Role::ShortTreasury => w.credit_return + 1,
            Role::Dollar => w.dollar_sma,
            Role::Gold => w.gold_sma,
            Role::VolatilitySpot => w.vol_crush_return + 1,
            Role::Volatility3M => 1,
        }
    }

    /// Classify the latest row of `history`.
    ///
    /// Refuses to classify when the latest row is incomplete, any series is
    /// too short for its longest window, or a gap falls inside a window an
    /// indicator reads.
    pub fn evaluate(
        &self,
        history: &MarketHistory,
    ) -> Result<DecisionRecord, Report<SignalError>> {
        let incomplete = history.incomplete_latest();
        if !incomplete.is_empty() {
            bail!(SignalError::DataIntegrity { symbols: incomplete });
        }

        for role in Role::ALL {
            let series = history.get(role);
            let required = self.required_history(role);
            let available = series.points.len();
            if available < required {
                bail!(SignalError::InsufficientHistory {
                    symbol: series.symbol.clone(),
                    required,
                    available,
                });
            }
        }

        let snapshot = IndicatorSnapshot::compute(history, &self.windows)?;
        debug!(?snapshot, "indicator snapshot computed");

        Ok(rules::decide(snapshot, &self.signal, &self.baskets))
    }

    /// Evaluate and apply the staleness policy relative to `now`.
    pub fn analyze(
        &self,
        history: &MarketHistory,
        now: DateTime<Utc>,
    ) -> Result<Analysis, Report<SignalError>> {
        let record = self.evaluate(history)?;

        let stale = match self.freshness.policy {
            StalePolicy::Ignore => None,
            StalePolicy::Warn | StalePolicy::Withhold => {
                freshness::check(record.diagnostics.as_of, now, &self.freshness)
            }
        };

        if let Some(s) = stale {
            if self.freshness.policy == StalePolicy::Withhold {
                bail!(SignalError::StaleData {
                    latest: s.latest,
                    expected: s.expected,
                });
            }
            warn!(latest = %s.latest, expected = %s.expected, "market data looks stale");
        }

        Ok(Analysis { record, stale })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, TimeZone, Weekday};

    use super::*;
    use crate::config::SymbolsConfig;
    use crate::model::{PricePoint, PriceSeries};

    const DAYS: usize = 260;

    /// Consecutive weekdays ending Friday 2024-06-07.
    fn trading_days(n: usize) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(n);
        let mut day = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        while days.len() < n {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                days.push(day);
            }
            day = day.pred_opt().unwrap();
        }
        days.reverse();
        days
    }

    fn series_from(symbol: &str, closes: &[f64]) -> PriceSeries {
        let days = trading_days(closes.len());
        PriceSeries::new(
            symbol,
            days.into_iter()
                .zip(closes)
                .map(|(date, &c)| PricePoint {
                    date,
                    close: Some(c),
                })
                .collect(),
        )
    }

    fn linear(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    struct Basket {
        broad: Vec<f64>,
        tech: Vec<f64>,
        high_yield: Vec<f64>,
        treasury: Vec<f64>,
        dollar: Vec<f64>,
        gold: Vec<f64>,
        vix: Vec<f64>,
        vix_3m: Vec<f64>,
    }

    /// Calm bull market: tech outpaces broad, credit outpaces treasuries.
    fn bull_basket() -> Basket {
        Basket {
            broad: linear(400.0, 0.5, DAYS),
            tech: linear(300.0, 1.0, DAYS),
            high_yield: linear(70.0, 0.05, DAYS),
            treasury: vec![115.0; DAYS],
            dollar: linear(30.0, -0.01, DAYS),
            gold: linear(200.0, -0.05, DAYS),
            vix: vec![14.0; DAYS],
            vix_3m: vec![17.0; DAYS],
        }
    }

    fn fetched(basket: &Basket) -> Vec<PriceSeries> {
        let symbols = SymbolsConfig::default();
        let columns = [
            (Role::BroadMarket, &basket.broad),
            (Role::Technology, &basket.tech),
            (Role::HighYield, &basket.high_yield),
            (Role::ShortTreasury, &basket.treasury),
            (Role::Dollar, &basket.dollar),
            (Role::Gold, &basket.gold),
            (Role::VolatilitySpot, &basket.vix),
            (Role::Volatility3M, &basket.vix_3m),
        ];
        columns
            .iter()
            .map(|(role, closes)| series_from(symbols.ticker(*role), closes))
            .collect()
    }

    fn history(basket: &Basket) -> MarketHistory {
        MarketHistory::assemble(&SymbolsConfig::default(), fetched(basket)).unwrap()
    }

    fn history_with_gap(basket: &Basket, role: Role, row: usize) -> MarketHistory {
        let mut series = fetched(basket);
        let target = Role::ALL.iter().position(|r| *r == role).unwrap();
        series[target].points[row].close = None;
        MarketHistory::assemble(&SymbolsConfig::default(), series).unwrap()
    }

    fn engine() -> SignalEngine {
        SignalEngine::new(
            WindowConfig::default(),
            SignalConfig::default(),
            BasketConfig::default(),
            FreshnessConfig::default(),
        )
    }

    fn engine_with_policy(policy: StalePolicy) -> SignalEngine {
        SignalEngine::new(
            WindowConfig::default(),
            SignalConfig::default(),
            BasketConfig::default(),
            FreshnessConfig {
                policy,
                ..FreshnessConfig::default()
            },
        )
    }

    #[test]
    fn calm_bull_market_is_green_tech_3x() {
        let record = engine().evaluate(&history(&bull_basket())).unwrap();
        assert_eq!(record.diagnostics.tracked_symbol, "QQQ");
        assert!(record.flags.macro_safe);
        assert!(record.flags.above_sma);
        assert!(record.flags.macd_bullish);
        assert_eq!(record.signal, SignalClass::Green);
        assert_eq!(record.position.unwrap().ticker, "TQQQ");
        assert_eq!(
            record.diagnostics.as_of,
            NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()
        );
    }

    #[test]
    fn snapshot_values_match_direct_computation() {
        let basket = bull_basket();
        let record = engine().evaluate(&history(&basket)).unwrap();
        let d = &record.diagnostics;
        let n = DAYS - 1;
        let expected_sma: f64 = basket.tech[DAYS - 200..].iter().sum::<f64>() / 200.0;
        assert!((d.tracked_sma - expected_sma).abs() < 1e-9);
        assert!((d.tracked_price - basket.tech[n]).abs() < 1e-12);
        let hyg = (basket.high_yield[n] - basket.high_yield[n - 20]) / basket.high_yield[n - 20];
        assert!((d.high_yield_return - hyg).abs() < 1e-12);
        let qqq = (basket.tech[n] - basket.tech[n - 63]) / basket.tech[n - 63];
        assert!((d.tech_return - qqq).abs() < 1e-12);
        assert_eq!(d.vix_change_5d, 0.0);
    }

    #[test]
    fn broad_market_tracked_when_tech_lags() {
        let mut basket = bull_basket();
        basket.tech = linear(300.0, 0.1, DAYS);
        basket.broad = linear(400.0, 2.0, DAYS);
        let record = engine().evaluate(&history(&basket)).unwrap();
        assert!(!record.flags.tech_leads);
        assert_eq!(record.diagnostics.tracked_symbol, "SPY");
        assert_eq!(record.position.unwrap().ticker, "UPRO");
    }

    #[test]
    fn vix_inversion_forces_defense() {
        let mut basket = bull_basket();
        *basket.vix.last_mut().unwrap() = 30.0;
        let record = engine().evaluate(&history(&basket)).unwrap();
        assert!(record.flags.panic);
        assert_eq!(record.signal, SignalClass::RedCash);
    }

    #[test]
    fn downtrend_with_rising_dollar_is_hedge() {
        let mut basket = bull_basket();
        basket.broad = linear(500.0, -0.5, DAYS);
        basket.tech = linear(400.0, -1.0, DAYS);
        basket.dollar = linear(27.0, 0.01, DAYS);
        let record = engine().evaluate(&history(&basket)).unwrap();
        assert_eq!(record.trend, TrendStatus::Red);
        assert_eq!(record.signal, SignalClass::RedHedge);
    }

    #[test]
    fn downtrend_with_rising_gold_is_gold() {
        let mut basket = bull_basket();
        basket.broad = linear(500.0, -0.5, DAYS);
        basket.tech = linear(400.0, -1.0, DAYS);
        basket.gold = linear(180.0, 0.2, DAYS);
        let record = engine().evaluate(&history(&basket)).unwrap();
        assert_eq!(record.signal, SignalClass::RedGold);
    }

    #[test]
    fn missing_latest_value_is_integrity_failure() {
        let history = history_with_gap(&bull_basket(), Role::VolatilitySpot, DAYS - 1);

        let err = engine().evaluate(&history).unwrap_err();
        match err.current_context() {
            SignalError::DataIntegrity { symbols } => assert_eq!(symbols, &vec!["^VIX".to_owned()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn gap_inside_credit_window_is_refused() {
        // Identical price paths, so a row-aligned return could never diverge
        let mut basket = bull_basket();
        basket.high_yield = linear(100.0, 1.0, DAYS);
        basket.treasury = linear(100.0, 1.0, DAYS);
        let history = history_with_gap(&basket, Role::HighYield, DAYS - 10);

        let err = engine().evaluate(&history).unwrap_err();
        match err.current_context() {
            SignalError::GapInWindow { symbol, date } => {
                assert_eq!(symbol, "HYG");
                assert_eq!(*date, trading_days(DAYS)[DAYS - 10]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn gap_outside_every_window_is_tolerated() {
        let basket = bull_basket();
        // Oldest HYG row; the credit return only reads the last 21 rows
        let history = history_with_gap(&basket, Role::HighYield, 0);
        let record = engine().evaluate(&history).unwrap();
        let n = DAYS - 1;
        let hyg = (basket.high_yield[n] - basket.high_yield[n - 20]) / basket.high_yield[n - 20];
        assert!((record.diagnostics.high_yield_return - hyg).abs() < 1e-12);
    }

    #[test]
    fn bad_tick_outside_return_window_is_tolerated() {
        let mut basket = bull_basket();
        basket.high_yield[0] = 0.0;
        let record = engine().evaluate(&history(&basket)).unwrap();
        assert!(record.diagnostics.high_yield_return.is_finite());
    }

    #[test]
    fn gap_breaking_macd_run_is_refused() {
        let engine = SignalEngine::new(
            WindowConfig {
                trend_sma: 20,
                leadership_return: 10,
                ..WindowConfig::default()
            },
            SignalConfig::default(),
            BasketConfig::default(),
            FreshnessConfig::default(),
        );
        // Outside the 20-row SMA and 11-row return, but leaves fewer than
        // 35 unbroken rows for MACD
        let history = history_with_gap(&bull_basket(), Role::Technology, DAYS - 30);
        let err = engine.evaluate(&history).unwrap_err();
        match err.current_context() {
            SignalError::GapInWindow { symbol, .. } => assert_eq!(symbol, "QQQ"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_history_is_refused() {
        let mut basket = bull_basket();
        basket.gold = linear(200.0, -0.05, 150);
        let err = engine().evaluate(&history(&basket)).unwrap_err();
        match err.current_context() {
            SignalError::InsufficientHistory {
                symbol,
                required,
                available,
            } => {
                assert_eq!(symbol, "GLD");
                assert_eq!(*required, 200);
                assert_eq!(*available, 150);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn required_history_follows_windows() {
        let engine = engine();
        assert_eq!(engine.required_history(Role::BroadMarket), 200);
        assert_eq!(engine.required_history(Role::HighYield), 21);
        assert_eq!(engine.required_history(Role::Dollar), 63);
        assert_eq!(engine.required_history(Role::VolatilitySpot), 6);
    }

    #[test]
    fn stale_data_warns_by_default() {
        // Tuesday 2024-06-11 16:00 UTC, history ends Friday 2024-06-07
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 16, 0, 0).unwrap();
        let analysis = engine().analyze(&history(&bull_basket()), now).unwrap();
        let stale = analysis.stale.expect("stale warning");
        assert_eq!(stale.expected, NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
    }

    #[test]
    fn stale_data_withheld_under_strict_policy() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 16, 0, 0).unwrap();
        let err = engine_with_policy(StalePolicy::Withhold)
            .analyze(&history(&bull_basket()), now)
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            SignalError::StaleData { .. }
        ));
    }

    #[test]
    fn stale_data_ignored_when_disabled() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 16, 0, 0).unwrap();
        let analysis = engine_with_policy(StalePolicy::Ignore)
            .analyze(&history(&bull_basket()), now)
            .unwrap();
        assert!(analysis.stale.is_none());
    }

    #[test]
    fn fresh_data_over_weekend() {
        // Saturday 2024-06-08
        let now = Utc.with_ymd_and_hms(2024, 6, 8, 16, 0, 0).unwrap();
        let analysis = engine_with_policy(StalePolicy::Withhold)
            .analyze(&history(&bull_basket()), now)
            .unwrap();
        assert!(analysis.stale.is_none());
    }
}
