use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use error_stack::{Report, bail};
use serde::Serialize;

use crate::config::SymbolsConfig;
use crate::error::SignalError;

/// Slot a ticker fills in the tracked basket.
///
/// The set is closed: the engine reads exactly these eight series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    BroadMarket,
    Technology,
    HighYield,
    ShortTreasury,
    Dollar,
    Gold,
    VolatilitySpot,
    Volatility3M,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Self::BroadMarket,
        Self::Technology,
        Self::HighYield,
        Self::ShortTreasury,
        Self::Dollar,
        Self::Gold,
        Self::VolatilitySpot,
        Self::Volatility3M,
    ];

    /// Return the config-format key for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BroadMarket => "broad_market",
            Self::Technology => "technology",
            Self::HighYield => "high_yield",
            Self::ShortTreasury => "short_treasury",
            Self::Dollar => "dollar",
            Self::Gold => "gold",
            Self::VolatilitySpot => "volatility_spot",
            Self::Volatility3M => "volatility_3m",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One daily observation. `close` is `None` when the provider reported a gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

/// Daily closes for one symbol in ascending date order.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Value at `date`, if the series has a non-missing close there.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .and_then(|i| self.points[i].close)
    }

    /// Closes with gaps dropped, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().filter_map(|p| p.close).collect()
    }

    /// The last `rows` points, or `None` when the series is shorter.
    pub fn tail(&self, rows: usize) -> Option<&[PricePoint]> {
        let start = self.points.len().checked_sub(rows)?;
        Some(&self.points[start..])
    }

    /// Points after the most recent gap.
    pub fn contiguous_tail(&self) -> &[PricePoint] {
        let start = self
            .points
            .iter()
            .rposition(|p| p.close.is_none())
            .map_or(0, |i| i + 1);
        &self.points[start..]
    }
}

/// The full basket keyed by role, as consumed by the signal engine.
#[derive(Debug, Clone)]
pub struct MarketHistory {
    series: HashMap<Role, PriceSeries>,
}

impl MarketHistory {
    /// Match fetched series to roles by ticker. Response order is irrelevant;
    /// every configured ticker must be present.
    pub fn assemble(
        symbols: &SymbolsConfig,
        fetched: Vec<PriceSeries>,
    ) -> Result<Self, Report<SignalError>> {
        let mut by_symbol: HashMap<String, PriceSeries> = fetched
            .into_iter()
            .map(|s| (s.symbol.clone(), s))
            .collect();

        let mut series = HashMap::with_capacity(Role::ALL.len());
        let mut missing = Vec::new();
        for role in Role::ALL {
            let ticker = symbols.ticker(role);
            match by_symbol.remove(ticker) {
                Some(s) => {
                    series.insert(role, s);
                }
                None => missing.push(ticker.to_owned()),
            }
        }

        if !missing.is_empty() {
            bail!(SignalError::MissingSymbols { symbols: missing });
        }

        Ok(Self { series })
    }

    pub fn get(&self, role: Role) -> &PriceSeries {
        // assemble() guarantees all roles are present
        &self.series[&role]
    }

    /// Date of the most recent row across the basket.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.series.values().filter_map(|s| s.last_date()).max()
    }

    /// Tickers with no value on the latest row, in role order.
    pub fn incomplete_latest(&self) -> Vec<String> {
        let Some(latest) = self.latest_date() else {
            return Role::ALL
                .iter()
                .map(|r| self.get(*r).symbol.clone())
                .collect();
        };
        Role::ALL
            .iter()
            .map(|r| self.get(*r))
            .filter(|s| s.close_on(latest).is_none())
            .map(|s| s.symbol.clone())
            .collect()
    }
}
