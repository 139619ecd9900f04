use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveTime;
use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::Role;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_output_format() -> String {
    "text".into()
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub symbols: SymbolsConfig,
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default)]
    pub baskets: BasketConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    /// Yahoo chart range, e.g. `"2y"`.
    pub range: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub requests_per_second: u32,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub use_adjusted_close: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "yahoo".into(),
            base_url: "https://query1.finance.yahoo.com".into(),
            range: "2y".into(),
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (compatible; active-defense/0.1)".into(),
            requests_per_second: 2,
            max_attempts: 3,
            retry_delay_ms: 1_000,
            use_adjusted_close: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SymbolsConfig {
    pub broad_market: String,
    pub technology: String,
    pub high_yield: String,
    pub short_treasury: String,
    pub dollar: String,
    pub gold: String,
    pub volatility_spot: String,
    pub volatility_3m: String,
}

impl SymbolsConfig {
    pub fn ticker(&self, role: Role) -> &str {
        match role {
            Role::BroadMarket => &self.broad_market,
            Role::Technology => &self.technology,
            Role::HighYield => &self.high_yield,
            Role::ShortTreasury => &self.short_treasury,
            Role::Dollar => &self.dollar,
            Role::Gold => &self.gold,
            Role::VolatilitySpot => &self.volatility_spot,
            Role::Volatility3M => &self.volatility_3m,
        }
    }

    /// All tickers in role order.
    pub fn tickers(&self) -> Vec<String> {
        Role::ALL.iter().map(|r| self.ticker(*r).to_owned()).collect()
    }
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            broad_market: "SPY".into(),
            technology: "QQQ".into(),
            high_yield: "HYG".into(),
            short_treasury: "IEI".into(),
            dollar: "UUP".into(),
            gold: "GLD".into(),
            volatility_spot: "^VIX".into(),
            volatility_3m: "^VIX3M".into(),
        }
    }
}

/// Lookback lengths, in trading days.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub credit_return: usize,
    pub leadership_return: usize,
    pub trend_sma: usize,
    pub dollar_sma: usize,
    pub gold_sma: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub vol_crush_return: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            credit_return: 20,
            leadership_return: 63,
            trend_sma: 200,
            dollar_sma: 63,
            gold_sma: 200,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            vol_crush_return: 5,
        }
    }
}

/// Allocation text for each branch of the decision.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BasketConfig {
    pub tech_3x: String,
    pub tech_2x: String,
    pub spy_3x: String,
    pub spy_2x: String,
    pub hedge: String,
    pub gold: String,
    pub cash: String,
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            tech_3x: "TQQQ".into(),
            tech_2x: "QLD".into(),
            spy_3x: "UPRO".into(),
            spy_2x: "SSO".into(),
            hedge: "40% KMLM / 40% BTAL / 20% UUP".into(),
            gold: "100% GLD".into(),
            cash: "100% SGOV (Treasury Bills)".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Spot VIX strictly below this selects 3x leverage.
    pub leverage_vix_threshold: f64,
    /// A 5-day VIX change below this counts as a volatility crush.
    pub vol_crush_threshold: f64,
    pub trailing_stop_pct: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            leverage_vix_threshold: 20.0,
            vol_crush_threshold: -0.20,
            trailing_stop_pct: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    Ignore,
    Warn,
    Withhold,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    pub policy: StalePolicy,
    /// Market-local offset from UTC in hours (US Eastern standard time = -5).
    /// Daylight saving is not applied: use -4 while US markets are on EDT, or
    /// the pre-open cutoff lands an hour late.
    pub utc_offset_hours: i32,
    /// Session open, market-local `"HH:MM"`.
    pub session_open: String,
}

impl FreshnessConfig {
    pub fn session_open_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.session_open, "%H:%M").ok()
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            policy: StalePolicy::Warn,
            utc_offset_hours: -5,
            session_open: "09:30".into(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_FORMATS: &[&str] = &["text", "json"];
const VALID_PROVIDERS: &[&str] = &["yahoo"];

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(&config.general)?;
    validate_provider(&config.provider)?;
    validate_symbols_distinct(&config.symbols)?;
    validate_windows(&config.windows)?;
    validate_freshness(&config.freshness)?;
    Ok(())
}

fn validate_general(general: &GeneralConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_FORMATS.contains(&general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            general.log_format
        )));
    }
    if !VALID_FORMATS.contains(&general.output_format.as_str()) {
        return Err(invalid(format!(
            "general.output_format \"{}\" is not valid",
            general.output_format
        )));
    }
    Ok(())
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_PROVIDERS.contains(&provider.name.as_str()) {
        return Err(invalid(format!(
            "provider.name \"{}\" is not a known provider",
            provider.name
        )));
    }
    if provider.max_attempts == 0 {
        return Err(invalid("provider.max_attempts must be >= 1".into()));
    }
    if provider.timeout_secs == 0 {
        return Err(invalid("provider.timeout_secs must be > 0".into()));
    }
    Ok(())
}

fn validate_symbols_distinct(symbols: &SymbolsConfig) -> Result<(), Report<ConfigError>> {
    let mut seen = HashSet::new();
    for role in Role::ALL {
        let ticker = symbols.ticker(role);
        if ticker.trim().is_empty() {
            return Err(invalid(format!("symbols.{role} is empty")));
        }
        if !seen.insert(ticker) {
            return Err(invalid(format!(
                "symbols.{role}: ticker \"{ticker}\" is used for more than one role"
            )));
        }
    }
    Ok(())
}

fn validate_windows(windows: &WindowConfig) -> Result<(), Report<ConfigError>> {
    let named = [
        ("credit_return", windows.credit_return),
        ("leadership_return", windows.leadership_return),
        ("trend_sma", windows.trend_sma),
        ("dollar_sma", windows.dollar_sma),
        ("gold_sma", windows.gold_sma),
        ("macd_fast", windows.macd_fast),
        ("macd_slow", windows.macd_slow),
        ("macd_signal", windows.macd_signal),
        ("vol_crush_return", windows.vol_crush_return),
    ];
    for (name, value) in named {
        if value == 0 {
            return Err(invalid(format!("windows.{name} must be > 0")));
        }
    }
    if windows.macd_fast >= windows.macd_slow {
        return Err(invalid(
            "windows.macd_fast must be smaller than windows.macd_slow".into(),
        ));
    }
    Ok(())
}

fn validate_freshness(freshness: &FreshnessConfig) -> Result<(), Report<ConfigError>> {
    if freshness.session_open_time().is_none() {
        return Err(invalid(format!(
            "freshness.session_open \"{}\" is not HH:MM",
            freshness.session_open
        )));
    }
    if !(-12..=14).contains(&freshness.utc_offset_hours) {
        return Err(invalid(format!(
            "freshness.utc_offset_hours {} is out of range",
            freshness.utc_offset_hours
        )));
    }
    Ok(())
}
