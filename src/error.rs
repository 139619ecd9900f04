use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum ProviderError {
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
    #[display("{provider} returned no data for {symbol}")]
    EmptyResponse { provider: String, symbol: String },
    #[display("{provider} rejected {symbol}: {description}")]
    Api {
        provider: String,
        symbol: String,
        description: String,
    },
    #[display("fetch failed after {attempts} attempts for: {}", symbols.join(", "))]
    Exhausted {
        attempts: u32,
        symbols: Vec<String>,
    },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum SignalError {
    #[display("provider response is missing symbols: {}", symbols.join(", "))]
    MissingSymbols { symbols: Vec<String> },
    #[display("latest row has no value for: {}", symbols.join(", "))]
    DataIntegrity { symbols: Vec<String> },
    #[display("insufficient history for {symbol}: need {required}, got {available}")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        available: usize,
    },
    #[display("{symbol} has no close on {date}, inside an indicator window")]
    GapInWindow {
        symbol: String,
        date: chrono::NaiveDate,
    },
    #[display("stale data: latest {latest}, expected {expected}")]
    StaleData {
        latest: chrono::NaiveDate,
        expected: chrono::NaiveDate,
    },
    #[display("indicator computation failed for {symbol}")]
    Indicator { symbol: String },
}

#[derive(Debug, Display, Error)]
pub enum RenderError {
    #[display("failed to write output")]
    Write,
    #[display("failed to serialize decision")]
    Serialize,
}
