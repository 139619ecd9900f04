use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::{PricePoint, PriceSeries};
use crate::provider::MarketDataProvider;

const PROVIDER_NAME: &str = "yahoo";
const DAILY_INTERVAL: &str = "1d";

/// Yahoo Finance chart API client for daily bars.
pub struct YahooProvider {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    base_url: String,
    range: String,
    use_adjusted_close: bool,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, Report<ProviderError>> {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(nonzero!(1u32));
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .change_context(ProviderError::Request {
                provider: PROVIDER_NAME.into(),
            })
            .attach("failed to build HTTP client")?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            range: config.range.clone(),
            use_adjusted_close: config.use_adjusted_close,
        })
    }

    async fn fetch_chart(&self, symbol: &str) -> Result<ChartResponse, Report<ProviderError>> {
        // Wait for rate limiter before making the request
        self.rate_limiter.until_ready().await;

        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let params = [
            ("interval", DAILY_INTERVAL),
            ("range", self.range.as_str()),
            ("includeAdjustedClose", "true"),
        ];

        debug!(url = %url, range = %self.range, "requesting chart");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .change_context(ProviderError::Request {
                provider: PROVIDER_NAME.into(),
            })
            .attach_with(|| format!("symbol: {symbol}"))?;

        if !response.status().is_success() {
            return Err(Report::new(ProviderError::Request {
                provider: PROVIDER_NAME.into(),
            })
            .attach(format!("HTTP status: {}", response.status()))
            .attach(format!("symbol: {symbol}")));
        }

        response
            .json()
            .await
            .change_context(ProviderError::ResponseParse {
                provider: PROVIDER_NAME.into(),
            })
            .attach_with(|| format!("symbol: {symbol}"))
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn fetch_history(
        &self,
        symbol: &str,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<ProviderError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let chart = self.fetch_chart(&symbol).await?;
            chart.into_series(&symbol, self.use_adjusted_close)
        })
    }
}

// ── REST response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl ChartResponse {
    fn into_series(
        self,
        symbol: &str,
        use_adjusted_close: bool,
    ) -> Result<PriceSeries, Report<ProviderError>> {
        if let Some(err) = self.chart.error {
            return Err(Report::new(ProviderError::Api {
                provider: PROVIDER_NAME.into(),
                symbol: symbol.to_owned(),
                description: format!("{}: {}", err.code, err.description),
            }));
        }

        let Some(result) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(Report::new(ProviderError::EmptyResponse {
                provider: PROVIDER_NAME.into(),
                symbol: symbol.to_owned(),
            }));
        };

        let adjusted = result
            .indicators
            .adjclose
            .into_iter()
            .next()
            .map(|b| b.adjclose)
            .filter(|v| use_adjusted_close && !v.is_empty());

        let closes = match adjusted {
            Some(values) => values,
            None => result
                .indicators
                .quote
                .into_iter()
                .next()
                .map(|q| q.close)
                .unwrap_or_default(),
        };

        if closes.len() != result.timestamp.len() {
            return Err(Report::new(ProviderError::ResponseParse {
                provider: PROVIDER_NAME.into(),
            })
            .attach(format!(
                "symbol: {symbol}, {} timestamps vs {} closes",
                result.timestamp.len(),
                closes.len()
            )));
        }

        let offset = result.meta.gmtoffset;
        let mut points = Vec::with_capacity(closes.len());
        for (ts, close) in result.timestamp.iter().zip(closes) {
            let Some(local) = DateTime::from_timestamp(ts + offset, 0) else {
                return Err(Report::new(ProviderError::ResponseParse {
                    provider: PROVIDER_NAME.into(),
                })
                .attach(format!("symbol: {symbol}, bad timestamp {ts}")));
            };
            points.push(PricePoint {
                date: local.date_naive(),
                close: close.filter(|c| c.is_finite()),
            });
        }

        Ok(PriceSeries::new(symbol, points))
    }
}
