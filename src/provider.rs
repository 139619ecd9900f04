pub mod yahoo;

use std::time::Duration;

use error_stack::Report;
use futures::future::BoxFuture;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::model::PriceSeries;

/// Source of daily close history.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn MarketDataProvider`).
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the full configured history window for one symbol.
    fn fetch_history(
        &self,
        symbol: &str,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<ProviderError>>>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Fetch every symbol, re-requesting only the ones that failed, for up to
/// `policy.max_attempts` rounds. Returns series in the order of `symbols`.
pub async fn fetch_basket(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    policy: RetryPolicy,
) -> Result<Vec<PriceSeries>, Report<ProviderError>> {
    let mut fetched: Vec<Option<PriceSeries>> = vec![None; symbols.len()];
    let mut last_error: Option<Report<ProviderError>> = None;

    for attempt in 1..=policy.max_attempts {
        let pending: Vec<usize> = (0..symbols.len())
            .filter(|&i| fetched[i].is_none())
            .collect();
        if pending.is_empty() {
            break;
        }

        if attempt > 1 {
            sleep(policy.delay).await;
        }

        info!(
            provider = provider.name(),
            attempt,
            pending = pending.len(),
            "fetching price history"
        );

        for i in pending {
            let symbol = &symbols[i];
            match provider.fetch_history(symbol).await {
                Ok(series) if series.closes().is_empty() => {
                    warn!(symbol = %symbol, attempt, "provider returned no prices");
                    last_error = Some(Report::new(ProviderError::EmptyResponse {
                        provider: provider.name().to_owned(),
                        symbol: symbol.clone(),
                    }));
                }
                Ok(series) => {
                    info!(symbol = %symbol, points = series.points.len(), "history fetched");
                    fetched[i] = Some(series);
                }
                Err(e) => {
                    warn!(symbol = %symbol, attempt, error = %e, "history fetch failed");
                    last_error = Some(e);
                }
            }
        }
    }

    let failed: Vec<String> = symbols
        .iter()
        .zip(&fetched)
        .filter(|(_, s)| s.is_none())
        .map(|(sym, _)| sym.clone())
        .collect();

    if !failed.is_empty() {
        let exhausted = ProviderError::Exhausted {
            attempts: policy.max_attempts,
            symbols: failed,
        };
        return Err(match last_error {
            Some(report) => report.change_context(exhausted),
            None => Report::new(exhausted),
        });
    }

    Ok(fetched.into_iter().flatten().collect())
}
