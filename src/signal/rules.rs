use crate::config::{BasketConfig, SignalConfig};
use crate::signal::snapshot::{IndicatorSnapshot, MarketFlags};
use crate::signal::{
    DecisionRecord, Leverage, LeverageFamily, LeveragedPosition, SignalClass, TrendStatus,
};

/// Trend status from the tracked asset's position against its long average
/// and MACD momentum. Below the average is RED whatever momentum says.
pub fn classify_trend(above_sma: bool, macd_bullish: bool) -> TrendStatus {
    match (above_sma, macd_bullish) {
        (false, _) => TrendStatus::Red,
        (true, true) => TrendStatus::Green,
        (true, false) => TrendStatus::Yellow,
    }
}

/// Defense rotation, checked in priority order: dollar, then gold, then cash.
pub fn defense_branch(dollar_up: bool, gold_up: bool) -> SignalClass {
    if dollar_up {
        SignalClass::RedHedge
    } else if gold_up {
        SignalClass::RedGold
    } else {
        SignalClass::RedCash
    }
}

pub fn leveraged_position(
    tech_leads: bool,
    vix_spot: f64,
    signal: &SignalConfig,
    baskets: &BasketConfig,
) -> LeveragedPosition {
    let family = if tech_leads {
        LeverageFamily::Tech
    } else {
        LeverageFamily::Spy
    };
    let leverage = if vix_spot < signal.leverage_vix_threshold {
        Leverage::X3
    } else {
        Leverage::X2
    };
    let ticker = match (family, leverage) {
        (LeverageFamily::Tech, Leverage::X3) => &baskets.tech_3x,
        (LeverageFamily::Tech, Leverage::X2) => &baskets.tech_2x,
        (LeverageFamily::Spy, Leverage::X3) => &baskets.spy_3x,
        (LeverageFamily::Spy, Leverage::X2) => &baskets.spy_2x,
    };
    LeveragedPosition {
        family,
        leverage,
        ticker: ticker.clone(),
    }
}

/// Turn a snapshot into the final recommendation. Macro safety outranks trend.
pub fn decide(
    snapshot: IndicatorSnapshot,
    signal: &SignalConfig,
    baskets: &BasketConfig,
) -> DecisionRecord {
    let flags = snapshot.flags(signal);
    let trend = classify_trend(flags.above_sma, flags.macd_bullish);

    let (class, position, allocation, rationale) = if !flags.macro_safe || trend == TrendStatus::Red
    {
        let class = defense_branch(flags.dollar_up, flags.gold_up);
        let (basket, action) = match class {
            SignalClass::RedHedge => (&baskets.hedge, "Dollar rising: hold the hedge basket."),
            SignalClass::RedGold => (
                &baskets.gold,
                "Dollar falling, gold trending up: rotate into gold.",
            ),
            _ => (&baskets.cash, "Dollar and gold both falling: move to cash."),
        };
        let causes = risk_causes(&snapshot, &flags, trend);
        (
            class,
            None,
            format!("BUY {basket}"),
            format!("Risk high ({causes}). {action}"),
        )
    } else if trend == TrendStatus::Green {
        let position = leveraged_position(flags.tech_leads, snapshot.vix_spot, signal, baskets);
        let allocation = format!(
            "BUY 100% {} ({} leverage)",
            position.ticker, position.leverage
        );
        let rationale = format!(
            "Trend green. Volatility {:.1}. Set {:.0}% trailing stop.",
            snapshot.vix_spot, signal.trailing_stop_pct
        );
        (SignalClass::Green, Some(position), allocation, rationale)
    } else {
        (
            SignalClass::Yellow,
            None,
            "HOLD CURRENT POSITION".to_owned(),
            "Above trend but momentum fading. Maintain current exposure.".to_owned(),
        )
    };

    DecisionRecord {
        signal: class,
        trend,
        position,
        allocation,
        rationale,
        flags,
        diagnostics: snapshot,
    }
}

fn risk_causes(snapshot: &IndicatorSnapshot, flags: &MarketFlags, trend: TrendStatus) -> String {
    let mut causes = Vec::new();
    if flags.panic {
        causes.push(format!(
            "VIX {:.2} above VIX3M {:.2}",
            snapshot.vix_spot, snapshot.vix_3m
        ));
    }
    if flags.credit_stress {
        causes.push(format!(
            "high yield {:.1}% lagging treasuries {:.1}%",
            snapshot.high_yield_return * 100.0,
            snapshot.treasury_return * 100.0
        ));
    }
    if trend == TrendStatus::Red {
        causes.push(format!(
            "{} {:.2} below trend {:.2}",
            snapshot.tracked_symbol, snapshot.tracked_price, snapshot.tracked_sma
        ));
    }
    causes.join("; ")
}
