use std::io::Write;

use error_stack::{Report, ResultExt};

use crate::error::RenderError;
use crate::render::Renderer;
use crate::signal::Analysis;

/// Plain-text dashboard for an interactive terminal.
pub struct TerminalRenderer;

fn up_down(up: bool) -> &'static str {
    if up { "UP" } else { "DOWN" }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "YES" } else { "NO" }
}

impl Renderer for TerminalRenderer {
    fn render(
        &self,
        analysis: &Analysis,
        out: &mut dyn Write,
    ) -> Result<(), Report<RenderError>> {
        let record = &analysis.record;
        let d = &record.diagnostics;
        let f = &record.flags;

        let mut text = String::new();
        text.push_str(&format!("Active Defense | data as of {}\n\n", d.as_of));
        text.push_str(&format!("{}\n", record.signal.headline()));
        text.push_str(&format!("  {}\n", record.allocation));
        text.push_str(&format!("  {}\n", record.rationale));
        if let Some(stale) = &analysis.stale {
            text.push_str(&format!(
                "  WARNING: latest data is {} but {} was expected; market data may be stale\n",
                stale.latest, stale.expected
            ));
        }
        text.push('\n');

        text.push_str(&format!(
            "Volatility  VIX {:.2}  VIX3M {:.2}  5d {:+.1}%  crush {}\n",
            d.vix_spot,
            d.vix_3m,
            d.vix_change_5d * 100.0,
            yes_no(f.vol_crush)
        ));
        text.push_str(&format!(
            "Credit      high yield {:+.1}%  treasuries {:+.1}%  {}\n",
            d.high_yield_return * 100.0,
            d.treasury_return * 100.0,
            if f.credit_stress { "RISK OFF" } else { "RISK ON" }
        ));
        text.push_str(&format!(
            "Leadership  tech {:+.1}%  broad {:+.1}%  {}\n",
            d.tech_return * 100.0,
            d.broad_return * 100.0,
            if f.tech_leads { "TECH" } else { "BROAD" }
        ));
        text.push_str(&format!(
            "Trend       {} {:.2}  SMA {:.2}  MACD {:.3} / {:.3}  {}\n",
            d.tracked_symbol,
            d.tracked_price,
            d.tracked_sma,
            d.macd.macd,
            d.macd.signal,
            record.trend
        ));
        text.push_str(&format!(
            "Defense     dollar {:.2} vs {:.2} {}  gold {:.2} vs {:.2} {}\n",
            d.dollar_price,
            d.dollar_sma,
            up_down(f.dollar_up),
            d.gold_price,
            d.gold_sma,
            up_down(f.gold_up)
        ));

        out.write_all(text.as_bytes())
            .change_context(RenderError::Write)
    }
}
