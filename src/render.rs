pub mod json;
pub mod terminal;

use std::io::Write;

use error_stack::Report;

use crate::error::RenderError;
use crate::signal::Analysis;

/// Sink that presents an analysis to the user.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        analysis: &Analysis,
        out: &mut dyn Write,
    ) -> Result<(), Report<RenderError>>;
}

pub fn build_renderer(format: &str) -> Box<dyn Renderer> {
    match format {
        "json" => Box::new(json::JsonRenderer),
        _ => Box::new(terminal::TerminalRenderer),
    }
}

pub const LEGEND: &str = "\
Strategy logic
  GREEN      trend up, momentum up, macro safe: 3x leverage when VIX < 20, else 2x
             (tech fund when QQQ leads SPY over 63 days, else S&P fund)
  YELLOW     above trend but MACD below signal: hold the current position
  RED-HEDGE  risk high and the dollar trending up: KMLM / BTAL / UUP basket
  RED-GOLD   risk high, dollar down, gold above its 200-day average: gold
  RED-CASH   risk high, dollar and gold both down: treasury bills
Risk is high when VIX trades above VIX3M, when high yield lags treasuries
over 20 days, or when the tracked index is below its 200-day average.
";
