use std::io::Write;

use error_stack::{Report, ResultExt};

use crate::error::RenderError;
use crate::render::Renderer;
use crate::signal::Analysis;

/// Pretty-printed JSON document, one per run.
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(
        &self,
        analysis: &Analysis,
        out: &mut dyn Write,
    ) -> Result<(), Report<RenderError>> {
        serde_json::to_writer_pretty(&mut *out, analysis).change_context(RenderError::Serialize)?;
        writeln!(out).change_context(RenderError::Write)
    }
}
