//! Report engine – the two-stage pipeline (template expansion, then HTML to
//! PDF) with failures normalised into [`ReportError`].

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::builder::ReportBuilder;
use crate::config::EngineConfig;
use crate::error::{ReportError, ReportErrorKind};
use crate::pipeline::{HtmlRenderer, PdfRenderer};
use crate::template::{DataModel, MiniJinjaExpander, TemplateExpander};

/// Runs report generations. Immutable after construction and safe to share
/// between threads; every call is independent of earlier ones.
pub struct ReportEngine {
    config: EngineConfig,
    expander: Box<dyn TemplateExpander>,
    renderer: Box<dyn HtmlRenderer>,
}

impl ReportEngine {
    /// Engine with the built-in MiniJinja expander and PDF renderer.
    pub fn new(config: EngineConfig) -> Self {
        let expander = MiniJinjaExpander::new(&config);
        let renderer = PdfRenderer::new(config.renderer.clone());
        Self::with_collaborators(config, Box::new(expander), Box::new(renderer))
    }

    /// Engine with caller-supplied collaborators.
    pub fn with_collaborators(
        config: EngineConfig,
        expander: Box<dyn TemplateExpander>,
        renderer: Box<dyn HtmlRenderer>,
    ) -> Self {
        Self {
            config,
            expander,
            renderer,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A fresh builder bound to this engine.
    pub fn builder(&self) -> ReportBuilder<'_> {
        ReportBuilder::new(self)
    }

    /// Expand `template` against `model` and render the result into `sink`.
    ///
    /// The PDF is built in memory first. Nothing is written to `sink`
    /// unless generation succeeded; on success the sink holds a complete,
    /// flushed PDF.
    pub fn generate_report(&self, template: &str, model: &DataModel, sink: &mut dyn Write) -> Result<(), ReportError> {
        log::info!("Generating report using template: {template}");
        self.run(template, model, sink)
            .inspect(|()| log::info!("Report generated from template: {template}"))
            .inspect_err(|e| log::error!("{e}"))
    }

    fn run(&self, template: &str, model: &DataModel, sink: &mut dyn Write) -> Result<(), ReportError> {
        let html = self.expander.expand(template, model)?;
        log::debug!("Expanded '{template}' into {} bytes of HTML", html.len());

        let mut pdf = Vec::new();
        self.renderer.render(&html, &mut pdf)?;
        log::debug!("Rendered '{template}' to {} bytes of PDF", pdf.len());

        sink.write_all(&pdf)
            .and_then(|()| sink.flush())
            .map_err(|e| ReportError::new(ReportErrorKind::Io, format!("Failed to write report: {e}"), e))
    }

    /// [`generate_report`](Self::generate_report) into a new file at `path`.
    ///
    /// The file is flushed and closed on every path. When generation fails
    /// the file is removed, so no partial output is left behind.
    pub fn generate_report_to_file(
        &self,
        template: &str,
        model: &DataModel,
        path: impl AsRef<Path>,
    ) -> Result<(), ReportError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            let err = ReportError::new(
                ReportErrorKind::Io,
                format!("Failed to write report to file: {}: {e}", path.display()),
                e,
            );
            log::error!("{err}");
            err
        })?;

        let mut writer = BufWriter::new(file);
        let result = self.generate_report(template, model, &mut writer).and_then(|()| {
            writer.flush().map_err(|e| {
                ReportError::new(
                    ReportErrorKind::Io,
                    format!("Failed to write report to file: {}: {e}", path.display()),
                    e,
                )
            })
        });
        // Close before removing.
        drop(writer);

        if result.is_err() {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("Could not remove incomplete report {}: {e}", path.display());
            }
        }
        result
    }

    /// [`generate_report`](Self::generate_report) into memory. Partial
    /// output is discarded on failure.
    pub fn generate_report_as_bytes(&self, template: &str, model: &DataModel) -> Result<Vec<u8>, ReportError> {
        let mut buffer = Vec::new();
        self.generate_report(template, model, &mut buffer)?;
        Ok(buffer)
    }
}

impl Default for ReportEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for ReportEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportEngine").field("config", &self.config).finish_non_exhaustive()
    }
}
