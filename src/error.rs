//! Error taxonomy.
//!
//! Two disjoint kinds reach callers of the builder:
//! - [`ConfigurationError`] – raised locally before any collaborator runs.
//! - [`ReportError`] – any failure from template expansion, HTML-to-PDF
//!   rendering, or sink I/O, tagged with the stage it came from.
//!
//! The collaborator contracts report their own failures through
//! [`TemplateError`] and [`RenderError`]; the engine wraps both.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Misuse of the builder or engine configuration. Never wrapped.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Template name must be set before generating report")]
    MissingTemplate,

    #[error("Data model must serialise to an object, got {0}")]
    InvalidModel(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("Failed to read engine configuration '{}': {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure reported by a [`TemplateExpander`](crate::template::TemplateExpander).
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("failed to expand template '{name}': {source}")]
    Expansion {
        name: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("failed to read template '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("template '{name}' is not valid {encoding}")]
    Decode { name: String, encoding: &'static str },
}

/// Failure reported by an [`HtmlRenderer`](crate::pipeline::HtmlRenderer).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("malformed HTML: {0}")]
    Markup(String),

    #[error("layout failed: {0}")]
    Layout(String),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error("failed to write PDF: {0}")]
    Io(#[from] io::Error),
}

impl From<taffy::TaffyError> for RenderError {
    fn from(err: taffy::TaffyError) -> Self {
        RenderError::Layout(err.to_string())
    }
}

/// Which part of the pipeline a [`ReportError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportErrorKind {
    /// Template resolution or expansion.
    Template,
    /// HTML layout or PDF rasterisation.
    Render,
    /// Opening, writing or closing the output sink.
    Io,
}

impl fmt::Display for ReportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportErrorKind::Template => "template",
            ReportErrorKind::Render => "render",
            ReportErrorKind::Io => "io",
        };
        f.write_str(s)
    }
}

/// A failed generation call. Carries a readable message and the original
/// failure as its [`source`](StdError::source).
#[derive(Debug)]
pub struct ReportError {
    kind: ReportErrorKind,
    message: String,
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl ReportError {
    pub fn new<E>(kind: ReportErrorKind, message: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            kind,
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ReportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ReportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<TemplateError> for ReportError {
    fn from(err: TemplateError) -> Self {
        let kind = match err {
            TemplateError::Read { .. } => ReportErrorKind::Io,
            _ => ReportErrorKind::Template,
        };
        ReportError::new(kind, format!("Failed to generate report: {err}"), err)
    }
}

impl From<RenderError> for ReportError {
    fn from(err: RenderError) -> Self {
        let kind = match err {
            RenderError::Io(_) => ReportErrorKind::Io,
            _ => ReportErrorKind::Render,
        };
        ReportError::new(kind, format!("Failed to generate report: {err}"), err)
    }
}

/// Anything a builder terminal can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type Result<T> = std::result::Result<T, Error>;
