//! # report-forge – data-driven PDF reports
//!
//! A report is produced in two stages:
//!
//! 1. **Expand** – a template identifier and a [`DataModel`] become HTML
//!    ([`template`], default: MiniJinja over a template directory)
//! 2. **Render** – the HTML becomes a PDF byte stream ([`pipeline`])
//!
//! [`ReportEngine`] runs the stages and normalises their failures into
//! [`ReportError`]; [`ReportBuilder`] collects the template, data and page
//! geometry for one report.
//!
//! The default renderer is itself a pipeline:
//! parse ([`html`], [`css`]) → style ([`style`]) → layout ([`layout`],
//! [`fonts`]) → paginate ([`pagination`]) → draw ([`render`]).

pub mod builder;
pub mod config;
pub mod css;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod html;
pub mod layout;
pub mod layout_config;
pub mod page;
pub mod page_style;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod style;
pub mod template;

// Re-exports for convenience
pub use builder::ReportBuilder;
pub use config::{EngineConfig, Encoding};
pub use engine::ReportEngine;
pub use error::{ConfigurationError, Error, RenderError, ReportError, ReportErrorKind, Result, TemplateError};
pub use page::{PageOrientation, PageSize};
pub use pipeline::{generate_pdf, HtmlRenderer, PdfRenderer, PipelineConfig};
pub use template::{DataModel, MiniJinjaExpander, TemplateExpander};
