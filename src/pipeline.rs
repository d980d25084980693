//! Pipeline – ties together parsing, styling, layout, pagination, and
//! rendering behind the [`HtmlRenderer`] seam.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::css::Stylesheet;
use crate::error::RenderError;
use crate::html::parse_document;
use crate::layout::compute_layout;
use crate::layout_config::LayoutConfig;
use crate::page::{PageOrientation, PageSize, PT_PER_MM};
use crate::pagination::paginate;
use crate::render::render_pdf;
use crate::style::{build_styled_tree, Edges};

/// Turns a complete HTML document into a PDF byte stream.
///
/// Implementations must write a complete document starting with `%PDF` and
/// flush `sink` before returning `Ok`. They are shared between threads, so
/// each call must be independent.
pub trait HtmlRenderer: Send + Sync {
    fn render(&self, html: &str, sink: &mut dyn Write) -> Result<(), RenderError>;
}

/// Fallback page geometry and metadata, used where the HTML does not
/// declare its own (`@page`, `<title>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Document title embedded in the PDF metadata (default: "Report").
    pub title: String,
    pub page_size: PageSize,
    pub orientation: PageOrientation,
    /// Page margin in points on every side (default: 2cm).
    pub margin_pt: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "Report".to_string(),
            page_size: PageSize::A4,
            orientation: PageOrientation::Portrait,
            margin_pt: 20.0 * PT_PER_MM,
        }
    }
}

impl PipelineConfig {
    /// Page width and height in points after applying orientation.
    pub fn page_dimensions(&self) -> (f32, f32) {
        self.orientation.apply(self.page_size.dimensions_pt())
    }

    pub fn landscape(page_size: PageSize) -> Self {
        Self {
            page_size,
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }
}

/// The built-in renderer: a small HTML/CSS layout engine drawing with the
/// PDF base-14 Helvetica fonts.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    config: PipelineConfig,
}

impl PdfRenderer {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl HtmlRenderer for PdfRenderer {
    fn render(&self, html: &str, sink: &mut dyn Write) -> Result<(), RenderError> {
        let (bytes, _) = generate_pdf(html, &self.config)?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(())
    }
}

/// Full pipeline: HTML string → PDF bytes, plus the layout they were drawn
/// from.
pub fn generate_pdf(html: &str, config: &PipelineConfig) -> Result<(Vec<u8>, LayoutConfig), RenderError> {
    let layout = compute_layout_config(html, config)?;
    let pdf_bytes = render_pdf(&layout)?;
    Ok((pdf_bytes, layout))
}

/// Generate only the layout config (no PDF rendering) – useful for testing.
pub fn compute_layout_config(html: &str, config: &PipelineConfig) -> Result<LayoutConfig, RenderError> {
    // 1. Parse HTML
    let doc = parse_document(html)?;
    let sheet = Stylesheet::parse(&doc.stylesheet);

    // 2. Page geometry: `@page` wins over the configured fallback
    let page_rule = sheet.page.unwrap_or_default();
    let (page_w, page_h) = page_rule.size.unwrap_or_else(|| config.page_dimensions());
    let margins = page_rule
        .margin
        .map(Edges::from_array)
        .unwrap_or_else(|| Edges::uniform(config.margin_pt));
    let content_w = page_w - margins.horizontal();
    let content_h = page_h - margins.vertical();
    if content_w <= 0.0 || content_h <= 0.0 {
        return Err(RenderError::Pdf(format!(
            "page margins leave no room for content on a {page_w:.0}x{page_h:.0}pt page"
        )));
    }
    log::debug!("Page {page_w:.1}x{page_h:.1}pt, content area {content_w:.1}x{content_h:.1}pt");

    // 3. Style, lay out, paginate
    let styled = build_styled_tree(&doc.body, &sheet);
    let fragments = compute_layout(&styled, content_w, content_h)?;
    let mut layout = paginate(fragments, page_w, page_h, margins);
    layout.title = doc
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| config.title.clone());
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_basic() {
        let html = "<h1>Hello</h1><p>World</p>";
        let (bytes, config) = generate_pdf(html, &PipelineConfig::default()).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(config.pages.len(), 1);
        assert_eq!(&bytes[0..5], b"%PDF-");
        assert_eq!(config.text(), "Hello World");
    }

    #[test]
    fn renderer_writes_to_sink() {
        let mut sink = Vec::new();
        PdfRenderer::default().render("<p>x</p>", &mut sink).unwrap();
        assert!(sink.starts_with(b"%PDF"));
    }

    #[test]
    fn page_rule_overrides_config() {
        let html = "<style>@page { size: letter landscape; margin: 1in; }</style><p>x</p>";
        let layout = compute_layout_config(html, &PipelineConfig::default()).unwrap();
        assert_eq!((layout.page_width_pt, layout.page_height_pt), (792.0, 612.0));
        let first = &layout.pages[0].boxes[0];
        assert_eq!((first.x, first.y), (72.0, 72.0));
    }

    #[test]
    fn config_geometry_is_the_fallback() {
        let config = PipelineConfig::landscape(PageSize::A5);
        let layout = compute_layout_config("<p>x</p>", &config).unwrap();
        let (w, h) = PageSize::A5.dimensions_pt();
        assert_eq!((layout.page_width_pt, layout.page_height_pt), (h, w));
    }

    #[test]
    fn title_from_document() {
        let html = "<html><head><title>Q3 Sales</title></head><body><p>x</p></body></html>";
        let layout = compute_layout_config(html, &PipelineConfig::default()).unwrap();
        assert_eq!(layout.title, "Q3 Sales");
        let layout = compute_layout_config("<p>x</p>", &PipelineConfig::default()).unwrap();
        assert_eq!(layout.title, "Report");
    }

    #[test]
    fn long_documents_paginate() {
        let rows: String = (0..200).map(|i| format!("<tr><td>{i}</td><td>row</td></tr>")).collect();
        let html = format!("<table>{rows}</table>");
        let layout = compute_layout_config(&html, &PipelineConfig::default()).unwrap();
        assert!(layout.pages.len() > 1);
        for page in &layout.pages {
            for b in &page.boxes {
                assert!(b.y + b.height <= layout.page_height_pt - 56.0);
            }
        }
    }

    #[test]
    fn malformed_markup_is_reported() {
        let err = generate_pdf("<p>unterminated <b", &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::Markup(_)));
    }

    #[test]
    fn margins_must_leave_content() {
        let html = "<style>@page { size: A5; margin: 300pt; }</style>";
        assert!(matches!(
            compute_layout_config(html, &PipelineConfig::default()),
            Err(RenderError::Pdf(_))
        ));
    }
}
