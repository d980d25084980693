//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. This is the "frozen" structure that encodes exactly what
//! goes on each page.
//!
//! Boxes are flat and absolutely positioned; the renderer paints them in
//! order, so backgrounds precede the text drawn over them.

use serde::{Deserialize, Serialize};

use crate::page::{PageOrientation, PageSize};

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    /// Visual styling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderStyle>,

    /// Content (mutually exclusive in practice)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    /// Top, right, bottom, left.
    pub widths: [f32; 4],
    pub color: [f32; 4],
}

/// A single run of text in one face, drawn on one baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: [f32; 4],
    pub underline: bool,
    /// Baseline distance from the top of the box.
    pub baseline: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// `data:` URI the image was declared with.
    pub src: String,
}

impl LayoutConfig {
    /// An empty layout for the given paper.
    pub fn new(size: PageSize, orientation: PageOrientation) -> Self {
        let (w, h) = orientation.apply(size.dimensions_pt());
        Self {
            title: Self::default_title(),
            page_width_pt: w,
            page_height_pt: h,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "Report".to_string()
    }

    /// All text runs in page order, joined by spaces. Handy for asserting on
    /// layout output.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .flat_map(|p| p.boxes.iter())
            .filter_map(|b| b.text.as_ref())
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            ..Self::default()
        }
    }

    /// Shift by `(dx, dy)`.
    pub fn translate(mut self, dx: f32, dy: f32) -> Self {
        self.x += dx;
        self.y += dy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_boxes() {
        let mut config = LayoutConfig::new(PageSize::Letter, PageOrientation::Landscape);
        let mut text_box = LayoutBox::new(10.0, 20.0, 100.0, 14.0);
        text_box.text = Some(TextContent {
            text: "Total".into(),
            font_size: 12.0,
            bold: true,
            italic: false,
            color: [0.0, 0.0, 0.0, 1.0],
            underline: false,
            baseline: 11.0,
        });
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![text_box],
        });

        let json = config.to_json().unwrap();
        assert!(!json.contains("background_color"));
        let back = LayoutConfig::from_json(&json).unwrap();
        assert_eq!(back.page_width_pt, 792.0);
        assert_eq!(back.text(), "Total");
        assert_eq!(back.pages[0].boxes[0].text, config.pages[0].boxes[0].text);
    }

    #[test]
    fn missing_title_defaults() {
        let cfg = LayoutConfig::from_json(r#"{"page_width_pt":1,"page_height_pt":2,"pages":[]}"#).unwrap();
        assert_eq!(cfg.title, "Report");
    }
}
