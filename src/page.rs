//! Page geometry value objects.
//!
//! Both types have a canonical string form that the builder writes into the
//! data model under a reserved key, so templates can drive their own `@page`
//! declarations from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Data-model key the builder writes the orientation to.
pub const ORIENTATION_KEY: &str = "pageOrientation";

/// Data-model key the builder writes the page size to.
pub const PAGE_SIZE_KEY: &str = "pageSize";

/// Points per millimetre.
pub const PT_PER_MM: f32 = 72.0 / 25.4;

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

impl PageOrientation {
    pub fn as_str(self) -> &'static str {
        match self {
            PageOrientation::Portrait => "portrait",
            PageOrientation::Landscape => "landscape",
        }
    }

    /// Orient a portrait `(width, height)` pair.
    pub fn apply(self, (w, h): (f32, f32)) -> (f32, f32) {
        match self {
            PageOrientation::Portrait => (w.min(h), w.max(h)),
            PageOrientation::Landscape => (w.max(h), w.min(h)),
        }
    }
}

impl fmt::Display for PageOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(PageOrientation::Portrait),
            "landscape" => Ok(PageOrientation::Landscape),
            other => Err(format!("unknown page orientation '{other}'")),
        }
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210mm × 297mm
    #[default]
    A4,
    /// 8.5in × 11in
    #[serde(rename = "letter")]
    Letter,
    /// 8.5in × 14in
    #[serde(rename = "legal")]
    Legal,
    /// 297mm × 420mm
    A3,
    /// 148mm × 210mm
    A5,
}

impl PageSize {
    pub const ALL: [PageSize; 5] = [
        PageSize::A4,
        PageSize::Letter,
        PageSize::Legal,
        PageSize::A3,
        PageSize::A5,
    ];

    /// Canonical name as it appears in the data model and in CSS.
    pub fn as_str(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "letter",
            PageSize::Legal => "legal",
            PageSize::A3 => "A3",
            PageSize::A5 => "A5",
        }
    }

    /// Portrait `(width, height)` in points.
    pub fn dimensions_pt(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0 * PT_PER_MM, 297.0 * PT_PER_MM),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::A3 => (297.0 * PT_PER_MM, 420.0 * PT_PER_MM),
            PageSize::A5 => (148.0 * PT_PER_MM, 210.0 * PT_PER_MM),
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageSize {
    type Err = String;

    /// Case-insensitive: `a4`, `Letter` and `LEGAL` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        PageSize::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("unknown page size '{needle}'"))
    }
}
