//! Text measurement for the PDF base-14 Helvetica family.
//!
//! The renderer only draws with built-in fonts, so advances come from the
//! Adobe AFM width tables (units of 1/1000 em) instead of parsed font files.
//! Oblique faces share the upright widths.

use printpdf::BuiltinFont;

/// Ascender height as a fraction of the font size.
pub const ASCENT: f32 = 0.718;
/// Descender depth as a fraction of the font size (positive).
pub const DESCENT: f32 = 0.207;

/// Advance widths for U+0020..=U+007E.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// One face of the Helvetica family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Font {
    pub bold: bool,
    pub italic: bool,
}

impl Font {
    pub fn new(bold: bool, italic: bool) -> Self {
        Self { bold, italic }
    }

    /// The printpdf built-in font this face is drawn with.
    pub fn builtin(self) -> BuiltinFont {
        match (self.bold, self.italic) {
            (false, false) => BuiltinFont::Helvetica,
            (true, false) => BuiltinFont::HelveticaBold,
            (false, true) => BuiltinFont::HelveticaOblique,
            (true, true) => BuiltinFont::HelveticaBoldOblique,
        }
    }

    /// Advance width of `c` in 1/1000 em.
    pub fn advance(self, c: char) -> u16 {
        let table = if self.bold { &HELVETICA_BOLD } else { &HELVETICA };
        let code = c as u32;
        if (0x20..=0x7E).contains(&code) {
            return table[(code - 0x20) as usize];
        }
        match c {
            '\u{A0}' => 278,
            '\u{2013}' | '\u{20AC}' | '\u{A3}' | '\u{A5}' => 556,
            '\u{2014}' | '\u{2026}' | '\u{2030}' => 1000,
            '\u{2022}' => 350,
            '\u{B0}' => 400,
            '\u{A9}' | '\u{AE}' => 737,
            '\u{2018}' | '\u{2019}' => {
                if self.bold {
                    278
                } else {
                    222
                }
            }
            '\u{201C}' | '\u{201D}' => {
                if self.bold {
                    500
                } else {
                    333
                }
            }
            c if c.is_uppercase() => {
                if self.bold {
                    722
                } else {
                    667
                }
            }
            _ => {
                if self.bold {
                    611
                } else {
                    556
                }
            }
        }
    }

    /// Width of `text` in points at `font_size`.
    pub fn measure(self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.advance(c) as u32).sum();
        units as f32 * font_size / 1000.0
    }

    /// Split a word that is wider than `max_width` into pieces that fit.
    /// Every piece holds at least one character.
    pub fn break_word(self, word: &str, font_size: f32, max_width: f32) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut width = 0.0;
        for c in word.chars() {
            let w = self.advance(c) as f32 * font_size / 1000.0;
            if width + w > max_width && !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                width = 0.0;
            }
            current.push(c);
            width += w;
        }
        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}
