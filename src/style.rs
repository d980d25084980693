//! Style resolver – cascades tag defaults, presentational attributes,
//! stylesheet rules and inline `style` attributes into a flat
//! [`ComputedStyle`] per element.
//!
//! All lengths are in points.

use crate::css::{self, Declaration, Stylesheet};
use crate::html::{Element, Node};

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    pub display: Display,
    pub width: Dimension,

    // Box model
    pub margin: Edges,
    pub padding: Edges,
    pub border: Edges,
    pub border_style: [bool; 4],
    pub border_color: Color,

    // Typography
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Color,
    pub text_align: TextAlign,
    /// Multiple of the font size.
    pub line_height: f32,
    pub text_transform: TextTransform,
    pub list_style: ListStyle,

    pub background_color: Color,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Inline,
            width: Dimension::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            border: Edges::uniform(MEDIUM_BORDER),
            border_style: [false; 4],
            border_color: Color::BLACK,
            font_size: 12.0,
            bold: false,
            italic: false,
            underline: false,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.2,
            text_transform: TextTransform::None,
            list_style: ListStyle::Disc,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

const MEDIUM_BORDER: f32 = 2.25;
const THIN_BORDER: f32 = 0.75;

impl ComputedStyle {
    /// Inherited properties only; everything else back at its initial value.
    pub fn inherit(parent: &ComputedStyle) -> Self {
        Self {
            font_size: parent.font_size,
            bold: parent.bold,
            italic: parent.italic,
            underline: parent.underline,
            color: parent.color,
            text_align: parent.text_align,
            line_height: parent.line_height,
            text_transform: parent.text_transform,
            list_style: parent.list_style,
            ..Self::default()
        }
    }

    /// Effective border widths; sides without a visible style are zero.
    pub fn border_widths(&self) -> Edges {
        let side = |i: usize, w: f32| if self.border_style[i] { w } else { 0.0 };
        Edges {
            top: side(0, self.border.top),
            right: side(1, self.border.right),
            bottom: side(2, self.border.bottom),
            left: side(3, self.border.left),
        }
    }

    pub fn has_border(&self) -> bool {
        let b = self.border_widths();
        b.top > 0.0 || b.right > 0.0 || b.bottom > 0.0 || b.left > 0.0
    }

    /// Background or border – something that paints outside the text.
    pub fn is_decorated(&self) -> bool {
        !self.background_color.is_transparent() || self.has_border()
    }

    pub fn line_height_pt(&self) -> f32 {
        self.font_size * self.line_height
    }

    fn set_border(&mut self, side: usize, width: Option<f32>, visible: Option<bool>, color: Option<Color>) {
        if let Some(w) = width {
            match side {
                0 => self.border.top = w,
                1 => self.border.right = w,
                2 => self.border.bottom = w,
                _ => self.border.left = w,
            }
        }
        if let Some(v) = visible {
            self.border_style[side] = v;
        }
        if let Some(c) = color {
            self.border_color = c;
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTransform {
    None,
    Uppercase,
    Lowercase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Disc,
    Circle,
    Square,
    Decimal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    /// Fraction of the containing width (`0.5` for `50%`).
    Fraction(f32),
}

impl Dimension {
    pub fn resolve(self, containing: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Pt(pt) => Some(pt),
            Dimension::Fraction(f) => Some(containing * f),
        }
    }
}

/// Four-sided lengths.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn uniform(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn from_array([top, right, bottom, left]: [f32; 4]) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::gray(0.0);
    pub const WHITE: Self = Self::gray(1.0);
    pub const GRAY: Self = Self::gray(0.5);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    const fn gray(level: f32) -> Self {
        Self {
            r: level,
            g: level,
            b: level,
            a: 1.0,
        }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    /// `#rgb`, `#rrggbb`, `rgb()`, `rgba()` or a basic colour keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if let Some(hex) = v.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        if let Some(args) = v
            .strip_prefix("rgba(")
            .or_else(|| v.strip_prefix("rgb("))
            .and_then(|s| s.strip_suffix(')'))
        {
            let parts: Vec<&str> = args.split(',').map(str::trim).collect();
            if parts.len() < 3 {
                return None;
            }
            let channel = |s: &str| s.parse::<f32>().ok().map(|n| n.clamp(0.0, 255.0) / 255.0);
            return Some(Self {
                r: channel(parts[0])?,
                g: channel(parts[1])?,
                b: channel(parts[2])?,
                a: parts.get(3).and_then(|a| a.parse().ok()).unwrap_or(1.0),
            });
        }
        let named = match v.as_str() {
            "transparent" => Self::TRANSPARENT,
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "blue" => Self::rgb(0, 0, 255),
            "navy" => Self::rgb(0, 0, 128),
            "maroon" => Self::rgb(128, 0, 0),
            "purple" => Self::rgb(128, 0, 128),
            "teal" => Self::rgb(0, 128, 128),
            "olive" => Self::rgb(128, 128, 0),
            "orange" => Self::rgb(255, 165, 0),
            "yellow" => Self::rgb(255, 255, 0),
            "lime" => Self::rgb(0, 255, 0),
            "aqua" | "cyan" => Self::rgb(0, 255, 255),
            "fuchsia" | "magenta" => Self::rgb(255, 0, 255),
            "gray" | "grey" => Self::GRAY,
            "silver" => Self::rgb(192, 192, 192),
            "lightgray" | "lightgrey" => Self::rgb(211, 211, 211),
            "darkgray" | "darkgrey" => Self::rgb(169, 169, 169),
            "whitesmoke" => Self::rgb(245, 245, 245),
            _ => return None,
        };
        Some(named)
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Self::rgb(r, g, b))
        } else if hex.len() == 3 {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Self::rgb(r, g, b))
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for `element`. `ancestors` runs from the root down to
/// the element's parent.
pub fn resolve_style(
    element: &Element,
    ancestors: &[&Element],
    sheet: &Stylesheet,
    parent: &ComputedStyle,
) -> ComputedStyle {
    let mut style = ComputedStyle::inherit(parent);
    apply_tag_defaults(&mut style, &element.tag);
    apply_presentational_attributes(&mut style, element, ancestors);

    for rule in sheet.matching(element, ancestors) {
        apply_declarations(&mut style, &rule.declarations, parent.font_size);
    }
    if let Some(inline) = element.attr("style") {
        apply_declarations(&mut style, &css::parse_declarations(inline), parent.font_size);
    }
    style
}

/// Default styles based on tag semantics.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &str) {
    let fs = s.font_size;
    match tag {
        "html" | "body" | "div" | "section" | "article" | "header" | "footer" | "main" | "nav"
        | "aside" | "address" | "figure" | "figcaption" | "thead" | "tbody" | "tfoot" => {
            s.display = Display::Block;
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let (scale, margin) = match tag {
                "h1" => (2.0, 0.67),
                "h2" => (1.5, 0.83),
                "h3" => (1.17, 1.0),
                "h4" => (1.0, 1.33),
                "h5" => (0.83, 1.67),
                _ => (0.67, 2.33),
            };
            s.display = Display::Block;
            s.font_size = fs * scale;
            s.bold = true;
            s.margin.top = s.font_size * margin;
            s.margin.bottom = s.font_size * margin;
        }
        "p" => {
            s.display = Display::Block;
            s.margin.top = fs;
            s.margin.bottom = fs;
        }
        "blockquote" => {
            s.display = Display::Block;
            s.margin = Edges::from_array([fs, 30.0, fs, 30.0]);
        }
        "pre" => {
            s.display = Display::Block;
            s.margin.top = fs;
            s.margin.bottom = fs;
        }
        "ul" | "ol" => {
            s.display = Display::Block;
            s.margin.top = fs;
            s.margin.bottom = fs;
            s.padding.left = 30.0;
            s.list_style = if tag == "ol" {
                ListStyle::Decimal
            } else {
                ListStyle::Disc
            };
        }
        "li" => s.display = Display::ListItem,
        "table" => s.display = Display::Table,
        "tr" => s.display = Display::TableRow,
        "td" | "th" => {
            s.display = Display::TableCell;
            s.padding = Edges::uniform(2.0);
            if tag == "th" {
                s.bold = true;
                s.text_align = TextAlign::Center;
            }
        }
        "hr" => {
            s.display = Display::Block;
            s.margin.top = fs * 0.5;
            s.margin.bottom = fs * 0.5;
            s.border_style = [true; 4];
            s.border = Edges::uniform(THIN_BORDER * 0.5);
            s.border_color = Color::GRAY;
        }
        "img" => s.display = Display::Block,
        "b" | "strong" => s.bold = true,
        "i" | "em" | "cite" | "var" => s.italic = true,
        "u" | "ins" => s.underline = true,
        "small" => s.font_size = fs * 0.83,
        "big" => s.font_size = fs * 1.2,
        "head" | "script" | "style" | "title" | "meta" | "link" | "template" => {
            s.display = Display::None;
        }
        // span, a, code, label and unknown tags stay inline.
        _ => {}
    }
}

/// `align`, `bgcolor`, `width` and the table `border` attribute; anything
/// in a stylesheet overrides them.
fn apply_presentational_attributes(s: &mut ComputedStyle, element: &Element, ancestors: &[&Element]) {
    if let Some(align) = element.attr("align") {
        if let Some(a) = parse_text_align(align) {
            s.text_align = a;
        }
    }
    if let Some(c) = element.attr("bgcolor").and_then(Color::parse) {
        s.background_color = c;
    }
    if let Some(width) = element.attr("width") {
        s.width = parse_dimension(width, s.font_size);
    }

    let table_border = |e: &Element| {
        e.attr("border")
            .and_then(|b| b.trim().parse::<f32>().ok())
            .filter(|b| *b > 0.0)
    };
    match element.tag.as_str() {
        "table" => {
            if let Some(b) = table_border(element) {
                s.border = Edges::uniform(b * 0.75);
                s.border_style = [true; 4];
                s.border_color = Color::GRAY;
            }
        }
        "td" | "th" => {
            let enclosing = ancestors.iter().rev().find(|a| a.tag == "table");
            if enclosing.and_then(|t| table_border(*t)).is_some() {
                s.border = Edges::uniform(THIN_BORDER);
                s.border_style = [true; 4];
                s.border_color = Color::GRAY;
            }
        }
        _ => {}
    }
}

/// `parent_font_size` resolves `em` in `font-size`; other lengths use the
/// element's own size.
pub fn apply_declarations(s: &mut ComputedStyle, declarations: &[Declaration], parent_font_size: f32) {
    for decl in declarations {
        apply_css_property(s, &decl.property, &decl.value, parent_font_size);
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str, parent_font_size: f32) {
    let lower = val.to_ascii_lowercase();
    let val = lower.as_str();
    let font_size = s.font_size;
    let len = |v: &str| css::parse_length(v, font_size);

    match prop {
        "display" => {
            s.display = match val {
                "block" | "flex" | "grid" | "inline-block" => Display::Block,
                "inline" => Display::Inline,
                "list-item" => Display::ListItem,
                "table" => Display::Table,
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "font-size" => {
            let size = match val {
                "smaller" => Some(parent_font_size * 0.83),
                "larger" => Some(parent_font_size * 1.2),
                _ => css::parse_percent(val)
                    .map(|f| f * parent_font_size)
                    .or_else(|| css::parse_length(val, parent_font_size)),
            };
            if let Some(size) = size.filter(|v| *v > 0.0) {
                s.font_size = size;
            }
        }
        "font-weight" => {
            s.bold = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => true,
                "normal" | "lighter" | "100" | "200" | "300" | "400" | "500" => false,
                _ => s.bold,
            }
        }
        "font-style" => s.italic = matches!(val, "italic" | "oblique"),
        "font" => {
            // Only the weight, style and size parts of the shorthand.
            for token in val.split_whitespace() {
                match token {
                    "bold" => s.bold = true,
                    "italic" | "oblique" => s.italic = true,
                    _ => {
                        let size = token.split('/').next().unwrap_or(token);
                        if let Some(pt) = css::parse_length(size, parent_font_size) {
                            if pt > 0.0 {
                                s.font_size = pt;
                            }
                        }
                    }
                }
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = val.split_whitespace().find_map(Color::parse) {
                s.background_color = c;
            } else if val == "none" {
                s.background_color = Color::TRANSPARENT;
            }
        }
        "text-align" => {
            if let Some(a) = parse_text_align(val) {
                s.text_align = a;
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.underline = val.split_whitespace().any(|t| t == "underline");
        }
        "text-transform" => {
            s.text_transform = match val {
                "uppercase" => TextTransform::Uppercase,
                "lowercase" => TextTransform::Lowercase,
                _ => TextTransform::None,
            }
        }
        "line-height" => {
            if val == "normal" {
                s.line_height = 1.2;
            } else if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(f) = css::parse_percent(val) {
                s.line_height = f;
            } else if let Some(pt) = len(val) {
                s.line_height = pt / s.font_size;
            }
        }
        "list-style-type" | "list-style" => {
            for token in val.split_whitespace() {
                s.list_style = match token {
                    "disc" => ListStyle::Disc,
                    "circle" => ListStyle::Circle,
                    "square" => ListStyle::Square,
                    "decimal" => ListStyle::Decimal,
                    "none" => ListStyle::None,
                    _ => continue,
                };
            }
        }
        "width" => s.width = parse_dimension(val, s.font_size),
        "margin" => {
            if let Some(m) = css::parse_box_shorthand(val, s.font_size) {
                s.margin = Edges::from_array(m);
            }
        }
        "margin-top" => s.margin.top = len(val).unwrap_or(s.margin.top),
        "margin-right" => s.margin.right = len(val).unwrap_or(s.margin.right),
        "margin-bottom" => s.margin.bottom = len(val).unwrap_or(s.margin.bottom),
        "margin-left" => s.margin.left = len(val).unwrap_or(s.margin.left),
        "padding" => {
            if let Some(p) = css::parse_box_shorthand(val, s.font_size) {
                s.padding = Edges::from_array(p);
            }
        }
        "padding-top" => s.padding.top = len(val).unwrap_or(s.padding.top),
        "padding-right" => s.padding.right = len(val).unwrap_or(s.padding.right),
        "padding-bottom" => s.padding.bottom = len(val).unwrap_or(s.padding.bottom),
        "padding-left" => s.padding.left = len(val).unwrap_or(s.padding.left),
        "border" => {
            let (w, v, c) = parse_border(val, s.font_size);
            for side in 0..4 {
                s.set_border(side, Some(w.unwrap_or(MEDIUM_BORDER)), Some(v), c);
            }
        }
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let (w, v, c) = parse_border(val, s.font_size);
            s.set_border(side_index(prop), Some(w.unwrap_or(MEDIUM_BORDER)), Some(v), c);
        }
        "border-width" => {
            let widths = val
                .split_whitespace()
                .map(|t| border_width(t, s.font_size))
                .collect::<Option<Vec<_>>>();
            if let Some(w) = widths.as_deref().and_then(expand_four) {
                for (side, width) in w.into_iter().enumerate() {
                    s.set_border(side, Some(width), None, None);
                }
            }
        }
        "border-style" => {
            let styles: Vec<bool> = val.split_whitespace().map(is_visible_style).collect();
            if let Some(v) = expand_four(&styles) {
                s.border_style = v;
            }
        }
        "border-color" => {
            if let Some(c) = val.split_whitespace().find_map(Color::parse) {
                s.border_color = c;
            }
        }
        "page-break-before" | "break-before" => {
            s.page_break_before = matches!(val, "always" | "page" | "left" | "right");
        }
        "page-break-after" | "break-after" => {
            s.page_break_after = matches!(val, "always" | "page" | "left" | "right");
        }
        "page-break-inside" | "break-inside" => {
            s.page_break_inside_avoid = matches!(val, "avoid" | "avoid-page");
        }
        _ => {}
    }
}

fn parse_text_align(val: &str) -> Option<TextAlign> {
    match val.trim().to_ascii_lowercase().as_str() {
        "left" | "start" | "justify" => Some(TextAlign::Left),
        "center" | "middle" => Some(TextAlign::Center),
        "right" | "end" => Some(TextAlign::Right),
        _ => None,
    }
}

/// HTML width attributes are bare pixel counts; CSS widths carry units.
fn parse_dimension(val: &str, font_size: f32) -> Dimension {
    let val = val.trim();
    if val == "auto" {
        Dimension::Auto
    } else if let Some(f) = css::parse_percent(val) {
        Dimension::Fraction(f)
    } else {
        css::parse_length(val, font_size)
            .map(Dimension::Pt)
            .unwrap_or(Dimension::Auto)
    }
}

fn side_index(prop: &str) -> usize {
    match prop {
        "border-top" => 0,
        "border-right" => 1,
        "border-bottom" => 2,
        _ => 3,
    }
}

fn is_visible_style(token: &str) -> bool {
    !matches!(token, "none" | "hidden")
}

fn border_width(token: &str, font_size: f32) -> Option<f32> {
    match token {
        "thin" => Some(THIN_BORDER),
        "medium" => Some(MEDIUM_BORDER),
        "thick" => Some(3.75),
        _ => css::parse_length(token, font_size),
    }
}

/// `border` shorthand → (width, visible, colour). Without a style keyword
/// the border is not drawn.
fn parse_border(val: &str, font_size: f32) -> (Option<f32>, bool, Option<Color>) {
    let mut width = None;
    let mut visible = false;
    let mut color = None;
    for token in val.split_whitespace() {
        match token {
            "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset" | "outset" => {
                visible = true
            }
            "none" | "hidden" => return (Some(0.0), false, None),
            _ => {
                if let Some(w) = border_width(token, font_size) {
                    width = Some(w);
                } else if let Some(c) = Color::parse(token) {
                    color = Some(c);
                }
            }
        }
    }
    (width, visible, color)
}

fn expand_four<T: Copy>(v: &[T]) -> Option<[T; 4]> {
    match v {
        [a] => Some([*a, *a, *a, *a]),
        [a, b] => Some([*a, *b, *a, *b]),
        [a, b, c] => Some([*a, *b, *c, *b]),
        [a, b, c, d] => Some([*a, *b, *c, *d]),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: String,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (for images src, colspan, etc.)
        attrs: std::collections::HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Style `body` and its subtree. Elements with `display: none` are dropped.
pub fn build_styled_tree(body: &Element, sheet: &Stylesheet) -> StyledNode {
    let root = ComputedStyle::default();
    let mut style = resolve_style(body, &[], sheet, &root);
    style.display = Display::Block;
    let mut ancestors = vec![body];
    let children = style_children(&body.children, sheet, &mut ancestors, &style);
    StyledNode::Element {
        tag: body.tag.clone(),
        style,
        children,
        attrs: body.attributes.clone(),
    }
}

fn style_children<'a>(
    nodes: &'a [Node],
    sheet: &Stylesheet,
    ancestors: &mut Vec<&'a Element>,
    parent_style: &ComputedStyle,
) -> Vec<StyledNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            Node::Element(e) => {
                let style = resolve_style(e, ancestors, sheet, parent_style);
                if style.display == Display::None {
                    continue;
                }
                ancestors.push(e);
                let children = style_children(&e.children, sheet, ancestors, &style);
                ancestors.pop();
                result.push(StyledNode::Element {
                    tag: e.tag.clone(),
                    style,
                    children,
                    attrs: e.attributes.clone(),
                });
            }
            Node::Text(text) => {
                // Text carries only inherited properties; box-model values
                // belong to the enclosing element.
                result.push(StyledNode::Text {
                    text: text.clone(),
                    style: ComputedStyle::inherit(parent_style),
                });
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_document;

    fn styled(html: &str) -> StyledNode {
        let doc = parse_document(html).unwrap();
        let sheet = Stylesheet::parse(&doc.stylesheet);
        build_styled_tree(&doc.body, &sheet)
    }

    fn child(node: &StyledNode, index: usize) -> &StyledNode {
        match node {
            StyledNode::Element { children, .. } => &children[index],
            StyledNode::Text { .. } => panic!("text has no children"),
        }
    }

    #[test]
    fn inline_style_font_size() {
        let mut s = ComputedStyle::default();
        apply_declarations(&mut s, &css::parse_declarations("font-size: 24px; color: #ff0000"), 12.0);
        assert_eq!(s.font_size, 18.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn color_from_hex() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.r - 1.0).abs() < 0.01);
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("rgb(255, 0, 0)"), Some(Color::rgb(255, 0, 0)));
        assert!(Color::parse("transparent").unwrap().is_transparent());
        assert_eq!(Color::parse("#12"), None);
    }

    #[test]
    fn heading_defaults_scale_with_body() {
        let root = styled("<style>body { font-size: 10pt }</style><h1>T</h1>");
        let h1 = child(&root, 0).style();
        assert_eq!(h1.font_size, 20.0);
        assert!(h1.bold);
        assert_eq!(h1.display, Display::Block);
    }

    #[test]
    fn cascade_order() {
        let root = styled(
            r#"<style>p { color: red; margin: 0 } .note { color: blue }</style>
               <p class="note" style="margin-top: 5pt">x</p>"#,
        );
        let StyledNode::Element { children, .. } = &root else { panic!() };
        let p = children
            .iter()
            .find(|n| matches!(n, StyledNode::Element { tag, .. } if tag == "p"))
            .unwrap()
            .style();
        assert_eq!(p.color, Color::rgb(0, 0, 255));
        assert_eq!(p.margin.top, 5.0);
        assert_eq!(p.margin.bottom, 0.0);
    }

    #[test]
    fn text_inherits_but_drops_box_model() {
        let root = styled(r#"<div style="color: #00ff00; padding: 4pt; background: #eee">hi</div>"#);
        let text = child(child(&root, 0), 0).style();
        assert_eq!(text.color, Color::rgb(0, 255, 0));
        assert_eq!(text.padding, Edges::default());
        assert!(text.background_color.is_transparent());
    }

    #[test]
    fn border_needs_a_style() {
        let mut s = ComputedStyle::default();
        apply_declarations(&mut s, &css::parse_declarations("border: 1pt #000"), 12.0);
        assert!(!s.has_border());
        apply_declarations(&mut s, &css::parse_declarations("border-bottom: 2pt solid #333"), 12.0);
        let b = s.border_widths();
        assert_eq!((b.top, b.bottom), (0.0, 2.0));
    }

    #[test]
    fn table_border_attribute_reaches_cells() {
        let root = styled(r#"<table border="1"><tr><td>a</td></tr></table>"#);
        let table = child(&root, 0);
        let td = child(child(table, 0), 0).style();
        assert!(table.style().has_border());
        assert_eq!(td.border_widths().left, THIN_BORDER);
    }

    #[test]
    fn display_none_is_dropped() {
        let root = styled(r#"<p style="display:none">gone</p><p>kept</p>"#);
        let StyledNode::Element { children, .. } = &root else { panic!() };
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn page_breaks() {
        let mut s = ComputedStyle::default();
        apply_declarations(
            &mut s,
            &css::parse_declarations("page-break-before: always; break-inside: avoid"),
            12.0,
        );
        assert!(s.page_break_before);
        assert!(s.page_break_inside_avoid);
        assert!(!s.page_break_after);
    }
}
