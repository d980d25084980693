//! Layout engine – uses Taffy to position the styled tree (block flow for
//! ordinary elements, flex rows for tables) and measures inline text and
//! images through Taffy's measure callback. The positioned tree is then
//! flattened into a vertical stream of [`Fragment`]s for the paginator.
//!
//! A fragment is the smallest unit that never splits across pages: one line
//! of inline text, one table row, one image, or a whole decorated block when
//! it fits on a page. Box coordinates are relative to the left edge of the
//! content area (x) and to the top of their fragment (y).

use std::collections::HashMap;

use taffy::prelude::*;
use taffy::TaffyError;

use crate::error::RenderError;
use crate::fonts::{Font, ASCENT, DESCENT};
use crate::layout_config::{BorderStyle, ImageContent, LayoutBox, TextContent};
use crate::render::parse_data_uri;
use crate::style::{self, ComputedStyle, Edges, ListStyle, StyledNode, TextAlign, TextTransform};

/// Gap between a list marker and the item text, in points.
const MARKER_GAP: f32 = 6.0;
/// Narrowest an auto-width table column is squeezed to.
const MIN_COLUMN_WIDTH: f32 = 12.0;
/// Largest `colspan` honoured, as in HTML.
const MAX_COLSPAN: usize = 1000;
/// Vertical gaps below this are rounding noise, not margins.
const GAP_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Painted content; placed as a unit.
    Content,
    /// Vertical margin; dropped at the top of a page.
    Margin,
    /// Forced page break.
    PageBreak,
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub height: f32,
    pub boxes: Vec<LayoutBox>,
}

impl Fragment {
    pub fn content(height: f32, boxes: Vec<LayoutBox>) -> Self {
        Self {
            kind: FragmentKind::Content,
            height,
            boxes,
        }
    }

    pub fn margin(height: f32) -> Self {
        Self {
            kind: FragmentKind::Margin,
            height,
            boxes: Vec::new(),
        }
    }

    pub fn page_break() -> Self {
        Self {
            kind: FragmentKind::PageBreak,
            height: 0.0,
            boxes: Vec::new(),
        }
    }

    /// Text of every run in this fragment, space separated.
    pub fn text(&self) -> String {
        self.boxes
            .iter()
            .filter_map(|b| b.text.as_ref())
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Lay out `root` (the styled `<body>`) into a content area of the given
/// size. `content_height` decides which decorated blocks can stay whole.
pub fn compute_layout(root: &StyledNode, content_width: f32, content_height: f32) -> Result<Vec<Fragment>, RenderError> {
    let mut builder = LayoutBuilder::new(content_height);
    let body: Vec<NodeId> = builder.build_block(root, content_width, None)?.into_iter().collect();

    // The flex wrapper keeps the body's margins inside the document.
    let root_style = Style {
        display: Display::Flex,
        flex_direction: FlexDirection::Column,
        size: Size {
            width: Dimension::Length(content_width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };
    let wrapper = builder.taffy.new_with_children(root_style, &body)?;

    builder.taffy.compute_layout_with_measure(
        wrapper,
        Size {
            width: AvailableSpace::Definite(content_width),
            height: AvailableSpace::MaxContent,
        },
        |known, available, _node, leaf, _style| match leaf {
            Some(Leaf::Text(run)) => run.measure(known, available),
            Some(Leaf::Image(image)) => image.measure(known, available),
            None => Size {
                width: 0.0,
                height: 0.0,
            },
        },
    )?;

    let mut flow = Vec::new();
    for node in body {
        builder.flatten(node, 0.0, 0.0, &mut flow)?;
    }
    let end = builder.taffy.layout(wrapper)?.size.height;
    Ok(into_fragments(flow, end))
}

/// Painted content in document coordinates, in document order.
#[derive(Debug)]
enum Flow {
    /// Boxes occupying `top..bottom`.
    Unit { top: f32, bottom: f32, boxes: Vec<LayoutBox> },
    Break { at: f32 },
}

/// Gaps between units become margin fragments; box y becomes relative to
/// the fragment top.
fn into_fragments(flow: Vec<Flow>, end: f32) -> Vec<Fragment> {
    fn gap(out: &mut Vec<Fragment>, height: f32) {
        if height > GAP_EPSILON {
            out.push(Fragment::margin(height));
        }
    }

    let mut out = Vec::new();
    let mut cursor = 0.0f32;
    for f in flow {
        match f {
            Flow::Unit { top, bottom, boxes } => {
                gap(&mut out, top - cursor);
                let boxes = boxes.into_iter().map(|b| b.translate(0.0, -top)).collect();
                out.push(Fragment::content(bottom - top, boxes));
                cursor = cursor.max(bottom);
            }
            Flow::Break { at } => {
                gap(&mut out, at - cursor);
                cursor = cursor.max(at);
                out.push(Fragment::page_break());
            }
        }
    }
    gap(&mut out, end - cursor);
    out
}

fn is_block_level(node: &StyledNode) -> bool {
    match node {
        StyledNode::Text { .. } => false,
        StyledNode::Element { style, .. } => style.display != style::Display::Inline,
    }
}

fn color_array(c: style::Color) -> [f32; 4] {
    [c.r, c.g, c.b, c.a]
}

/// Background and border box; `None` when it paints nothing.
fn decoration_box(style: &ComputedStyle, x: f32, y: f32, width: f32, height: f32, widths: [f32; 4]) -> Option<LayoutBox> {
    let background = (!style.background_color.is_transparent()).then(|| color_array(style.background_color));
    let border = widths.iter().any(|w| *w > 0.0).then(|| BorderStyle {
        widths,
        color: color_array(style.border_color),
    });
    if background.is_none() && border.is_none() {
        return None;
    }
    let mut b = LayoutBox::new(x, y, width, height);
    b.background_color = background;
    b.border = border;
    Some(b)
}

fn list_marker(style: ListStyle, index: usize) -> Option<String> {
    match style {
        ListStyle::Disc => Some("\u{2022}".to_string()),
        ListStyle::Circle => Some("o".to_string()),
        ListStyle::Square => Some("-".to_string()),
        ListStyle::Decimal => Some(format!("{index}.")),
        ListStyle::None => None,
    }
}

// ---------------------------------------------------------------------------
// Inline content
// ---------------------------------------------------------------------------

/// The text-relevant part of a computed style.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TextStyle {
    font: Font,
    size: f32,
    color: [f32; 4],
    underline: bool,
    line_height: f32,
}

impl TextStyle {
    fn of(style: &ComputedStyle) -> Self {
        Self {
            font: Font::new(style.bold, style.italic),
            size: style.font_size,
            color: color_array(style.color),
            underline: style.underline,
            line_height: style.line_height_pt(),
        }
    }

    /// (top of line box to baseline, baseline to bottom of line box)
    fn vertical_metrics(&self) -> (f32, f32) {
        let half_leading = (self.line_height - self.size * (ASCENT + DESCENT)) / 2.0;
        let above = half_leading + self.size * ASCENT;
        (above, self.line_height - above)
    }
}

#[derive(Debug, Clone)]
struct Word {
    text: String,
    style: TextStyle,
    width: f32,
    space_before: bool,
}

#[derive(Debug, Clone)]
enum Piece {
    Word(Word),
    Break,
}

fn transform(text: &str, t: TextTransform) -> String {
    match t {
        TextTransform::None => text.to_string(),
        TextTransform::Uppercase => text.to_uppercase(),
        TextTransform::Lowercase => text.to_lowercase(),
    }
}

fn collect_pieces(node: &StyledNode, pieces: &mut Vec<Piece>, pending_space: &mut bool) {
    match node {
        StyledNode::Text { text, style } => {
            let text = transform(text, style.text_transform);
            let ts = TextStyle::of(style);
            if text.starts_with(char::is_whitespace) {
                *pending_space = true;
            }
            for word in text.split_whitespace() {
                pieces.push(Piece::Word(Word {
                    text: word.to_string(),
                    style: ts,
                    width: ts.font.measure(word, ts.size),
                    space_before: *pending_space,
                }));
                *pending_space = true;
            }
            *pending_space = text.ends_with(char::is_whitespace) || (text.trim().is_empty() && *pending_space);
        }
        StyledNode::Element { tag, children, .. } => {
            if tag == "br" {
                pieces.push(Piece::Break);
                *pending_space = false;
                return;
            }
            for child in children {
                collect_pieces(child, pieces, pending_space);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Placed {
    word: Word,
    x: f32,
}

/// Greedy line filling. Words wider than the line are split by character.
fn break_lines(pieces: &[Piece], width: f32) -> Vec<Vec<Placed>> {
    let mut lines = Vec::new();
    let mut line: Vec<Placed> = Vec::new();
    let mut line_w = 0.0f32;

    for piece in pieces {
        let word = match piece {
            Piece::Break => {
                lines.push(std::mem::take(&mut line));
                line_w = 0.0;
                continue;
            }
            Piece::Word(w) => w,
        };

        let space = |w: &Word| w.style.font.measure(" ", w.style.size);
        let mut gap = if !line.is_empty() && word.space_before { space(word) } else { 0.0 };
        if !line.is_empty() && line_w + gap + word.width > width {
            lines.push(std::mem::take(&mut line));
            line_w = 0.0;
            gap = 0.0;
        }

        if line.is_empty() && word.width > width {
            let parts = word.style.font.break_word(&word.text, word.style.size, width);
            let count = parts.len();
            for (i, part) in parts.into_iter().enumerate() {
                let part_w = word.style.font.measure(&part, word.style.size);
                line.push(Placed {
                    word: Word {
                        text: part,
                        width: part_w,
                        space_before: false,
                        ..word.clone()
                    },
                    x: 0.0,
                });
                line_w = part_w;
                if i + 1 < count {
                    lines.push(std::mem::take(&mut line));
                }
            }
            continue;
        }

        let x = line_w + gap;
        line_w = x + word.width;
        line.push(Placed { word: word.clone(), x });
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// One broken line with its vertical metrics.
struct LineBox {
    words: Vec<Placed>,
    width: f32,
    above: f32,
    below: f32,
}

/// A run of inline content inside a block: the text Taffy measures.
struct InlineRun {
    pieces: Vec<Piece>,
    strut: TextStyle,
    align: TextAlign,
}

impl InlineRun {
    fn lines(&self, width: f32) -> Vec<LineBox> {
        break_lines(&self.pieces, width)
            .into_iter()
            .map(|words| {
                let (mut above, mut below) = self.strut.vertical_metrics();
                for p in &words {
                    let (a, b) = p.word.style.vertical_metrics();
                    above = above.max(a);
                    below = below.max(b);
                }
                let width = words.last().map(|p| p.x + p.word.width).unwrap_or(0.0);
                LineBox {
                    words,
                    width,
                    above,
                    below,
                }
            })
            .collect()
    }

    fn widest_word(&self) -> f32 {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Word(w) => Some(w.width),
                Piece::Break => None,
            })
            .fold(0.0, f32::max)
    }

    fn measure(&self, known: Size<Option<f32>>, available: Size<AvailableSpace>) -> Size<f32> {
        let limit = known.width.unwrap_or(match available.width {
            AvailableSpace::Definite(w) => w,
            AvailableSpace::MinContent => self.widest_word(),
            AvailableSpace::MaxContent => f32::INFINITY,
        });
        let lines = self.lines(limit);
        let used = lines.iter().map(|l| l.width).fold(0.0, f32::max);
        let height = lines.iter().map(|l| l.above + l.below).sum();
        Size {
            width: known.width.unwrap_or(if limit.is_finite() { limit.max(used) } else { used }),
            height: known.height.unwrap_or(height),
        }
    }

    /// One unit per line, at the leaf's final position.
    fn flatten(&self, x: f32, y: f32, width: f32, out: &mut Vec<Flow>) {
        let mut top = y;
        for line in self.lines(width) {
            let height = line.above + line.below;
            let offset = match self.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => ((width - line.width) / 2.0).max(0.0),
                TextAlign::Right => (width - line.width).max(0.0),
            };
            let boxes = merge_runs(&line.words)
                .into_iter()
                .map(|(run_x, text, ts)| {
                    let mut b = LayoutBox::new(x + offset + run_x, top, ts.font.measure(&text, ts.size), height);
                    b.text = Some(TextContent {
                        text,
                        font_size: ts.size,
                        bold: ts.font.bold,
                        italic: ts.font.italic,
                        color: ts.color,
                        underline: ts.underline,
                        baseline: line.above,
                    });
                    b
                })
                .collect();
            out.push(Flow::Unit {
                top,
                bottom: top + height,
                boxes,
            });
            top += height;
        }
    }
}

/// Consecutive words of one style become a single run:
/// `(x, text, style)`.
fn merge_runs(line: &[Placed]) -> Vec<(f32, String, TextStyle)> {
    let mut runs: Vec<(f32, String, TextStyle)> = Vec::new();
    for p in line {
        match runs.last_mut() {
            Some((_, text, style)) if *style == p.word.style => {
                if p.word.space_before {
                    text.push(' ');
                }
                text.push_str(&p.word.text);
            }
            _ => runs.push((p.x, p.word.text.clone(), p.word.style)),
        }
    }
    runs
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// A decoded data-URI image; Taffy sizes it through [`ImageLeaf::measure`].
struct ImageLeaf {
    src: String,
    /// Intrinsic size in points (1 px = 0.75 pt).
    natural: (f32, f32),
    known_w: Option<f32>,
    known_h: Option<f32>,
    max_height: f32,
    align: TextAlign,
}

impl ImageLeaf {
    fn load(src: &str, style: &ComputedStyle, attrs: &HashMap<String, String>, container_w: f32, max_height: f32) -> Option<Self> {
        let bytes = match parse_data_uri(src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                return None;
            }
        };
        let img = match ::image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Skipping image: decode error: {e}");
                return None;
            }
        };
        let (px_w, px_h) = (img.width() as f32, img.height() as f32);
        if px_w == 0.0 || px_h == 0.0 {
            return None;
        }
        Some(Self {
            src: src.to_string(),
            natural: (px_w * 0.75, px_h * 0.75),
            known_w: style.width.resolve(container_w),
            known_h: attrs
                .get("height")
                .and_then(|h| crate::css::parse_length(h, style.font_size))
                .filter(|h| *h > 0.0),
            max_height,
            align: style.text_align,
        })
    }

    /// Used size inside `width`, keeping the aspect ratio.
    fn fit(&self, width: f32) -> (f32, f32) {
        let aspect = self.natural.0 / self.natural.1;
        let (mut w, mut h) = match (self.known_w, self.known_h) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w / aspect),
            (None, Some(h)) => (h * aspect, h),
            (None, None) => self.natural,
        };
        if w > width {
            h *= width / w;
            w = width;
        }
        if h > self.max_height {
            w *= self.max_height / h;
            h = self.max_height;
        }
        (w, h)
    }

    fn measure(&self, known: Size<Option<f32>>, available: Size<AvailableSpace>) -> Size<f32> {
        let limit = known.width.unwrap_or(match available.width {
            AvailableSpace::Definite(w) => w,
            _ => f32::INFINITY,
        });
        let (w, h) = self.fit(limit);
        Size {
            width: if limit.is_finite() { limit } else { w },
            height: known.height.unwrap_or(h),
        }
    }

    fn flatten(&self, x: f32, y: f32, width: f32, out: &mut Vec<Flow>) {
        let (w, h) = self.fit(width);
        let offset = match self.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => (width - w) / 2.0,
            TextAlign::Right => width - w,
        };
        let mut b = LayoutBox::new(x + offset, y, w, h);
        b.image = Some(ImageContent { src: self.src.clone() });
        out.push(Flow::Unit {
            top: y,
            bottom: y + h,
            boxes: vec![b],
        });
    }
}

/// Node context for content Taffy cannot size on its own.
enum Leaf {
    Text(InlineRun),
    Image(ImageLeaf),
}

// ---------------------------------------------------------------------------
// Build the Taffy tree
// ---------------------------------------------------------------------------

/// What an element node paints once positioned.
struct Block {
    style: ComputedStyle,
    marker: Option<String>,
    /// Table rows flatten into a single unit.
    row: bool,
}

struct LayoutBuilder {
    taffy: TaffyTree<Leaf>,
    blocks: HashMap<NodeId, Block>,
    content_height: f32,
}

impl LayoutBuilder {
    fn new(content_height: f32) -> Self {
        let mut taffy = TaffyTree::new();
        taffy.disable_rounding();
        Self {
            taffy,
            blocks: HashMap::new(),
            content_height,
        }
    }

    /// A block-level element inside a container `container_w` wide.
    fn build_block(&mut self, node: &StyledNode, container_w: f32, marker: Option<String>) -> Result<Option<NodeId>, TaffyError> {
        let StyledNode::Element {
            tag,
            style,
            children,
            attrs,
        } = node
        else {
            return Ok(None);
        };

        if tag == "img" {
            return self.build_image(style, attrs, container_w);
        }
        if style.display == style::Display::Table {
            return self.build_table(style, children, container_w).map(Some);
        }

        let (box_w, inner_w) = box_width(style, container_w);
        let start = attrs
            .get("start")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1);
        let child_ids = self.build_children(children, style, inner_w, start)?;
        let id = self.taffy.new_with_children(box_style(style, box_w), &child_ids)?;
        self.blocks.insert(
            id,
            Block {
                style: style.clone(),
                marker,
                row: false,
            },
        );
        Ok(Some(id))
    }

    /// Mixed block and inline children: consecutive inline children form one
    /// measured leaf.
    fn build_children(
        &mut self,
        children: &[StyledNode],
        style: &ComputedStyle,
        width: f32,
        list_start: usize,
    ) -> Result<Vec<NodeId>, TaffyError> {
        let mut ids = Vec::new();
        let mut run: Vec<&StyledNode> = Vec::new();
        let mut index = list_start;
        for child in children {
            if !is_block_level(child) {
                run.push(child);
                continue;
            }
            ids.extend(self.build_inline(&run, style)?);
            run.clear();

            let child_style = child.style();
            let marker = if child_style.display == style::Display::ListItem {
                let m = list_marker(child_style.list_style, index);
                index += 1;
                m
            } else {
                None
            };
            ids.extend(self.build_block(child, width, marker)?);
        }
        ids.extend(self.build_inline(&run, style)?);
        Ok(ids)
    }

    fn build_inline(&mut self, run: &[&StyledNode], block: &ComputedStyle) -> Result<Option<NodeId>, TaffyError> {
        let mut pieces = Vec::new();
        let mut pending_space = false;
        for node in run {
            collect_pieces(node, &mut pieces, &mut pending_space);
        }
        if pieces.is_empty() {
            return Ok(None);
        }
        let leaf = Leaf::Text(InlineRun {
            pieces,
            strut: TextStyle::of(block),
            align: block.text_align,
        });
        self.taffy.new_leaf_with_context(Style::default(), leaf).map(Some)
    }

    fn build_image(
        &mut self,
        style: &ComputedStyle,
        attrs: &HashMap<String, String>,
        container_w: f32,
    ) -> Result<Option<NodeId>, TaffyError> {
        let Some(src) = attrs.get("src") else {
            return Ok(None);
        };
        let inner_w = (container_w - style.margin.horizontal()).max(1.0);
        let Some(image) = ImageLeaf::load(src, style, attrs, inner_w, self.content_height) else {
            return Ok(None);
        };
        let leaf_style = Style {
            margin: margin_rect(style.margin),
            ..Default::default()
        };
        self.taffy.new_leaf_with_context(leaf_style, Leaf::Image(image)).map(Some)
    }

    /// Tables are a flex column of captions and rows; rows are flex rows of
    /// fixed-width cells stretched to the tallest one.
    fn build_table(&mut self, style: &ComputedStyle, children: &[StyledNode], container_w: f32) -> Result<NodeId, TaffyError> {
        let (box_w, inner_w) = box_width(style, container_w);
        let mut ids = Vec::new();
        for caption in children
            .iter()
            .filter(|c| matches!(c, StyledNode::Element { tag, .. } if tag == "caption"))
        {
            ids.extend(self.build_block(caption, inner_w, None)?);
        }

        let mut rows = Vec::new();
        collect_rows(children, &mut rows);
        let grid: Vec<Vec<(&StyledNode, usize)>> = rows.iter().map(|r| row_cells(r)).collect();
        let ncols = grid
            .iter()
            .map(|cells| cells.iter().map(|(_, span)| span).sum::<usize>())
            .max()
            .unwrap_or(0);

        if ncols > 0 {
            let widths = column_widths(&grid, ncols, inner_w);
            for (row, cells) in rows.iter().zip(&grid) {
                let mut cell_ids = Vec::with_capacity(cells.len());
                let mut col = 0;
                for (cell, span) in cells {
                    if col >= ncols {
                        break;
                    }
                    let end = (col + span).min(ncols);
                    let cell_w: f32 = widths[col..end].iter().sum();
                    col = end;
                    cell_ids.push(self.build_cell(cell, cell_w)?);
                }
                let row_style = Style {
                    display: Display::Flex,
                    flex_direction: FlexDirection::Row,
                    align_items: Some(AlignItems::Stretch),
                    size: Size {
                        width: Dimension::Percent(1.0),
                        height: Dimension::Auto,
                    },
                    ..Default::default()
                };
                let row_id = self.taffy.new_with_children(row_style, &cell_ids)?;
                self.blocks.insert(
                    row_id,
                    Block {
                        style: row.style().clone(),
                        marker: None,
                        row: true,
                    },
                );
                ids.push(row_id);
            }
        }

        let table_style = Style {
            display: Display::Flex,
            flex_direction: FlexDirection::Column,
            ..box_style(style, Some(box_w.unwrap_or(inner_w + chrome(style))))
        };
        let id = self.taffy.new_with_children(table_style, &ids)?;
        self.blocks.insert(
            id,
            Block {
                style: style.clone(),
                marker: None,
                row: false,
            },
        );
        Ok(id)
    }

    fn build_cell(&mut self, cell: &StyledNode, width: f32) -> Result<NodeId, TaffyError> {
        let style = cell.style();
        let inner_w = (width - chrome(style)).max(1.0);
        let child_ids = match cell {
            StyledNode::Element { children, .. } => self.build_children(children, style, inner_w, 1)?,
            StyledNode::Text { .. } => Vec::new(),
        };
        let cell_style = Style {
            flex_shrink: 0.0,
            ..box_style(style, Some(width))
        };
        let id = self.taffy.new_with_children(cell_style, &child_ids)?;
        self.blocks.insert(
            id,
            Block {
                style: style.clone(),
                marker: None,
                row: false,
            },
        );
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Positioned tree -> flow units
    // -----------------------------------------------------------------------

    fn flatten(&self, node: NodeId, origin_x: f32, origin_y: f32, out: &mut Vec<Flow>) -> Result<(), TaffyError> {
        let layout = self.taffy.layout(node)?;
        let (x, y) = (origin_x + layout.location.x, origin_y + layout.location.y);
        let (w, h) = (layout.size.width, layout.size.height);

        match self.taffy.get_node_context(node) {
            Some(Leaf::Text(run)) => {
                run.flatten(x, y, w, out);
                return Ok(());
            }
            Some(Leaf::Image(image)) => {
                image.flatten(x, y, w, out);
                return Ok(());
            }
            None => {}
        }
        let Some(block) = self.blocks.get(&node) else {
            return Ok(());
        };
        let style = &block.style;

        if style.page_break_before {
            out.push(Flow::Break { at: y });
        }

        let mut inner = Vec::new();
        for child in self.taffy.children(node)? {
            self.flatten(child, x, y, &mut inner)?;
        }
        if let Some(marker) = &block.marker {
            let border = style.border_widths();
            attach_marker(
                &mut inner,
                marker,
                style,
                x + border.left + style.padding.left,
                y + border.top + style.padding.top,
            );
        }

        if block.row {
            if h > 0.0 {
                let mut boxes: Vec<LayoutBox> = decoration_box(style, x, y, w, h, [0.0; 4]).into_iter().collect();
                for f in inner {
                    if let Flow::Unit { boxes: b, .. } = f {
                        boxes.extend(b);
                    }
                }
                out.push(Flow::Unit {
                    top: y,
                    bottom: y + h,
                    boxes,
                });
            }
        } else {
            self.wrap(style, (x, y, w, h), inner, out);
        }

        if style.page_break_after {
            out.push(Flow::Break { at: y + h });
        }
        Ok(())
    }

    /// Paint the block's background and border around `inner`.
    /// Decorated or `page-break-inside: avoid` blocks become one unit when
    /// they fit on a page; otherwise every inner unit carries its own slice
    /// of the decoration.
    fn wrap(&self, style: &ComputedStyle, (x, y, w, h): (f32, f32, f32, f32), inner: Vec<Flow>, out: &mut Vec<Flow>) {
        let decorated = style.is_decorated();
        if !decorated && !style.page_break_inside_avoid {
            out.extend(inner);
            return;
        }

        let border = style.border_widths();
        let all = [border.top, border.right, border.bottom, border.left];
        let has_break = inner.iter().any(|f| matches!(f, Flow::Break { .. }));
        let tops: Vec<(f32, f32)> = inner
            .iter()
            .filter_map(|f| match f {
                Flow::Unit { top, bottom, .. } => Some((*top, *bottom)),
                Flow::Break { .. } => None,
            })
            .collect();

        if !has_break && (h <= self.content_height || tops.is_empty()) {
            let mut boxes: Vec<LayoutBox> = decoration_box(style, x, y, w, h, all).into_iter().collect();
            for f in inner {
                if let Flow::Unit { boxes: b, .. } = f {
                    boxes.extend(b);
                }
            }
            if h > 0.0 || !boxes.is_empty() {
                out.push(Flow::Unit {
                    top: y,
                    bottom: y + h,
                    boxes,
                });
            }
            return;
        }

        log::debug!("Block of {h:.1}pt exceeds the page; splitting it");
        if !decorated {
            out.extend(inner);
            return;
        }

        // Each slice runs from its unit to the next one, so the gaps
        // between units are painted too.
        let count = tops.len();
        let mut i = 0;
        for f in inner {
            match f {
                Flow::Unit { top, mut boxes, .. } => {
                    let start = if i == 0 { y } else { top };
                    let end = tops.get(i + 1).map(|t| t.0).unwrap_or(y + h).max(tops[i].1);
                    let widths = [
                        if i == 0 { border.top } else { 0.0 },
                        border.right,
                        if i + 1 == count { border.bottom } else { 0.0 },
                        border.left,
                    ];
                    if let Some(slice) = decoration_box(style, x, start, w, end - start, widths) {
                        boxes.insert(0, slice);
                    }
                    out.push(Flow::Unit {
                        top: start,
                        bottom: end,
                        boxes,
                    });
                    i += 1;
                }
                brk => out.push(brk),
            }
        }
    }
}

fn chrome(style: &ComputedStyle) -> f32 {
    style.padding.horizontal() + style.border_widths().horizontal()
}

/// (explicit border-box width, content width). `width` is the content box.
fn box_width(style: &ComputedStyle, container_w: f32) -> (Option<f32>, f32) {
    let chrome = chrome(style);
    let limit = (container_w - style.margin.left).max(0.0);
    let explicit = style.width.resolve(container_w).map(|w| (w + chrome).clamp(0.0, limit));
    let outer = explicit.unwrap_or((container_w - style.margin.horizontal()).max(0.0));
    (explicit, (outer - chrome).max(1.0))
}

fn margin_rect(m: Edges) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(m.top),
        right: LengthPercentageAuto::Length(m.right),
        bottom: LengthPercentageAuto::Length(m.bottom),
        left: LengthPercentageAuto::Length(m.left),
    }
}

fn length_rect(e: Edges) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(e.top),
        right: LengthPercentage::Length(e.right),
        bottom: LengthPercentage::Length(e.bottom),
        left: LengthPercentage::Length(e.left),
    }
}

/// Block-flow Taffy style for an element.
fn box_style(style: &ComputedStyle, width: Option<f32>) -> Style {
    Style {
        display: Display::Block,
        size: Size {
            width: width.map(Dimension::Length).unwrap_or(Dimension::Auto),
            height: Dimension::Auto,
        },
        margin: margin_rect(style.margin),
        padding: length_rect(style.padding),
        border: length_rect(style.border_widths()),
        ..Default::default()
    }
}

fn collect_rows<'a>(nodes: &'a [StyledNode], rows: &mut Vec<&'a StyledNode>) {
    for node in nodes {
        if let StyledNode::Element { tag, style, children, .. } = node {
            if style.display == style::Display::TableRow {
                rows.push(node);
            } else if tag != "caption" {
                collect_rows(children, rows);
            }
        }
    }
}

fn row_cells(row: &StyledNode) -> Vec<(&StyledNode, usize)> {
    let StyledNode::Element { children, .. } = row else {
        return Vec::new();
    };
    children
        .iter()
        .filter_map(|c| match c {
            StyledNode::Element { style, attrs, .. } if style.display == style::Display::TableCell => {
                let span = attrs
                    .get("colspan")
                    .and_then(|s| s.trim().parse::<usize>().ok())
                    .unwrap_or(1)
                    .clamp(1, MAX_COLSPAN);
                Some((c, span))
            }
            _ => None,
        })
        .collect()
}

/// Explicit widths come from single-span cells (first one wins per
/// column); the remaining width is split equally between the other columns.
fn column_widths(grid: &[Vec<(&StyledNode, usize)>], ncols: usize, table_w: f32) -> Vec<f32> {
    let mut fixed: Vec<Option<f32>> = vec![None; ncols];
    for cells in grid {
        let mut col = 0;
        for (cell, span) in cells {
            if col >= ncols {
                break;
            }
            if *span == 1 && fixed[col].is_none() {
                fixed[col] = cell.style().width.resolve(table_w);
            }
            col += span;
        }
    }

    let auto_count = fixed.iter().filter(|w| w.is_none()).count();
    let mut sum_fixed: f32 = fixed.iter().flatten().sum();
    let mut remaining = table_w - sum_fixed;

    let mut scale = 1.0;
    if auto_count > 0 && remaining < auto_count as f32 * MIN_COLUMN_WIDTH && sum_fixed > 0.0 {
        let room = (table_w - auto_count as f32 * MIN_COLUMN_WIDTH).max(0.0);
        scale = room / sum_fixed;
        sum_fixed = room;
        remaining = table_w - sum_fixed;
    } else if auto_count == 0 && sum_fixed > 0.0 {
        scale = table_w / sum_fixed;
    }

    let auto_w = if auto_count > 0 {
        (remaining / auto_count as f32).max(0.0)
    } else {
        0.0
    };
    fixed
        .into_iter()
        .map(|w| w.map(|w| w * scale).unwrap_or(auto_w))
        .collect()
}

/// Put the list marker to the left of the item's first line.
fn attach_marker(inner: &mut Vec<Flow>, marker: &str, style: &ComputedStyle, content_x: f32, content_y: f32) {
    let ts = TextStyle::of(style);
    let marker_w = ts.font.measure(marker, ts.size);
    let make = |y: f32, baseline: f32, height: f32| {
        let mut b = LayoutBox::new(content_x - marker_w - MARKER_GAP, y, marker_w, height);
        b.text = Some(TextContent {
            text: marker.to_string(),
            font_size: ts.size,
            bold: ts.font.bold,
            italic: ts.font.italic,
            color: ts.color,
            underline: false,
            baseline,
        });
        b
    };

    let first_text = inner.iter_mut().find_map(|f| match f {
        Flow::Unit { boxes, .. } => {
            let found = boxes
                .iter()
                .find_map(|b| b.text.as_ref().map(|t| (b.y, t.baseline, b.height)))?;
            Some((boxes, found))
        }
        Flow::Break { .. } => None,
    });
    match first_text {
        Some((boxes, (y, baseline, height))) => boxes.push(make(y, baseline, height)),
        None => {
            let (above, below) = ts.vertical_metrics();
            inner.insert(
                0,
                Flow::Unit {
                    top: content_y,
                    bottom: content_y + above + below,
                    boxes: vec![make(content_y, above, above + below)],
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

    use super::*;
    use crate::css::Stylesheet;
    use crate::html::parse_document;
    use crate::style::build_styled_tree;

    fn layout(html: &str) -> Vec<Fragment> {
        let doc = parse_document(html).unwrap();
        let sheet = Stylesheet::parse(&doc.stylesheet);
        let tree = build_styled_tree(&doc.body, &sheet);
        compute_layout(&tree, 500.0, 700.0).unwrap()
    }

    fn content(frags: &[Fragment]) -> Vec<&Fragment> {
        frags.iter().filter(|f| f.kind == FragmentKind::Content).collect()
    }

    fn text_boxes(frags: &[Fragment]) -> Vec<&LayoutBox> {
        frags.iter().flat_map(|f| &f.boxes).filter(|b| b.text.is_some()).collect()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn layout_simple_paragraph() {
        let frags = layout("<p>Hello world</p>");
        let lines = content(&frags);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "Hello world");
        assert!(lines[0].height > 0.0);
        // Paragraph margins surround the line.
        assert_eq!(frags.first().map(|f| f.kind), Some(FragmentKind::Margin));
    }

    #[test]
    fn long_text_wraps_within_width() {
        let words = "lorem ipsum dolor sit amet ".repeat(40);
        let frags = layout(&format!("<p>{words}</p>"));
        let lines = content(&frags);
        assert!(lines.len() > 3, "expected wrapping, got {} lines", lines.len());
        for b in text_boxes(&frags) {
            assert!(b.x + b.width <= 500.0 + 0.01);
        }
    }

    #[test]
    fn mixed_styles_share_a_line() {
        let frags = layout("<p>Total: <b>259.90</b> EUR</p>");
        let lines = content(&frags);
        assert_eq!(lines.len(), 1);
        let runs: Vec<&TextContent> = lines[0].boxes.iter().filter_map(|b| b.text.as_ref()).collect();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].text, "Total:");
        assert!(runs[1].bold);
        assert!(lines[0].boxes[1].x > lines[0].boxes[0].x + lines[0].boxes[0].width);
    }

    #[test]
    fn adjacent_inline_text_without_space_stays_glued() {
        let frags = layout("<p><b>Total</b>: 5</p>");
        let runs = text_boxes(&frags);
        let bold = runs[0];
        let rest = runs[1];
        assert!(approx(bold.x + bold.width, rest.x));
    }

    #[test]
    fn line_breaks() {
        let frags = layout("<p>first<br>second<br><br>fourth</p>");
        let texts: Vec<String> = content(&frags).iter().map(|f| f.text()).collect();
        assert_eq!(texts, vec!["first", "second", "", "fourth"]);
    }

    #[test]
    fn ordered_list_markers() {
        let frags = layout("<ol start=\"3\"><li>Alpha</li><li>Beta</li></ol><ul><li>Dot</li></ul>");
        let texts: Vec<String> = content(&frags).iter().map(|f| f.text()).collect();
        assert_eq!(texts, vec!["Alpha 3.", "Beta 4.", "Dot \u{2022}"]);
        let marker = text_boxes(&frags)[1];
        assert!(marker.x < text_boxes(&frags)[0].x);
    }

    #[test]
    fn centered_text() {
        let frags = layout(r#"<p style="text-align:center">Hi</p>"#);
        let b = text_boxes(&frags)[0];
        assert!(approx(b.x, (500.0 - b.width) / 2.0));
    }

    #[test]
    fn explicit_width_and_margin_place_the_block() {
        let frags = layout(r#"<div style="width: 100pt; margin-left: 310pt; background: #eee">x</div>"#);
        let block = content(&frags)[0];
        let bg = &block.boxes[0];
        assert!(approx(bg.x, 310.0));
        assert!(approx(bg.width, 100.0));
        assert!(approx(block.boxes[1].x, 310.0));
    }

    #[test]
    fn table_columns_fixed_and_equal() {
        let frags = layout(
            r#"<table style="width: 400pt"><tr><td style="width:25%">a</td><td>b</td><td>c</td></tr>
               <tr><td colspan="2">wide</td><td>d</td></tr></table>"#,
        );
        let rows = content(&frags);
        assert_eq!(rows.len(), 2);
        let xs: Vec<f32> = rows[0].boxes.iter().map(|b| b.x).collect();
        // cell padding is 2pt
        assert_eq!(xs.len(), 3);
        for (x, expected) in xs.iter().zip([2.0, 102.0, 252.0]) {
            assert!(approx(*x, expected), "{xs:?}");
        }
        assert!(approx(rows[1].boxes[1].x, 252.0));
        assert_eq!(rows[1].text(), "wide d");
    }

    #[test]
    fn table_row_height_is_tallest_cell() {
        let frags = layout(
            r#"<table border="1"><tr><td>one</td><td>two<br>lines</td></tr></table>"#,
        );
        // A bordered table that fits is one fragment.
        let blocks = content(&frags);
        assert_eq!(blocks.len(), 1);
        let borders: Vec<&LayoutBox> = blocks[0].boxes.iter().filter(|b| b.border.is_some()).collect();
        assert_eq!(borders.len(), 3);
        assert!(approx(borders[0].height, blocks[0].height));
        // Both cells stretch to the row, which holds two lines.
        assert!(approx(borders[1].height, borders[2].height));
        let line = blocks[0].boxes.iter().find(|b| b.text.is_some()).unwrap().height;
        assert!(borders[1].height > 2.0 * line);
    }

    #[test]
    fn oversized_colspan_is_clamped() {
        let frags = layout(r#"<table><tr><td colspan="18446744073709551615">a</td><td>b</td></tr></table>"#);
        let rows = content(&frags);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].text().starts_with('a'));
        assert!(rows[0].text().ends_with('b'));

        let grid_html = r#"<table><tr><td colspan="100000000">x</td></tr></table>"#;
        assert_eq!(content(&layout(grid_html))[0].text(), "x");
    }

    #[test]
    fn decorated_block_stays_whole() {
        let frags = layout(
            r#"<div style="background:#eee; padding: 6pt"><p>one</p><p>two</p><p>three</p></div>"#,
        );
        let blocks = content(&frags);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].boxes[0].background_color.is_some());
        assert!(approx(blocks[0].boxes[0].height, blocks[0].height));
        assert_eq!(blocks[0].text(), "one two three");
    }

    #[test]
    fn tall_decorated_block_is_sliced() {
        let paragraphs = "<p>line</p>".repeat(40);
        let frags = layout(&format!(r#"<div style="border: 1pt solid #000">{paragraphs}</div>"#));
        let slices = content(&frags);
        assert_eq!(slices.len(), 40);
        let first = slices[0].boxes[0].border.as_ref().unwrap();
        let last = slices[39].boxes[0].border.as_ref().unwrap();
        assert_eq!(first.widths, [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(last.widths, [0.0, 1.0, 1.0, 1.0]);
        // Slices tile the block without gaps.
        assert_eq!(frags.iter().filter(|f| f.kind == FragmentKind::Margin).count(), 0);
    }

    #[test]
    fn forced_breaks_become_fragments() {
        let frags = layout(r#"<p>a</p><div style="page-break-before: always">b</div>"#);
        assert!(frags.iter().any(|f| f.kind == FragmentKind::PageBreak));
    }

    #[test]
    fn remote_images_are_skipped() {
        let frags = layout(r#"<img src="https://example.com/logo.png"><p>after</p>"#);
        assert!(frags.iter().flat_map(|f| &f.boxes).all(|b| b.image.is_none()));
    }

    #[test]
    fn data_uri_image_uses_intrinsic_size() {
        let mut png = Vec::new();
        ::image::DynamicImage::ImageRgb8(::image::RgbImage::new(40, 20))
            .write_to(&mut Cursor::new(&mut png), ::image::ImageFormat::Png)
            .unwrap();
        let src = format!("data:image/png;base64,{}", BASE64_STD.encode(&png));

        let frags = layout(&format!(r#"<img src="{src}">"#));
        let img = frags.iter().flat_map(|f| &f.boxes).find(|b| b.image.is_some()).unwrap();
        assert!(approx(img.width, 30.0) && approx(img.height, 15.0));

        let frags = layout(&format!(r#"<img src="{src}" width="200">"#));
        let img = frags.iter().flat_map(|f| &f.boxes).find(|b| b.image.is_some()).unwrap();
        assert!(approx(img.width, 150.0) && approx(img.height, 75.0));
    }

    #[test]
    fn margins_collapse() {
        let frags = layout("<p>a</p><p>b</p>");
        let margins: Vec<f32> = frags
            .iter()
            .filter(|f| f.kind == FragmentKind::Margin)
            .map(|f| f.height)
            .collect();
        assert_eq!(margins.len(), 3, "{margins:?}");
        assert!(margins.iter().all(|m| approx(*m, 12.0)), "{margins:?}");
    }
}
