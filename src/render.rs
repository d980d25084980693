//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::error::RenderError;
use crate::fonts::Font;
use crate::layout_config::*;

/// 1 pt in millimetres.
const MM_PER_PT: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// Images whose bytes cannot be decoded are skipped with a `log::warn`.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>, RenderError> {
    if !(config.page_width_pt > 0.0 && config.page_height_pt > 0.0) {
        return Err(RenderError::Pdf(format!(
            "invalid page size {}x{}pt",
            config.page_width_pt, config.page_height_pt
        )));
    }
    let page_w = Mm(config.page_width_pt * MM_PER_PT);
    let page_h = Mm(config.page_height_pt * MM_PER_PT);

    let mut doc = PdfDocument::new(&config.title);

    // ── Pre-register all images ────────────────────────────────────────────
    let all_srcs: HashSet<&str> = config
        .pages
        .iter()
        .flat_map(|p| p.boxes.iter())
        .filter_map(|b| b.image.as_ref())
        .map(|img| img.src.as_str())
        .collect();

    let mut image_resources: HashMap<&str, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();

    for src in all_srcs {
        let bytes = match parse_data_uri(src) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                continue;
            }
        };

        let (px_width, px_height) = match ::image::load_from_memory(&bytes) {
            Ok(img) => (img.width(), img.height()),
            Err(e) => {
                log::warn!("Skipping image: decode error: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut img_warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping image: PDF encode error: {e}");
                continue;
            }
        };
        let xobj_id = doc.add_image(&raw);

        image_resources.insert(
            src,
            ImageResource {
                xobj_id,
                px_width,
                px_height,
            },
        );
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let mut pages: Vec<PdfPage> = config
        .pages
        .iter()
        .map(|page_layout| {
            let mut ops = Vec::new();
            for lbox in &page_layout.boxes {
                render_box(&mut ops, lbox, config.page_height_pt, &image_resources);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }
    log::debug!("Rendering {} page(s) titled {:?}", pages.len(), config.title);

    doc.with_pages(pages);
    // Raw text operators are only written with `secure` off.
    let options = PdfSaveOptions {
        secure: false,
        ..Default::default()
    };
    let bytes = doc.save(&options, &mut Vec::new());
    if !bytes.starts_with(b"%PDF") {
        return Err(RenderError::Pdf("printpdf produced no PDF header".to_string()));
    }
    Ok(bytes)
}

/// Encode text as WinAnsiEncoding bytes, the encoding of the built-in
/// fonts. Characters outside it become `?`.
fn to_winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2030}' => 0x89,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c => u8::try_from(u32::from(c)).unwrap_or(b'?'),
        })
        .collect()
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
///
/// Returns `Err` if `src` is not a data URI or does not use base64 encoding.
pub(crate) fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let Some(rest) = src.trim().strip_prefix("data:") else {
        let preview: String = src.chars().take(80).collect();
        return Err(format!(
            "only base64 data URIs are embedded (e.g. `data:image/png;base64,...`), got {preview:?}"
        ));
    };
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` after the header".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_STD
        .decode(data)
        .map_err(|e| format!("base64 decode error: {e}"))
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn stroke(ops: &mut Vec<Op>, from: (f32, f32), to: (f32, f32)) {
    ops.push(Op::DrawLine {
        line: Line {
            points: vec![point(from.0, from.1), point(to.0, to.1)],
            is_closed: false,
        },
    });
}

/// Render one LayoutBox into PDF ops. Layout coordinates have their origin
/// at the top-left; PDF's is bottom-left.
fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, page_height: f32, images: &HashMap<&str, ImageResource>) {
    let top = page_height - lbox.y;
    let bottom = top - lbox.height;
    let (left, right) = (lbox.x, lbox.x + lbox.width);

    if let Some(bg) = lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![
                        point(left, bottom),
                        point(right, bottom),
                        point(right, top),
                        point(left, top),
                    ],
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    // Each side is stroked along the middle of its width, inside the box.
    if let Some(border) = &lbox.border {
        let [t, r, b, l] = border.widths;
        ops.push(Op::SetOutlineColor { col: rgb(border.color) });
        if t > 0.0 {
            ops.push(Op::SetOutlineThickness { pt: Pt(t) });
            stroke(ops, (left, top - t / 2.0), (right, top - t / 2.0));
        }
        if r > 0.0 {
            ops.push(Op::SetOutlineThickness { pt: Pt(r) });
            stroke(ops, (right - r / 2.0, top), (right - r / 2.0, bottom));
        }
        if b > 0.0 {
            ops.push(Op::SetOutlineThickness { pt: Pt(b) });
            stroke(ops, (left, bottom + b / 2.0), (right, bottom + b / 2.0));
        }
        if l > 0.0 {
            ops.push(Op::SetOutlineThickness { pt: Pt(l) });
            stroke(ops, (left + l / 2.0, top), (left + l / 2.0, bottom));
        }
    }

    if let Some(text) = &lbox.text {
        if !text.text.is_empty() {
            let font = Font::new(text.bold, text.italic).builtin();
            let baseline = top - text.baseline;

            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(left),
                    y: Pt(baseline),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(text.font_size),
                font,
            });
            ops.push(Op::SetLineHeight { lh: Pt(lbox.height) });
            ops.push(Op::SetFillColor { col: rgb(text.color) });
            // printpdf copies builtin-font text out as UTF-8, so the encoded
            // bytes go out as a raw `Tj`. The empty write registers the font.
            ops.push(Op::WriteTextBuiltinFont { items: Vec::new(), font });
            ops.push(Op::Unknown {
                key: "Tj".to_string(),
                value: vec![DictItem::Bytes(to_winansi(&text.text))],
            });
            ops.push(Op::EndTextSection);

            if text.underline {
                let y = baseline - text.font_size * 0.1;
                ops.push(Op::SetOutlineThickness {
                    pt: Pt((text.font_size * 0.05).max(0.5)),
                });
                ops.push(Op::SetOutlineColor { col: rgb(text.color) });
                stroke(ops, (left, y), (right, y));
            }
        }
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(img.src.as_str()) {
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale = |pt: f32, px: u32| if px > 0 { pt / px as f32 } else { 1.0 };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(left)),
                    translate_y: Some(Pt(bottom)),
                    dpi: Some(72.0),
                    scale_x: Some(scale(lbox.width, res.px_width)),
                    scale_y: Some(scale(lbox.height, res.px_height)),
                    rotate: None,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageOrientation, PageSize};

    #[test]
    fn render_empty_page() {
        let config = LayoutConfig::new(PageSize::A4, PageOrientation::Portrait);
        let bytes = render_pdf(&config).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn render_text_and_decoration() {
        let mut config = LayoutConfig::new(PageSize::Letter, PageOrientation::Landscape);
        let mut panel = LayoutBox::new(40.0, 40.0, 200.0, 30.0);
        panel.background_color = Some([0.9, 0.9, 0.9, 1.0]);
        panel.border = Some(BorderStyle {
            widths: [1.0, 0.0, 1.0, 0.0],
            color: [0.0, 0.0, 0.0, 1.0],
        });
        let mut label = LayoutBox::new(44.0, 44.0, 60.0, 14.4);
        label.text = Some(TextContent {
            text: "Total: 259.90 \u{20AC}".into(),
            font_size: 12.0,
            bold: true,
            italic: false,
            color: [0.0, 0.0, 0.0, 1.0],
            underline: true,
            baseline: 11.0,
        });
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![panel, label],
        });

        let bytes = render_pdf(&config).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn invalid_page_size_is_an_error() {
        let mut config = LayoutConfig::new(PageSize::A4, PageOrientation::Portrait);
        config.page_width_pt = 0.0;
        assert!(matches!(render_pdf(&config), Err(RenderError::Pdf(_))));
    }

    #[test]
    fn winansi_maps_typographic_characters() {
        let bytes = to_winansi("\u{2022} caf\u{E9} \u{2014} \u{4E2D}");
        assert_eq!(bytes, [0x95, b' ', b'c', b'a', b'f', 0xE9, b' ', 0x97, b' ', b'?']);
        assert_eq!(to_winansi("Caf\u{E9} \u{20AC}"), b"Caf\xE9 \x80");
    }

    #[test]
    fn renders_accented_and_currency_text() {
        let mut config = LayoutConfig::new(PageSize::A4, PageOrientation::Portrait);
        let mut lbox = LayoutBox::new(72.0, 72.0, 100.0, 14.0);
        lbox.text = Some(TextContent {
            text: "Caf\u{E9} \u{20AC}".to_string(),
            font_size: 12.0,
            bold: false,
            italic: false,
            color: [0.0, 0.0, 0.0, 1.0],
            underline: true,
            baseline: 11.0,
        });
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![lbox],
        });

        let bytes = render_pdf(&config).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 200);
    }

    #[test]
    fn data_uris() {
        assert_eq!(parse_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert!(parse_data_uri("https://example.com/a.png").is_err());
        assert!(parse_data_uri("data:text/plain,hi").is_err());
        assert!(parse_data_uri("data:image/png;base64").is_err());
    }
}
