//! Pagination – stacks layout fragments onto pages.
//!
//! Handles:
//! - Page boundaries for any paper size and margin set
//! - Forced breaks (`page-break-before` / `page-break-after`)
//! - Margins that fall on a page boundary are discarded
//! - Fragments taller than a page are placed alone and clipped by the viewer

use crate::layout::{Fragment, FragmentKind};
use crate::layout_config::*;
use crate::style::Edges;

/// Convert a fragment stream into a paginated [`LayoutConfig`]. Box
/// coordinates come out relative to the page's top-left corner.
pub fn paginate(fragments: Vec<Fragment>, page_width: f32, page_height: f32, margins: Edges) -> LayoutConfig {
    let mut config = LayoutConfig {
        title: String::new(),
        page_width_pt: page_width,
        page_height_pt: page_height,
        pages: Vec::new(),
    };

    let content_height = (page_height - margins.vertical()).max(1.0);
    let mut current = PageLayout::default();
    // Vertical offset within the content area.
    let mut cursor = 0.0f32;
    let mut has_content = false;

    for fragment in fragments {
        match fragment.kind {
            FragmentKind::PageBreak => {
                if has_content {
                    new_page(&mut config, &mut current);
                    cursor = 0.0;
                    has_content = false;
                }
            }
            FragmentKind::Margin => {
                if cursor > 0.0 && cursor + fragment.height < content_height {
                    cursor += fragment.height;
                }
            }
            FragmentKind::Content => {
                if cursor > 0.0 && cursor + fragment.height > content_height {
                    new_page(&mut config, &mut current);
                    cursor = 0.0;
                }
                if fragment.height > content_height {
                    log::warn!(
                        "Content of {:.1}pt is taller than the page area ({content_height:.1}pt); it will be clipped",
                        fragment.height
                    );
                }
                let dy = margins.top + cursor;
                current
                    .boxes
                    .extend(fragment.boxes.into_iter().map(|b| b.translate(margins.left, dy)));
                cursor += fragment.height;
                has_content = true;
            }
        }
    }

    // Always at least one page, even for an empty document.
    if has_content || config.pages.is_empty() {
        config.pages.push(current);
    }
    log::debug!("Paginated into {} page(s)", config.pages.len());
    config
}

fn new_page(config: &mut LayoutConfig, current: &mut PageLayout) {
    config.pages.push(std::mem::take(current));
    current.page_index = config.pages.len();
}
