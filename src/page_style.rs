//! CSS `@page` rule helpers for template authors.
//!
//! Pure string formatting; the pipeline does not need these, but the default
//! template expander exposes them as template functions.

/// Margin used when none is given.
pub const DEFAULT_MARGIN: &str = "2cm";

/// `@page { size: <size> <orientation>; margin: <margin>; }`
pub fn page_style(page_size: &str, orientation: &str, margin: &str) -> String {
    format!("@page {{ size: {page_size} {orientation}; margin: {margin}; }}")
}

/// [`page_style`] with the default 2cm margin.
pub fn default_page_style(page_size: &str, orientation: &str) -> String {
    page_style(page_size, orientation, DEFAULT_MARGIN)
}

/// Separate rules for `:portrait` and `:landscape` pages of the same size.
pub fn mixed_orientation_styles(page_size: &str, margin: &str) -> String {
    format!(
        "@page :portrait {{ size: {page_size} portrait; margin: {margin}; }} \
         @page :landscape {{ size: {page_size} landscape; margin: {margin}; }}"
    )
}
