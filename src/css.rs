//! CSS subset – declarations, simple selector rules, `@page` and lengths.
//!
//! Supported selectors: type (`td`), class (`.total`), id (`#head`),
//! compounds of those (`td.num`), descendant combinators (`table th`) and
//! comma lists. Other selectors are skipped with a warning.

use crate::html::Element;
use crate::page::{PageOrientation, PageSize, PT_PER_MM};

/// A parsed `property: value` pair. Property names are lower-cased.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

/// Parse the body of a `style` attribute or rule block.
pub fn parse_declarations(text: &str) -> Vec<Declaration> {
    text.split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let property = prop.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            if property.is_empty() || value.is_empty() {
                None
            } else {
                Some(Declaration {
                    property,
                    value: value.to_string(),
                })
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// `tag.class#id` – every present part must match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Compound {
    fn parse(s: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut rest = s;

        let tag_len = rest
            .find(['.', '#'])
            .unwrap_or(rest.len());
        let tag = &rest[..tag_len];
        if !tag.is_empty() && tag != "*" {
            if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return None;
            }
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        rest = &rest[tag_len..];

        while !rest.is_empty() {
            let marker = rest.chars().next()?;
            let body = &rest[1..];
            let len = body.find(['.', '#']).unwrap_or(body.len());
            let name = &body[..len];
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return None;
            }
            match marker {
                '.' => compound.classes.push(name.to_string()),
                '#' => compound.id = Some(name.to_string()),
                _ => return None,
            }
            rest = &body[len..];
        }
        Some(compound)
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if *tag != element.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|class| element.classes().any(|c| c == class))
    }
}

/// A chain of compounds joined by descendant combinators.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub parts: Vec<Compound>,
}

impl Selector {
    pub fn parse(s: &str) -> Option<Self> {
        // `>` is treated as a descendant combinator.
        let normalised = s.replace('>', " ");
        let parts = normalised
            .split_whitespace()
            .map(Compound::parse)
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(Self { parts })
        }
    }

    /// `(ids, classes, tags)` – compared lexicographically.
    pub fn specificity(&self) -> (usize, usize, usize) {
        self.parts.iter().fold((0, 0, 0), |(a, b, c), p| {
            (
                a + p.id.is_some() as usize,
                b + p.classes.len(),
                c + p.tag.is_some() as usize,
            )
        })
    }

    /// `ancestors` runs from the root down to the element's parent.
    pub fn matches(&self, element: &Element, ancestors: &[&Element]) -> bool {
        let Some((last, rest)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(element) {
            return false;
        }
        let mut remaining = rest.iter().rev().peekable();
        for ancestor in ancestors.iter().rev() {
            match remaining.peek() {
                Some(part) if part.matches(ancestor) => {
                    remaining.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        remaining.peek().is_none()
    }
}

// ---------------------------------------------------------------------------
// Stylesheet
// ---------------------------------------------------------------------------

/// One selector of a rule, with the rule's position for tie-breaking.
#[derive(Debug, Clone)]
pub struct Rule {
    pub selector: Selector,
    pub declarations: Vec<Declaration>,
    pub order: usize,
}

/// Geometry requested by an `@page` rule.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageRule {
    /// `(width, height)` in points, already oriented.
    pub size: Option<(f32, f32)>,
    /// Top, right, bottom, left in points.
    pub margin: Option<[f32; 4]>,
}

#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
    pub page: Option<PageRule>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Stylesheet::default();
        let css = strip_comments(css);
        let mut rest = css.as_str();
        let mut order = 0;

        while let Some(open) = rest.find('{') {
            let prelude = rest[..open].trim();
            let Some(close) = matching_brace(rest, open) else {
                log::warn!("Unbalanced braces in stylesheet; ignoring the remainder");
                break;
            };
            let block = &rest[open + 1..close];
            rest = &rest[close + 1..];

            if let Some(page_selector) = prelude.strip_prefix("@page") {
                sheet.apply_page_rule(page_selector.trim(), block);
                continue;
            }
            if prelude.starts_with('@') {
                log::debug!("Skipping unsupported at-rule {prelude}");
                continue;
            }

            let declarations = parse_declarations(block);
            for part in prelude.split(',') {
                match Selector::parse(part.trim()) {
                    Some(selector) => {
                        sheet.rules.push(Rule {
                            selector,
                            declarations: declarations.clone(),
                            order,
                        });
                        order += 1;
                    }
                    None => log::warn!("Skipping unsupported selector '{}'", part.trim()),
                }
            }
        }
        sheet
    }

    /// Rules matching `element`, lowest precedence first.
    pub fn matching<'s>(&'s self, element: &Element, ancestors: &[&Element]) -> Vec<&'s Rule> {
        let mut matched: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(element, ancestors))
            .collect();
        matched.sort_by_key(|r| (r.selector.specificity(), r.order));
        matched
    }

    /// A bare `@page` wins over `:first`/`:left`/`:right`; of the
    /// orientation pseudo-pages only `:portrait` is honoured.
    fn apply_page_rule(&mut self, pseudo: &str, block: &str) {
        if !(pseudo.is_empty() || pseudo == ":portrait") {
            log::debug!("Ignoring @page {pseudo}");
            return;
        }
        if pseudo == ":portrait" && self.page.is_some() {
            return;
        }
        let mut rule = PageRule::default();
        for decl in parse_declarations(block) {
            match decl.property.as_str() {
                "size" => rule.size = parse_page_size(&decl.value),
                "margin" => rule.margin = parse_box_shorthand(&decl.value, 12.0),
                _ => {}
            }
        }
        self.page = Some(rule);
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn matching_brace(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `A4`, `letter landscape`, `landscape`, `210mm 297mm`.
pub fn parse_page_size(value: &str) -> Option<(f32, f32)> {
    let mut dims: Option<(f32, f32)> = None;
    let mut orientation: Option<PageOrientation> = None;
    let mut lengths = Vec::new();

    for token in value.split_whitespace() {
        if let Ok(size) = token.parse::<PageSize>() {
            dims = Some(size.dimensions_pt());
        } else if let Ok(o) = token.parse::<PageOrientation>() {
            orientation = Some(o);
        } else if let Some(len) = parse_length(token, 12.0) {
            lengths.push(len);
        } else if token != "auto" {
            return None;
        }
    }

    match lengths.as_slice() {
        [side] => return Some((*side, *side)),
        [w, h] => return Some((*w, *h)),
        [] => {}
        _ => return None,
    }
    let dims = dims.unwrap_or_else(|| PageSize::default().dimensions_pt());
    Some(orientation.unwrap_or_default().apply(dims))
}

/// CSS box shorthand with 1–4 lengths → `[top, right, bottom, left]`.
pub fn parse_box_shorthand(value: &str, font_size: f32) -> Option<[f32; 4]> {
    let v = value
        .split_whitespace()
        .map(|t| parse_length(t, font_size))
        .collect::<Option<Vec<_>>>()?;
    match v.as_slice() {
        [a] => Some([*a, *a, *a, *a]),
        [a, b] => Some([*a, *b, *a, *b]),
        [a, b, c] => Some([*a, *b, *c, *b]),
        [a, b, c, d] => Some([*a, *b, *c, *d]),
        _ => None,
    }
}

/// A length in points. `font_size` (pt) resolves `em`; `%` is not a
/// length here (see [`parse_percent`]).
pub fn parse_length(value: &str, font_size: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    if v == "0" || v == "auto" {
        return Some(0.0);
    }
    let split = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let number: f32 = v[..split].parse().ok()?;
    let factor = match &v[split..] {
        "pt" => 1.0,
        "px" | "" => 0.75,
        "mm" => PT_PER_MM,
        "cm" => PT_PER_MM * 10.0,
        "in" => 72.0,
        "pc" => 12.0,
        "em" | "rem" => font_size,
        _ => return None,
    };
    Some(number * factor)
}

/// `50%` → `0.5`.
pub fn parse_percent(value: &str) -> Option<f32> {
    let n: f32 = value.trim().strip_suffix('%')?.trim().parse().ok()?;
    Some(n / 100.0)
}
