//! HTML parser – converts expanded template text into a small DOM.
//!
//! Tolerant where templates are usually sloppy (unclosed `<p>`/`<li>`,
//! void elements written without `/>`), strict where the input cannot be
//! laid out at all (unterminated tags or comments, closing tags that match
//! no open element).

use std::collections::HashMap;

use crate::error::RenderError;

/// A node in the DOM.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with a lower-cased tag name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// A parsed document split into the parts the renderer cares about.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Text of `<title>`, if any.
    pub title: Option<String>,
    /// All `<style>` blocks, concatenated in document order.
    pub stylesheet: String,
    /// The `<body>` element, or a synthetic one wrapping the top-level
    /// content when the markup has none.
    pub body: Element,
}

/// Elements that never have children.
fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "br" | "hr" | "img" | "meta" | "link" | "input" | "col" | "area" | "base" | "wbr"
    )
}

/// Elements whose content is taken verbatim up to the matching close tag.
fn is_raw_text(tag: &str) -> bool {
    matches!(tag, "style" | "script" | "title" | "textarea")
}

/// Parse an HTML string into a [`Document`].
pub fn parse_document(html: &str) -> Result<Document, RenderError> {
    let nodes = parse_html(html)?;

    let mut doc = Document::default();
    extract_head(&nodes, &mut doc);
    doc.body = match find_body(&nodes) {
        Some(body) => body.clone(),
        None => {
            let mut body = Element::new("body");
            body.children = strip_head(&nodes);
            body
        }
    };
    Ok(doc)
}

/// Parse an HTML string into top-level DOM nodes.
pub fn parse_html(html: &str) -> Result<Vec<Node>, RenderError> {
    Parser::new(html).run()
}

fn extract_head(nodes: &[Node], doc: &mut Document) {
    for node in nodes {
        if let Node::Element(e) = node {
            match e.tag.as_str() {
                "style" => {
                    doc.stylesheet.push_str(&e.text_content());
                    doc.stylesheet.push('\n');
                }
                "title" if doc.title.is_none() => {
                    let title = e.text_content().trim().to_string();
                    if !title.is_empty() {
                        doc.title = Some(title);
                    }
                }
                _ => extract_head(&e.children, doc),
            }
        }
    }
}

fn find_body(nodes: &[Node]) -> Option<&Element> {
    nodes.iter().find_map(|node| match node {
        Node::Element(e) if e.tag == "body" => Some(e),
        Node::Element(e) if e.tag == "html" => find_body(&e.children),
        _ => None,
    })
}

fn strip_head(nodes: &[Node]) -> Vec<Node> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Element(e) if matches!(e.tag.as_str(), "head" | "style" | "script" | "title") => {}
            Node::Element(e) if e.tag == "html" => out.extend(strip_head(&e.children)),
            other => out.push(other.clone()),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Parser – single pass over the input with an explicit open-element stack
// ---------------------------------------------------------------------------

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Open elements; index 0 is a synthetic root.
    stack: Vec<Element>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            stack: vec![Element::new("#root")],
        }
    }

    fn run(mut self) -> Result<Vec<Node>, RenderError> {
        while !self.eof() {
            if self.starts_with("<!--") {
                self.skip_comment()?;
            } else if self.starts_with("</") {
                self.close_tag()?;
            } else if self.starts_with("<!") || self.starts_with("<?") {
                self.skip_past('>')?;
            } else if self.at_tag_open() {
                self.open_tag()?;
            } else {
                self.text();
            }
        }
        // Implicitly close whatever is still open.
        while self.stack.len() > 1 {
            self.pop();
        }
        Ok(self.stack.pop().map(|root| root.children).unwrap_or_default())
    }

    fn text(&mut self) {
        let start = self.pos;
        // The first character may be a `<` that does not open a tag.
        self.pos += self.rest().chars().next().map_or(1, char::len_utf8);
        while !self.eof() && !self.at_markup() {
            self.pos += self.rest().chars().next().map_or(1, char::len_utf8);
        }
        let raw = &self.input[start..self.pos];
        self.append(Node::Text(decode_entities(raw)));
    }

    fn open_tag(&mut self) -> Result<(), RenderError> {
        let tag_start = self.pos;
        self.pos += 1; // '<'
        let name = self.name().to_ascii_lowercase();
        let mut elem = Element::new(name.clone());

        loop {
            self.skip_whitespace();
            if self.eof() {
                return Err(self.unterminated(tag_start));
            }
            if self.starts_with("/>") {
                self.pos += 2;
                self.append(Node::Element(elem));
                return Ok(());
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            let key = self.name().to_ascii_lowercase();
            if key.is_empty() {
                // Stray character inside the tag.
                self.pos += self.rest().chars().next().map_or(1, char::len_utf8);
                continue;
            }
            let value = self.attr_value()?;
            elem.attributes.insert(key, value);
        }

        if is_void(&name) {
            self.append(Node::Element(elem));
        } else if is_raw_text(&name) {
            let close = format!("</{name}");
            let rest = self.rest();
            let end = find_ignore_case(rest, &close).ok_or_else(|| self.unterminated(tag_start))?;
            let raw = &rest[..end];
            let text = if name == "title" {
                decode_entities(raw)
            } else {
                raw.to_string()
            };
            elem.children.push(Node::Text(text));
            self.pos += end;
            self.skip_past('>')?;
            self.append(Node::Element(elem));
        } else {
            self.auto_close_for(&name);
            self.stack.push(elem);
        }
        Ok(())
    }

    fn close_tag(&mut self) -> Result<(), RenderError> {
        let tag_start = self.pos;
        self.pos += 2; // '</'
        let name = self.name().to_ascii_lowercase();
        self.skip_past('>')
            .map_err(|_| self.unterminated(tag_start))?;

        if is_void(&name) {
            return Ok(());
        }
        match self.stack.iter().rposition(|e| e.tag == name) {
            Some(idx) if idx > 0 => {
                while self.stack.len() > idx {
                    self.pop();
                }
                Ok(())
            }
            _ => Err(RenderError::Markup(format!(
                "closing tag </{name}> at byte {tag_start} has no matching open element"
            ))),
        }
    }

    /// `<p>` and `<li>` close an open sibling of the same kind, as browsers do.
    fn auto_close_for(&mut self, name: &str) {
        let closes: &[&str] = match name {
            "p" | "div" | "table" | "ul" | "ol" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => &["p"],
            "li" => &["li"],
            "tr" => &["tr", "td", "th"],
            "td" | "th" => &["td", "th"],
            _ => return,
        };
        while self.stack.len() > 1
            && self
                .stack
                .last()
                .is_some_and(|top| closes.contains(&top.tag.as_str()))
        {
            self.pop();
        }
    }

    fn pop(&mut self) {
        if let Some(elem) = self.stack.pop() {
            self.append(Node::Element(elem));
        }
    }

    fn append(&mut self, node: Node) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        }
    }

    fn name(&mut self) -> &'a str {
        let start = self.pos;
        let input = self.input;
        for (i, c) in input[start..].char_indices() {
            if !(c.is_alphanumeric() || matches!(c, '-' | '_' | ':')) {
                self.pos = start + i;
                return &input[start..self.pos];
            }
        }
        self.pos = input.len();
        &input[start..]
    }

    fn attr_value(&mut self) -> Result<String, RenderError> {
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Ok(String::new());
        }
        self.pos += 1;
        self.skip_whitespace();

        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                let start = self.pos;
                while !self.eof() {
                    let c = self.rest().chars().next().unwrap_or('>');
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.pos += c.len_utf8();
                }
                return Ok(decode_entities(&self.input[start..self.pos]));
            }
        };
        let value_start = self.pos + 1;
        match self.input[value_start..].find(quote) {
            Some(len) => {
                self.pos = value_start + len + 1;
                Ok(decode_entities(&self.input[value_start..value_start + len]))
            }
            None => Err(self.unterminated(value_start - 1)),
        }
    }

    fn skip_comment(&mut self) -> Result<(), RenderError> {
        match self.rest().find("-->") {
            Some(end) => {
                self.pos += end + 3;
                Ok(())
            }
            None => Err(RenderError::Markup(format!(
                "unterminated comment at byte {}",
                self.pos
            ))),
        }
    }

    fn skip_past(&mut self, c: char) -> Result<(), RenderError> {
        match self.rest().find(c) {
            Some(i) => {
                self.pos += i + c.len_utf8();
                Ok(())
            }
            None => Err(self.unterminated(self.pos)),
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    /// `<` followed by a letter starts a tag; anything else is text.
    fn at_tag_open(&self) -> bool {
        let mut chars = self.rest().chars();
        chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn at_markup(&self) -> bool {
        self.starts_with("</") || self.starts_with("<!") || self.starts_with("<?") || self.at_tag_open()
    }

    fn unterminated(&self, at: usize) -> RenderError {
        RenderError::Markup(format!("unterminated tag at byte {at}"))
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    hay.windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

/// Decode named and numeric character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "euro" => '\u{20AC}',
        "pound" => '\u{00A3}',
        "yen" => '\u{00A5}',
        "cent" => '\u{00A2}',
        "sect" => '\u{00A7}',
        "deg" => '\u{00B0}',
        "middot" => '\u{00B7}',
        "times" => '\u{00D7}',
        "bull" => '\u{2022}',
        "hellip" => '\u{2026}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        _ => return None,
    };
    Some(c)
}
