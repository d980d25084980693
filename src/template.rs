//! Template expansion – data model + template identifier → HTML text.
//!
//! [`TemplateExpander`] is the seam the engine calls through. The default
//! implementation, [`MiniJinjaExpander`], reads templates from a fixed root
//! directory and renders them with `minijinja` (Jinja2 syntax).

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use minijinja::{Environment, Error, ErrorKind, State, UndefinedBehavior, Value};

use crate::config::{EngineConfig, Encoding};
use crate::error::TemplateError;
use crate::page::{PageOrientation, PageSize, ORIENTATION_KEY, PAGE_SIZE_KEY};
use crate::page_style::{self, DEFAULT_MARGIN};

/// The report context: string keys to arbitrary JSON-like values.
pub type DataModel = serde_json::Map<String, serde_json::Value>;

/// Turns a template identifier and a data model into HTML.
///
/// Implementations must be safe for concurrent independent calls.
pub trait TemplateExpander: Send + Sync {
    fn expand(&self, template: &str, model: &DataModel) -> Result<String, TemplateError>;
}

/// File-backed `minijinja` expander.
///
/// Templates are read fresh on every call. `{% include %}` and `{% extends %}`
/// resolve against the same root.
pub struct MiniJinjaExpander {
    env: Environment<'static>,
    root: PathBuf,
    encoding: Encoding,
}

impl MiniJinjaExpander {
    pub fn new(config: &EngineConfig) -> Self {
        let root = config.template_root.clone();
        let encoding = config.encoding;

        let mut env = Environment::new();
        env.set_undefined_behavior(if config.strict_undefined {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Lenient
        });

        let loader_root = root.clone();
        env.set_loader(move |name| match read_template(&loader_root, encoding, name) {
            Ok(source) => Ok(Some(source)),
            Err(TemplateError::NotFound(_)) => Ok(None),
            Err(e) => Err(Error::new(ErrorKind::InvalidOperation, e.to_string())),
        });

        env.add_global("locale", Value::from(config.locale.clone()));
        env.add_filter("number", number);
        env.add_function("page_style", page_style_fn);
        env.add_function("mixed_page_styles", mixed_page_styles_fn);

        Self {
            env,
            root,
            encoding,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateExpander for MiniJinjaExpander {
    fn expand(&self, template: &str, model: &DataModel) -> Result<String, TemplateError> {
        let source = read_template(&self.root, self.encoding, template)?;
        self.env
            .render_named_str(template, &source, model)
            .map_err(|e| TemplateError::Expansion {
                name: template.to_string(),
                source: Box::new(e),
            })
    }
}

/// Join `name` onto `root`, refusing anything that could escape it.
fn resolve(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.trim().is_empty() || escapes {
        None
    } else {
        Some(root.join(relative))
    }
}

fn read_template(root: &Path, encoding: Encoding, name: &str) -> Result<String, TemplateError> {
    let path = resolve(root, name).ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
    let bytes = fs::read(&path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => TemplateError::NotFound(name.to_string()),
        _ => TemplateError::Read {
            name: name.to_string(),
            source,
        },
    })?;
    log::debug!("Loaded template '{}' from {}", name, path.display());
    encoding.decode(bytes).ok_or_else(|| TemplateError::Decode {
        name: name.to_string(),
        encoding: encoding.name(),
    })
}

// ---------------------------------------------------------------------------
// Template functions and filters
// ---------------------------------------------------------------------------

/// Decimal and digit-grouping separators for a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal: char,
    pub grouping: char,
}

impl NumberFormat {
    /// Separators keyed on the language subtag; unknown languages get `en`.
    pub fn for_locale(tag: &str) -> Self {
        let lang = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match lang.as_str() {
            "de" | "es" | "it" | "pt" | "nl" | "da" | "tr" | "id" => Self {
                decimal: ',',
                grouping: '.',
            },
            "fr" | "ru" | "pl" | "cs" | "sv" | "nb" | "fi" | "uk" => Self {
                decimal: ',',
                grouping: ' ',
            },
            _ => Self {
                decimal: '.',
                grouping: ',',
            },
        }
    }

    /// Fixed-point rendering with grouped integer digits.
    pub fn format(&self, value: f64, decimals: usize) -> String {
        if !value.is_finite() {
            return value.to_string();
        }
        let plain = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match plain.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (plain.as_str(), None),
        };

        let mut out = String::with_capacity(plain.len() + int_part.len() / 3 + 1);
        let nonzero = plain.chars().any(|c| c.is_ascii_digit() && c != '0');
        if value.is_sign_negative() && nonzero {
            out.push('-');
        }
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                out.push(self.grouping);
            }
            out.push(digit);
        }
        if let Some(frac) = frac_part {
            out.push(self.decimal);
            out.push_str(frac);
        }
        out
    }
}

/// `{{ total | number }}`, `{{ price | number(3) }}`
fn number(state: &State, value: f64, decimals: Option<usize>) -> String {
    let locale = state
        .lookup("locale")
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    NumberFormat::for_locale(&locale).format(value, decimals.unwrap_or(2))
}

/// Page size and orientation as the builder wrote them, or the defaults.
fn geometry(state: &State) -> (String, String) {
    let read = |key: &str| {
        state
            .lookup(key)
            .and_then(|v| v.as_str().map(str::to_owned))
    };
    let size = read(PAGE_SIZE_KEY).unwrap_or_else(|| PageSize::default().to_string());
    let orientation =
        read(ORIENTATION_KEY).unwrap_or_else(|| PageOrientation::default().to_string());
    (size, orientation)
}

/// `{{ page_style() }}`, `{{ page_style("1.5cm") }}`
fn page_style_fn(state: &State, margin: Option<String>) -> Value {
    let (size, orientation) = geometry(state);
    let margin = margin.as_deref().unwrap_or(DEFAULT_MARGIN);
    Value::from_safe_string(page_style::page_style(&size, &orientation, margin))
}

/// `{{ mixed_page_styles() }}`
fn mixed_page_styles_fn(state: &State, margin: Option<String>) -> Value {
    let (size, _) = geometry(state);
    let margin = margin.as_deref().unwrap_or(DEFAULT_MARGIN);
    Value::from_safe_string(page_style::mixed_orientation_styles(&size, margin))
}
