//! Fluent report configuration.
//!
//! ```no_run
//! use report_forge::{EngineConfig, PageSize, ReportEngine};
//!
//! let engine = ReportEngine::new(EngineConfig::new("templates"));
//! let pdf = engine
//!     .builder()
//!     .with_template("invoice.html")
//!     .with_data("customer", "ACME Corp")
//!     .with_page_size(PageSize::Letter)
//!     .landscape()
//!     .generate_as_bytes()?;
//! # Ok::<(), report_forge::Error>(())
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::engine::ReportEngine;
use crate::error::{ConfigurationError, Result};
use crate::page::{PageOrientation, PageSize, ORIENTATION_KEY, PAGE_SIZE_KEY};
use crate::template::DataModel;

/// Accumulates one report's template, data and page geometry.
///
/// Geometry setters also write the reserved `pageOrientation` / `pageSize`
/// keys into the data model, overwriting any caller value under the same
/// name. A builder is meant for one thread; it can be reused for several
/// generations.
#[derive(Debug, Clone)]
pub struct ReportBuilder<'e> {
    engine: &'e ReportEngine,
    template: Option<String>,
    data: DataModel,
    orientation: PageOrientation,
    page_size: PageSize,
}

impl<'e> ReportBuilder<'e> {
    pub fn new(engine: &'e ReportEngine) -> Self {
        Self {
            engine,
            template: None,
            data: DataModel::new(),
            orientation: PageOrientation::default(),
            page_size: PageSize::default(),
        }
    }

    /// Template identifier, relative to the engine's template root. Not
    /// checked until generation.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merge `data` into the model; existing keys are overwritten.
    pub fn extend_data(mut self, data: DataModel) -> Self {
        self.data.extend(data);
        self
    }

    /// Merge a typed value that serialises to a JSON object.
    pub fn with_model<T: Serialize + ?Sized>(self, model: &T) -> std::result::Result<Self, ConfigurationError> {
        match serde_json::to_value(model) {
            Ok(Value::Object(map)) => Ok(self.extend_data(map)),
            Ok(other) => Err(ConfigurationError::InvalidModel(json_kind(&other).to_string())),
            Err(e) => Err(ConfigurationError::InvalidModel(e.to_string())),
        }
    }

    /// Empty the data model, reserved geometry keys included.
    pub fn clear_data(mut self) -> Self {
        self.data.clear();
        self
    }

    pub fn with_orientation(mut self, orientation: PageOrientation) -> Self {
        self.orientation = orientation;
        self.data
            .insert(ORIENTATION_KEY.to_string(), Value::from(orientation.as_str()));
        self
    }

    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self.data
            .insert(PAGE_SIZE_KEY.to_string(), Value::from(page_size.as_str()));
        self
    }

    pub fn landscape(self) -> Self {
        self.with_orientation(PageOrientation::Landscape)
    }

    pub fn portrait(self) -> Self {
        self.with_orientation(PageOrientation::Portrait)
    }

    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn data(&self) -> &DataModel {
        &self.data
    }

    pub fn orientation(&self) -> PageOrientation {
        self.orientation
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// The template identifier, if it is set and not blank.
    pub fn validate(&self) -> std::result::Result<&str, ConfigurationError> {
        self.template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigurationError::MissingTemplate)
    }

    /// Generate into `sink`. Nothing reaches `sink` when generation fails.
    pub fn generate_to(&self, sink: &mut dyn Write) -> Result<()> {
        let template = self.validate()?;
        self.engine.generate_report(template, &self.data, sink)?;
        Ok(())
    }

    /// Generate into a new file at `path`; no file is left behind on failure.
    pub fn generate_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let template = self.validate()?;
        self.engine.generate_report_to_file(template, &self.data, path)?;
        Ok(())
    }

    pub fn generate_as_bytes(&self) -> Result<Vec<u8>> {
        let template = self.validate()?;
        Ok(self.engine.generate_report_as_bytes(template, &self.data)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::EngineConfig;
    use crate::error::{Error, RenderError, ReportErrorKind, TemplateError};
    use crate::pipeline::HtmlRenderer;
    use crate::template::TemplateExpander;

    struct Passthrough;

    impl TemplateExpander for Passthrough {
        fn expand(&self, template: &str, _model: &DataModel) -> std::result::Result<String, TemplateError> {
            Ok(format!("<p>{template}</p>"))
        }
    }

    /// Emits a PDF header, then gives up.
    struct Truncating;

    impl HtmlRenderer for Truncating {
        fn render(&self, _html: &str, sink: &mut dyn Write) -> std::result::Result<(), RenderError> {
            sink.write_all(b"%PDF-1.7\npartial")?;
            Err(RenderError::Pdf("font table missing".into()))
        }
    }

    #[derive(Serialize)]
    struct Invoice {
        number: u32,
        customer: &'static str,
    }

    #[test]
    fn geometry_setters_write_reserved_keys() {
        let engine = ReportEngine::default();
        let builder = engine.builder().landscape().portrait().with_page_size(PageSize::A4);
        assert_eq!(builder.data()[ORIENTATION_KEY], json!("portrait"));
        assert_eq!(builder.data()[PAGE_SIZE_KEY], json!("A4"));
        assert_eq!(builder.orientation(), PageOrientation::Portrait);
    }

    #[test]
    fn reserved_keys_overwrite_caller_data_and_back() {
        let engine = ReportEngine::default();
        let builder = engine
            .builder()
            .with_data(PAGE_SIZE_KEY, "tabloid")
            .with_page_size(PageSize::Legal);
        assert_eq!(builder.data()[PAGE_SIZE_KEY], json!("legal"));

        let builder = builder.with_data(PAGE_SIZE_KEY, "tabloid");
        assert_eq!(builder.data()[PAGE_SIZE_KEY], json!("tabloid"));
        // The stored size itself is not affected by data writes.
        assert_eq!(builder.page_size(), PageSize::Legal);
    }

    #[test]
    fn clear_data_drops_reserved_keys() {
        let engine = ReportEngine::default();
        let builder = engine.builder().landscape().with_data("a", 1).clear_data();
        assert!(builder.data().is_empty());
    }

    #[test]
    fn typed_models_merge() {
        let engine = ReportEngine::default();
        let builder = engine
            .builder()
            .with_data("number", 0)
            .with_model(&Invoice {
                number: 42,
                customer: "ACME",
            })
            .unwrap();
        assert_eq!(builder.data()["number"], json!(42));
        assert_eq!(builder.data()["customer"], json!("ACME"));

        let err = engine.builder().with_model(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidModel(kind) if kind == "an array"));
    }

    #[test]
    fn blank_template_is_a_configuration_error() {
        let engine = ReportEngine::default();
        for builder in [engine.builder(), engine.builder().with_template("   ")] {
            let err = builder.generate_as_bytes().unwrap_err();
            assert!(matches!(err, Error::Configuration(ConfigurationError::MissingTemplate)));
        }
    }

    #[test]
    fn failed_stream_generation_writes_nothing() {
        let engine =
            ReportEngine::with_collaborators(EngineConfig::default(), Box::new(Passthrough), Box::new(Truncating));
        let mut sink = Vec::new();
        let err = engine
            .builder()
            .with_template("report.html")
            .generate_to(&mut sink)
            .unwrap_err();
        assert!(matches!(err, Error::Report(ref e) if e.kind() == ReportErrorKind::Render));
        assert!(sink.is_empty(), "partial output leaked: {sink:?}");
    }
}
