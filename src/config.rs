//! Engine configuration – where templates live, how they are decoded, which
//! locale formats numbers, and how strictly undefined variables are treated.
//!
//! Loaded from JSON or built in code; immutable once handed to the engine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::pipeline::PipelineConfig;

/// Character encoding of template files on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8", alias = "UTF-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin1", alias = "ISO-8859-1", alias = "iso-8859-1")]
    Latin1,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode raw template bytes. `None` when the bytes are not valid in
    /// this encoding (Latin-1 always succeeds).
    pub fn decode(self, bytes: Vec<u8>) -> Option<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes).ok(),
            Encoding::Latin1 => Some(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// Configuration shared by every generation call of one engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory template identifiers are resolved against.
    pub template_root: PathBuf,
    /// Encoding of template files.
    pub encoding: Encoding,
    /// Locale tag used for number formatting in templates (e.g. `en-US`).
    pub locale: String,
    /// Fail expansion on undefined variables instead of rendering them empty.
    pub strict_undefined: bool,
    /// Fallback geometry and metadata for the default PDF renderer.
    pub renderer: PipelineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template_root: PathBuf::from("templates"),
            encoding: Encoding::Utf8,
            locale: "en-US".to_string(),
            strict_undefined: true,
            renderer: PipelineConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted at `template_root`.
    pub fn new(template_root: impl Into<PathBuf>) -> Self {
        Self {
            template_root: template_root.into(),
            ..Self::default()
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_strict_undefined(mut self, strict: bool) -> Self {
        self.strict_undefined = strict;
        self
    }

    pub fn with_renderer(mut self, renderer: PipelineConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    ///
    /// A relative `template_root` is resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigurationError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&json)?;
        if config.template_root.is_relative() {
            if let Some(dir) = path.parent() {
                config.template_root = dir.join(&config.template_root);
            }
        }
        Ok(config)
    }

    /// Serialise to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageOrientation, PageSize};

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.template_root, PathBuf::from("templates"));
        assert_eq!(cfg.encoding, Encoding::Utf8);
        assert_eq!(cfg.locale, "en-US");
        assert!(cfg.strict_undefined);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(
            r#"{ "template_root": "/srv/reports", "encoding": "ISO-8859-1",
                 "renderer": { "page_size": "letter", "orientation": "landscape" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.template_root, PathBuf::from("/srv/reports"));
        assert_eq!(cfg.encoding, Encoding::Latin1);
        assert_eq!(cfg.locale, "en-US");
        assert_eq!(cfg.renderer.page_size, PageSize::Letter);
        assert_eq!(cfg.renderer.orientation, PageOrientation::Landscape);
    }

    #[test]
    fn json_round_trip() {
        let cfg = EngineConfig::default().with_locale("de-DE");
        let json = cfg.to_json().unwrap();
        assert!(json.contains("\"locale\": \"de-DE\""));

        let back = EngineConfig::from_json(&json).unwrap();
        assert_eq!(back.locale, "de-DE");
        assert_eq!(back.encoding, cfg.encoding);
        assert_eq!(back.renderer, cfg.renderer);
    }

    #[test]
    fn bad_json_is_a_configuration_error() {
        let err = EngineConfig::from_json("{ \"strict_undefined\": \"yes\" }").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidConfig(_)));
    }

    #[test]
    fn relative_root_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{ "template_root": "tpl" }"#).unwrap();

        let cfg = EngineConfig::from_file(&path).unwrap();
        assert_eq!(cfg.template_root, dir.path().join("tpl"));
    }

    #[test]
    fn latin1_decodes_every_byte() {
        assert_eq!(Encoding::Latin1.decode(vec![0x43, 0x61, 0x66, 0xE9]).unwrap(), "Café");
        assert!(Encoding::Utf8.decode(vec![0xE9]).is_none());
    }
}
