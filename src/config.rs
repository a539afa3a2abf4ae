//! Writer configuration.
//!
//! Settings are merged from three layers, later ones taking precedence:
//! the built in defaults, an optional TOML file, then environment variables
//! prefixed with `FCDR_`. Nested keys use a double underscore, e.g.
//! `FCDR_GLOBAL_ATTRIBUTES__INSTITUTION`.
use std::io::Write;
use std::path::Path;

use error_stack::ResultExt;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::ConfigError;
use crate::writer::{FcdrWriter, DEFAULT_COMPRESSION_LEVEL};

pub const ENV_PREFIX: &str = "FCDR_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Deflate level (0 to 9) for chunked variables
    pub compression_level: i32,
    /// Replace existing output files
    pub overwrite: bool,
    pub global_attributes: GlobalAttributes,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { compression_level: DEFAULT_COMPRESSION_LEVEL, overwrite: false, global_attributes: GlobalAttributes::default() }
    }
}

/// Producer supplied global attributes. Anything left unset keeps the empty
/// placeholder the templates create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Any other attributes, written as strings
    #[serde(flatten)]
    pub extra: IndexMap<String, String>,
}

impl GlobalAttributes {
    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let standard = [
            ("institution", &self.institution),
            ("title", &self.title),
            ("source", &self.source),
            ("history", &self.history),
            ("references", &self.references),
            ("comment", &self.comment),
        ];
        standard
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

impl WriterConfig {
    /// The layered configuration source, with `config_file` as the TOML layer if given.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(WriterConfig::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
        }
        Self::from_figment(&Self::figment(config_file))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        log::debug!("using writer configuration {config:?}");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=9).contains(&self.compression_level) {
            return Err(ConfigError::Invalid(format!(
                "compression_level must be between 0 and 9, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }

    pub fn writer(&self) -> FcdrWriter {
        FcdrWriter::new(self.compression_level)
    }

    /// Set the configured global attributes on `ds`, replacing existing values.
    pub fn apply_global_attributes(&self, ds: &mut Dataset) {
        for (name, value) in self.global_attributes.iter() {
            ds.set_attr(name, value);
        }
    }

    /// Write a commented example configuration file.
    pub fn write_template_example(example_file: &Path) -> error_stack::Result<(), ConfigError> {
        let comments = [
            "Example configuration for the fcdr writer.",
            "",
            "compression_level is the deflate level (0 to 9) applied to chunked variables.",
            "overwrite = true allows existing output files to be replaced.",
            "",
            "The [global_attributes] table fills in the global attributes every product",
            "carries (institution, title, source, history, references, comment). Any other",
            "key in that table is added to the file as an extra string attribute.",
            "",
            "Every setting can also be given as an environment variable, e.g.",
            "FCDR_COMPRESSION_LEVEL=9 or FCDR_GLOBAL_ATTRIBUTES__INSTITUTION=...",
        ];
        let write_err = || ConfigError::WriteExample(example_file.to_path_buf());

        let mut f = std::fs::File::create(example_file).change_context_lazy(write_err)?;
        for line in comments {
            writeln!(f, "# {line}").change_context_lazy(write_err)?;
        }
        let s = toml::to_string_pretty(&Self::template_example()).change_context_lazy(write_err)?;
        write!(f, "{s}").change_context_lazy(write_err)?;
        Ok(())
    }

    pub fn template_example() -> Self {
        let mut extra = IndexMap::new();
        extra.insert("project".to_string(), "FIDUCEO".to_string());
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            overwrite: false,
            global_attributes: GlobalAttributes {
                institution: Some("University of Reading".to_string()),
                title: Some("HIRS Easy FCDR".to_string()),
                source: Some("FIDUCEO HIRS FCDR processor".to_string()),
                history: None,
                references: Some("https://www.fiduceo.eu".to_string()),
                comment: None,
                extra,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AttrValue;

    #[test]
    fn test_defaults() {
        let config = WriterConfig::from_figment(&Figment::from(Serialized::defaults(WriterConfig::default()))).unwrap();
        assert_eq!(config.compression_level, 5);
        assert!(!config.overwrite);
        assert_eq!(config.global_attributes, GlobalAttributes::default());
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fcdr.toml");
        std::fs::write(
            &path,
            "compression_level = 9\n[global_attributes]\ninstitution = \"Test institute\"\nproject = \"unit tests\"\n",
        )
        .unwrap();

        let figment = Figment::from(Serialized::defaults(WriterConfig::default())).merge(Toml::file(&path));
        let config = WriterConfig::from_figment(&figment).unwrap();
        assert_eq!(config.compression_level, 9);
        assert!(!config.overwrite);
        assert_eq!(config.global_attributes.institution.as_deref(), Some("Test institute"));
        assert_eq!(config.global_attributes.extra.get("project").map(|s| s.as_str()), Some("unit tests"));
    }

    #[test]
    fn test_invalid_compression_level() {
        let figment = Figment::from(Serialized::defaults(WriterConfig::default()))
            .merge(Serialized::default("compression_level", 12));
        let err = WriterConfig::from_figment(&figment).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_config_file() {
        let err = WriterConfig::load(Some(Path::new("/nonexistent/fcdr.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_apply_global_attributes() {
        let mut ds = Dataset::new();
        ds.set_attr("institution", "");
        ds.set_attr("comment", "");
        WriterConfig::template_example().apply_global_attributes(&mut ds);
        assert_eq!(ds.attr("institution"), Some(&AttrValue::from("University of Reading")));
        assert_eq!(ds.attr("comment"), Some(&AttrValue::from("")));
        assert_eq!(ds.attr("project"), Some(&AttrValue::from("FIDUCEO")));
    }

    #[test]
    fn test_template_example_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");
        WriterConfig::write_template_example(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Example configuration"));

        let figment = Figment::from(Serialized::defaults(WriterConfig::default())).merge(Toml::file(&path));
        let config = WriterConfig::from_figment(&figment).unwrap();
        assert_eq!(config, WriterConfig::template_example());
    }
}
