//! Backend configuration schema declaration and validation.
//!
//! Drivers declare their option schema statically (`ConfigSchema`); the
//! external configuration loader consumes the declaration at startup. This
//! core never parses configuration files itself - it only validates option
//! shapes when asked, and it validates eagerly: a missing required option
//! is a startup failure, never a lazy mid-query one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BackendError, BackendResult};

/// Validity constraint for one configuration option value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// Must parse as an absolute URL
    Url,
    /// Free text, non-empty when required
    Text,
    /// Free text that must never be echoed into logs or error messages
    Secret,
}

/// Declared shape of one configuration option
#[derive(Debug, Clone)]
pub struct ConfigOption {
    /// Option key as it appears in the backend's config section
    pub key: &'static str,
    /// Whether the option must resolve to a value
    pub required: bool,
    /// Default applied when the section omits the option
    pub default: Option<&'static str>,
    /// Value constraint
    pub format: ConfigFormat,
}

/// Static declaration of a driver's configuration option schema
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    /// Driver type name the schema belongs to
    pub backend_type: &'static str,
    pub options: Vec<ConfigOption>,
}

impl ConfigSchema {
    /// Validate a configuration section against this schema.
    ///
    /// # Errors
    /// Returns `BackendError::Configuration` when a required option is
    /// missing (and has no default) or a value violates its format.
    pub fn validate(&self, settings: &BackendSettings) -> BackendResult<()> {
        for option in &self.options {
            let value = settings
                .options
                .get(option.key)
                .map(String::as_str)
                .or(option.default);

            let value = match value {
                Some(v) => v,
                None if option.required => {
                    return Err(BackendError::Configuration(format!(
                        "missing required option '{}' for backend type '{}'",
                        option.key, self.backend_type
                    )));
                }
                None => continue,
            };

            match option.format {
                ConfigFormat::Url => {
                    Url::parse(value).map_err(|e| {
                        BackendError::Configuration(format!(
                            "option '{}' is not a valid URL: {}",
                            option.key, e
                        ))
                    })?;
                }
                ConfigFormat::Text => {
                    if option.required && value.is_empty() {
                        return Err(BackendError::Configuration(format!(
                            "option '{}' must not be empty",
                            option.key
                        )));
                    }
                }
                ConfigFormat::Secret => {
                    // Same emptiness rule, but the value never appears in
                    // the error text.
                    if option.required && value.is_empty() {
                        return Err(BackendError::Configuration(format!(
                            "secret option '{}' must not be empty",
                            option.key
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve an option value from a section, falling back to the
    /// schema default.
    pub fn resolve(&self, settings: &BackendSettings, key: &str) -> Option<String> {
        if let Some(value) = settings.options.get(key) {
            return Some(value.clone());
        }
        self.options
            .iter()
            .find(|o| o.key == key)
            .and_then(|o| o.default.map(str::to_string))
    }
}

/// One backend's configuration section, handed over by the external
/// configuration loader. Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Driver type selecting which driver to construct (e.g. "zabbix")
    pub backend_type: String,
    /// Raw option key/value pairs from the config section
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl BackendSettings {
    pub fn new(backend_type: impl Into<String>) -> Self {
        Self {
            backend_type: backend_type.into(),
            options: HashMap::new(),
        }
    }

    /// Builder-style option setter, mostly for tests and tooling
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ConfigSchema {
        ConfigSchema {
            backend_type: "test",
            options: vec![
                ConfigOption {
                    key: "url",
                    required: true,
                    default: Some("http://localhost/api"),
                    format: ConfigFormat::Url,
                },
                ConfigOption {
                    key: "user",
                    required: true,
                    default: None,
                    format: ConfigFormat::Text,
                },
                ConfigOption {
                    key: "note",
                    required: false,
                    default: None,
                    format: ConfigFormat::Text,
                },
            ],
        }
    }

    #[test]
    fn valid_section_passes() {
        let settings = BackendSettings::new("test")
            .with_option("url", "https://monitor.example.com/api")
            .with_option("user", "operator");
        assert!(schema().validate(&settings).is_ok());
    }

    #[test]
    fn default_satisfies_required_option() {
        let settings = BackendSettings::new("test").with_option("user", "operator");
        assert!(schema().validate(&settings).is_ok());
    }

    #[test]
    fn missing_required_option_is_a_configuration_error() {
        let settings = BackendSettings::new("test");
        let err = schema().validate(&settings).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(msg) if msg.contains("user")));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let settings = BackendSettings::new("test")
            .with_option("url", "not a url")
            .with_option("user", "operator");
        assert!(matches!(
            schema().validate(&settings),
            Err(BackendError::Configuration(_))
        ));
    }

    #[test]
    fn resolve_prefers_section_value_over_default() {
        let schema = schema();
        let settings = BackendSettings::new("test").with_option("url", "https://a.example/api");
        assert_eq!(
            schema.resolve(&settings, "url"),
            Some("https://a.example/api".to_string())
        );
        let empty = BackendSettings::new("test");
        assert_eq!(
            schema.resolve(&empty, "url"),
            Some("http://localhost/api".to_string())
        );
        assert_eq!(schema.resolve(&empty, "user"), None);
    }
}
