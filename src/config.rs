//! Configuration module for the Pushgateway type guard
//!
//! Configuration is loaded from the Envoy plugin configuration JSON,
//! NOT from external files. This avoids file I/O in the Wasm sandbox.

use serde::Deserialize;

use crate::streaming::{pushgateway_self_metrics, Preamble, TypeDefinition};

/// Filter configuration loaded from Envoy plugin configuration
#[derive(Clone, Debug, Deserialize)]
pub struct FilterConfig {
    /// Types declared ahead of every push (the gateway's self-metrics)
    #[serde(default = "pushgateway_self_metrics")]
    pub type_definitions: Vec<TypeDefinition>,

    /// Only paths under this prefix are treated as pushes
    #[serde(default = "default_push_path_prefix")]
    pub push_path_prefix: String,

    /// HTTP methods that carry a push body
    #[serde(default = "default_push_methods")]
    pub push_methods: Vec<String>,

    /// Emit an audit event for every push
    #[serde(default = "default_log_rewrites")]
    pub log_rewrites: bool,
}

fn default_push_path_prefix() -> String {
    "/metrics/job/".to_string()
}

fn default_push_methods() -> Vec<String> {
    vec!["POST".to_string(), "PUT".to_string()]
}

fn default_log_rewrites() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            type_definitions: pushgateway_self_metrics(),
            push_path_prefix: default_push_path_prefix(),
            push_methods: default_push_methods(),
            log_rewrites: default_log_rewrites(),
        }
    }
}

impl FilterConfig {
    /// Parse and validate configuration from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config_str = std::str::from_utf8(bytes)
            .map_err(|e| ConfigError::InvalidUtf8(e.to_string()))?;

        let config: FilterConfig = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject names that would corrupt the preamble
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(def) = self.type_definitions.iter().find(|d| !d.has_valid_name()) {
            return Err(ConfigError::InvalidMetricName(def.name.clone()));
        }
        if self.push_methods.is_empty() {
            return Err(ConfigError::EmptyMethods);
        }
        Ok(())
    }

    /// Render the preamble for this configuration
    pub fn preamble(&self) -> Preamble {
        Preamble::from_definitions(&self.type_definitions)
    }

    /// Check if a request is a text format push that should be rewritten.
    ///
    /// A missing or empty `content-type` means the text format, as it does
    /// for the Pushgateway. Protobuf pushes are left alone.
    pub fn is_push(&self, method: &str, path: &str, content_type: Option<&str>) -> bool {
        path.starts_with(&self.push_path_prefix)
            && self.push_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
            && content_type.map_or(true, is_text_exposition)
    }
}

/// `text/plain`, with or without parameters such as `version=0.0.4`
fn is_text_exposition(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    media_type.is_empty() || media_type.eq_ignore_ascii_case("text/plain")
}

/// Configuration parsing errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidUtf8(String),
    InvalidJson(String),
    InvalidMetricName(String),
    EmptyMethods,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidUtf8(e) => write!(f, "Invalid UTF-8: {}", e),
            ConfigError::InvalidJson(e) => write!(f, "Invalid JSON: {}", e),
            ConfigError::InvalidMetricName(name) => write!(f, "Invalid metric name: {:?}", name),
            ConfigError::EmptyMethods => write!(f, "push_methods must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}
