//! # API Configuration
//!
//! Serde schema for the settings an [`crate::Api`] is built from. Every field
//! has a default, so a YAML file only needs to list what it changes.

use crate::error::{AppError, AppResult};
use crate::registry::DEFAULT_SCHEMA_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by every operation of one API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API title.
    pub title: String,
    /// API version.
    pub version: String,
    /// Prefix of schema `$ref` locations.
    pub schema_prefix: String,
    /// Route under which registered schemas are served as `{name}.json`.
    pub schemas_path: String,
    /// Add a `$schema` link to JSON object responses.
    pub link_schemas: bool,
    /// Largest accepted request body, overridable per operation.
    pub max_body_bytes: usize,
    /// Validate handler output before it is written.
    pub validate_responses: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            schema_prefix: DEFAULT_SCHEMA_PREFIX.to_string(),
            schemas_path: "/schemas".to_string(),
            link_schemas: true,
            max_body_bytes: 1024 * 1024,
            validate_responses: false,
        }
    }
}

impl ApiConfig {
    /// Default settings for the given title and version.
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Parses settings from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> AppResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| AppError::Config(format!("invalid config: {}", e)))
    }

    /// Reads settings from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }
}
