//! Schema acquisition from the filesystem or over HTTP.

use super::normalizer::normalize_document;
use super::types::NormalizedSchema;
use crate::error::SchemaError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Timeout for fetching a remote schema
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Source of normalized schemas.
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    /// Load, normalize and validate the schema at `source`.
    async fn load(&self, source: &str) -> Result<NormalizedSchema, SchemaError>;
}

/// Loads from a file path or an `http(s)://` URL, JSON or YAML.
#[derive(Debug, Clone)]
pub struct DefaultSchemaLoader {
    client: reqwest::Client,
}

impl DefaultSchemaLoader {
    /// Create a loader with its own HTTP client
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<String, SchemaError> {
        let fetch_error = |message: String| SchemaError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }
}

impl Default for DefaultSchemaLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemaLoader for DefaultSchemaLoader {
    async fn load(&self, source: &str) -> Result<NormalizedSchema, SchemaError> {
        let text = if is_remote(source) {
            debug!(url = %source, "Fetching remote schema");
            self.fetch(source).await?
        } else {
            tokio::fs::read_to_string(source)
                .await
                .map_err(|e| SchemaError::Io {
                    path: source.to_string(),
                    source: e,
                })?
        };

        let normalized = parse_schema_str(&text, source)?;
        info!(
            source = %source,
            name = %normalized.schema.name,
            version = %normalized.schema.version,
            actions = normalized.schema.actions.len(),
            flows = normalized.schema.flow_count(),
            "Schema loaded"
        );
        Ok(normalized)
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Document format, from the source's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Unknown,
}

fn detect_format(source: &str) -> Format {
    let path = source.split(['?', '#']).next().unwrap_or(source).to_ascii_lowercase();
    if path.ends_with(".json") {
        Format::Json
    } else if path.ends_with(".yaml") || path.ends_with(".yml") {
        Format::Yaml
    } else {
        Format::Unknown
    }
}

/// Parse raw document text (JSON or YAML) and normalize it.
///
/// `source` is recorded as provenance and used to pick the format; without a
/// recognizable extension JSON is tried first, then YAML.
pub fn parse_schema_str(text: &str, source: &str) -> Result<NormalizedSchema, SchemaError> {
    let doc: Value = match detect_format(source) {
        Format::Json => serde_json::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?,
        Format::Yaml => serde_yaml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?,
        Format::Unknown => match serde_json::from_str(text) {
            Ok(doc) => doc,
            Err(json_err) => serde_yaml::from_str(text).map_err(|yaml_err| {
                SchemaError::Parse(format!("not JSON ({}) nor YAML ({})", json_err, yaml_err))
            })?,
        },
    };
    normalize_document(&doc, source)
}
