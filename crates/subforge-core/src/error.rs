//! Error types for the conversion core.

use thiserror::Error;

/// A template could not be used (missing or wrong-shaped parts).
///
/// This is the only error class that aborts a whole conversion.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template is not a `[baseConfig, metadata]` array.
    #[error("template must be a [baseConfig, metadata] array")]
    NotAPair,

    /// The base configuration is malformed.
    #[error("invalid baseConfig: {0}")]
    BaseConfig(#[source] serde_json::Error),

    /// The metadata object is malformed.
    #[error("invalid metadata: {0}")]
    Metadata(#[source] serde_json::Error),

    /// The template text is not JSON at all.
    #[error("template is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A tag filter pattern failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter pattern {pattern:?}: {message}")]
pub struct FilterError {
    /// The pattern as written in the template.
    pub pattern: String,
    /// Compiler message.
    pub message: String,
}

/// A subscription body could not be interpreted.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Neither a structured document nor a link list, even after Base64 decoding.
    #[error("content is neither a proxy document nor a share-link list")]
    Unrecognized,

    /// The subscription body was empty.
    #[error("content is empty")]
    Empty,
}

/// A canonical record could not be mapped to an outbound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// A field the protocol cannot work without is absent.
    #[error("{protocol} record {name:?} is missing {field}")]
    MissingField {
        protocol: &'static str,
        name: String,
        field: &'static str,
    },
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;
