//! Error types for the OTM compiler
//!
//! Hard failures only. Recoverable, per-item problems (unreadable libraries,
//! unresolved references, duplicate symbols) are reported as findings through
//! [`crate::diagnostics::Findings`] instead.

use thiserror::Error;

use crate::codegen::TargetFormat;
use crate::model::EntityKind;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Compiler errors
#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("Invalid generation options: {0}")]
    InvalidOptions(String),

    #[error("No transformer available for {kind} -> {format}")]
    NoTransformer { kind: EntityKind, format: TargetFormat },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown library: {0}")]
    UnknownLibrary(String),

    #[error("Invalid namespace '{namespace}': {reason}")]
    InvalidNamespace { namespace: String, reason: String },

    #[error("Grammar {grammar} could not be compiled: {reason}")]
    Grammar { grammar: String, reason: String },

    #[error("Built-in library {0} is invalid")]
    BuiltIn(String),

    #[error("Failed to write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] toml::de::Error),
}

impl CompilerError {
    /// Wrap an I/O error raised while writing a generated file
    pub fn output(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Output {
            path: path.display().to_string(),
            source,
        }
    }
}
