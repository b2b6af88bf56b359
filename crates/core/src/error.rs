//! Error types for glean operations.
//!
//! This module defines the main error type [`GleanError`] which covers
//! extraction mismatches, schema construction problems, and network
//! failures raised while fetching documents.
//!
//! Errors fall into two families. Extraction errors mean a document does
//! not have the shape a schema expects; retrying cannot fix that. Fetch
//! errors come from the network and are worth retrying, see
//! [`GleanError::is_transient`].
//!
//! # Example
//!
//! ```rust
//! use glean_core::{Document, Extract, GleanError};
//!
//! let doc = Document::parse("<p>no title here</p>");
//! let spec = Extract::one(".title").unwrap().text();
//!
//! match spec.resolve(doc.root(), "title") {
//!     Err(GleanError::ExtractionNotFound { selector, field }) => {
//!         assert_eq!(selector, ".title");
//!         assert_eq!(field, "title");
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for extraction and fetching.
#[derive(Error, Debug)]
pub enum GleanError {
    /// A `Select` spec matched no node.
    #[error("No element matches selector `{selector}` (field `{field}`)")]
    ExtractionNotFound { selector: String, field: String },

    /// The resolved node does not carry the requested attribute.
    #[error("Element has no attribute `{attribute}` (field `{field}`)")]
    AttributeMissing { attribute: String, field: String },

    /// A regex spec found no match in its input.
    #[error("Pattern `{pattern}` did not match (field `{field}`)")]
    PatternNotMatched { pattern: String, field: String },

    /// A CSS selector could not be compiled.
    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A regex pattern could not be compiled.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A spec produced a value that the field's target kind cannot hold.
    #[error("Field `{field}` expected {expected}")]
    TargetMismatch { field: String, expected: &'static str },

    /// A post-processing closure rejected its match.
    #[error("Post-processing failed: {0}")]
    PostProcess(String),

    /// A typed record was missing a field or held the wrong kind of value.
    #[error("Missing or mistyped field `{0}`")]
    MissingField(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors from reqwest.
    ///
    /// Wraps connection, DNS, TLS and body-read failures.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// The server answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or schema declaration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GleanError {
    /// Returns true for failures raised by the network layer.
    ///
    /// Only these are retried by [`RetryPolicy`](crate::RetryPolicy).
    /// Extraction errors describe the document itself and are returned
    /// to the caller on the first attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "fetch")]
            GleanError::Http(_) => true,
            GleanError::Timeout { .. } | GleanError::Status { .. } => true,
            _ => false,
        }
    }

    /// Builds a [`GleanError::PostProcess`] from any displayable error.
    ///
    /// Handy inside post-processing closures:
    /// `.map_err(GleanError::post_process)?`.
    pub fn post_process(err: impl std::fmt::Display) -> Self {
        GleanError::PostProcess(err.to_string())
    }
}

/// Result type alias for GleanError.
pub type Result<T> = std::result::Result<T, GleanError>;
