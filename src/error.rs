// src/error.rs

//! Unified error handling for the ingestion pipelines.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Store or remote unreachable during bootstrap
    #[error("Connection error: {0}")]
    Connection(String),

    /// Path/handle construction or synchronize failure for one category
    #[error("Sync error for category {category}: {message}")]
    Category { category: String, message: String },

    /// Store write failed
    #[error("Insert into {collection} failed: {message}")]
    Insert { collection: String, message: String },

    /// Store count query failed
    #[error("Count on {collection} failed: {message}")]
    Count { collection: String, message: String },

    /// Store delete failed
    #[error("Delete from {collection} failed: {message}")]
    Delete { collection: String, message: String },

    /// Catalog HTTP transfer failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Catalog body did not match the expected document shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Fetched catalog carried no licenses
    #[error("Catalog {version} contains no licenses")]
    EmptyCatalog { version: String },

    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Work stopped by the cancellation token
    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a connection error.
    pub fn connection(message: impl fmt::Display) -> Self {
        Self::Connection(message.to_string())
    }

    /// Create a category job error.
    pub fn category(category: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Category {
            category: category.into(),
            message: message.to_string(),
        }
    }

    /// Create an insert error.
    pub fn insert(collection: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Insert {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    /// Create a count error.
    pub fn count(collection: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Count {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    /// Create a delete error.
    pub fn delete(collection: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Delete {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl fmt::Display) -> Self {
        Self::Decode(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
