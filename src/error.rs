//! Error types for Elyx
//!
//! All modules use `ElyxResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Elyx operations
pub type ElyxResult<T> = Result<T, ElyxError>;

/// All errors that can occur in Elyx
#[derive(Error, Debug)]
pub enum ElyxError {
    // Remote store errors
    #[error("Mutation failed for {key} (status {status}): {message}")]
    MutationFailed {
        key: String,
        status: u16,
        message: String,
    },

    #[error("Mutation for {key} timed out after {secs}s")]
    MutationTimeout { key: String, secs: u64 },

    #[error("Fetch failed for {key} (status {status}): {message}")]
    FetchFailed {
        key: String,
        status: u16,
        message: String,
    },

    // Translation errors
    #[error("Translation unavailable: {0}")]
    TranslationUnavailable(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid phrase dictionary at {path}: {reason}")]
    DictionaryInvalid { path: String, reason: String },

    #[error("No remote store configured. Set store.base_url")]
    StoreNotConfigured,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Transport errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl ElyxError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a mutation failure for a cache key
    pub fn mutation_failed(key: impl ToString, status: u16, message: impl Into<String>) -> Self {
        Self::MutationFailed {
            key: key.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Create a fetch failure for a cache key
    pub fn fetch_failed(key: impl ToString, status: u16, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            key: key.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// Nothing in the core retries on its own; this only tells the caller
    /// whether offering a retry action makes sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MutationTimeout { .. } | Self::TranslationUnavailable(_) | Self::Http(_) => true,
            Self::MutationFailed { status, .. } | Self::FetchFailed { status, .. } => {
                *status == 0 || *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::StoreNotConfigured => Some("Run: elyx config set store.base_url <url>"),
            Self::MutationTimeout { .. } => Some("Raise store.mutation_timeout_secs or retry"),
            Self::ConfigInvalid { .. } => Some("Run: elyx config init --force"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ElyxError::mutation_failed("projects/p1", 409, "conflict");
        assert_eq!(
            err.to_string(),
            "Mutation failed for projects/p1 (status 409): conflict"
        );
    }

    #[test]
    fn error_hint() {
        assert_eq!(
            ElyxError::StoreNotConfigured.hint(),
            Some("Run: elyx config set store.base_url <url>")
        );
        assert_eq!(ElyxError::User("x".into()).hint(), None);
    }

    #[test]
    fn error_retryable() {
        assert!(ElyxError::fetch_failed("k", 503, "down").is_retryable());
        assert!(ElyxError::fetch_failed("k", 0, "network").is_retryable());
        assert!(!ElyxError::mutation_failed("k", 400, "bad").is_retryable());
        assert!(ElyxError::MutationTimeout {
            key: "k".into(),
            secs: 15
        }
        .is_retryable());
    }
}
