//! Error types for cacheit operations

use thiserror::Error;

/// Boxed error returned by user supplied compute closures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by the cache engine.
///
/// Only compute failures and validation failures surface here. A data source
/// that cannot report its metadata is not an error at this level: it is
/// downgraded to an uncacheable contribution (see [`SourceUnavailable`]).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("fragment `{fragment}` failed to compute: {source}")]
    ComputeFailure {
        fragment: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid cache tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: &'static str },

    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("invalid max-age {0}: expected -1 (permanent) or a non-negative number of seconds")]
    InvalidMaxAge(i64),

    #[error("placeholder `{0}` is declared more than once in the same view")]
    DuplicatePlaceholder(String),

    #[error("cached view refers to placeholder `{0}` but no such placeholder was supplied")]
    MissingPlaceholder(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CacheError {
    /// Wrap any error coming out of a compute closure.
    pub fn compute_failure(fragment: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ComputeFailure {
            fragment: fragment.into(),
            source: source.into(),
        }
    }

    /// Returns true if this error came from a failing compute closure.
    pub fn is_compute_failure(&self) -> bool {
        matches!(self, Self::ComputeFailure { .. })
    }
}

/// A data source could not report its cache metadata.
///
/// Typically the underlying record is missing. Callers treat this as
/// "do not cache" rather than a hard failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("source `{source_id}` is unavailable: {reason}")]
pub struct SourceUnavailable {
    pub source_id: String,
    pub reason: String,
}

impl SourceUnavailable {
    pub fn new(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}
