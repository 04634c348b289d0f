//! Error types for manifest resolution.

use thiserror::Error;

/// Result type for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that can occur while resolving a metalink manifest.
///
/// Every variant is fatal to the resolution attempt; the resolver performs
/// a single deterministic pass over one document and never retries.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Structurally invalid markup, or a required attribute missing on a
    /// recognized element (e.g. `<file>` without `name`).
    #[error("malformed manifest: {0}")]
    ManifestMalformed(String),

    /// Well-formed markup with semantically incomplete or inconsistent
    /// content: missing size, missing or unrecognized digest, no matching
    /// file entry, no usable mirror URL.
    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    /// Failure reported by the stream provider: connection errors, HTTP
    /// failure statuses, or the manifest exceeding its size budget.
    #[error("failed to fetch manifest from {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The cancellation signal was observed at a suspension point.
    #[error("manifest resolution cancelled")]
    Cancelled,

    /// Local setup failed before any byte was read: the blocking adapter
    /// could not create its call-local runtime, or the HTTP client could
    /// not be constructed.
    #[error("initialization failed: {0}")]
    Runtime(String),
}

impl ResolveError {
    /// True for manifest-content errors (malformed or invalid), as opposed
    /// to transport or lifecycle failures.
    pub fn is_manifest_error(&self) -> bool {
        matches!(
            self,
            ResolveError::ManifestMalformed(_) | ResolveError::ManifestInvalid(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_display_includes_detail() {
        let err = ResolveError::ManifestInvalid("no digest found".to_string());
        assert_eq!(err.to_string(), "invalid manifest: no digest found");
    }

    #[test]
    fn test_transport_display_includes_url() {
        let err = ResolveError::Transport {
            url: "https://example.com/repo.meta4".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("https://example.com/repo.meta4"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_is_manifest_error() {
        assert!(ResolveError::ManifestMalformed("x".into()).is_manifest_error());
        assert!(ResolveError::ManifestInvalid("x".into()).is_manifest_error());
        assert!(!ResolveError::Cancelled.is_manifest_error());
    }
}
