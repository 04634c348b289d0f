//! Resolved target descriptor handed to the download side.

use url::Url;

/// The validated output of manifest resolution.
///
/// Constructed once at preflight and never mutated afterward. The fetch
/// side is responsible for trying the mirrors in order, downloading the
/// payload, and comparing its computed digest and size against the values
/// carried here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    urls: Vec<Url>,
    size: u64,
    sha256: Option<String>,
    sha512: Option<String>,
}

impl ResolvedTarget {
    pub(crate) fn new(
        urls: Vec<Url>,
        size: u64,
        sha256: Option<String>,
        sha512: Option<String>,
    ) -> Self {
        Self {
            urls,
            size,
            sha256,
            sha512,
        }
    }

    /// Candidate mirror URLs, ranked in manifest document order.
    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    /// Declared payload size in bytes. Always nonzero.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Expected sha256 digest, lowercase hex, if the manifest declared one.
    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    /// Expected sha512 digest, lowercase hex, if the manifest declared one.
    pub fn sha512(&self) -> Option<&str> {
        self.sha512.as_deref()
    }
}
