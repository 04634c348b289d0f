//! Candidate mirror URL collection.
//!
//! Mirrors are collected in document order as the parser walks `<url>`
//! elements. Entries with an unsupported protocol or text that does not
//! parse as a URI are dropped silently; a manifest with only unusable
//! mirrors fails later, at preflight, not here.

use tracing::debug;
use url::Url;

/// Ordered, append-only list of accepted mirror URLs.
///
/// Insertion order is document order, which doubles as the mirror ranking
/// handed to the fetch side. Duplicates are kept as-is.
#[derive(Debug, Default)]
pub struct MirrorList {
    urls: Vec<Url>,
}

impl MirrorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a mirror entry for collection.
    ///
    /// Accepts the entry only if `protocol` is `http` or `https` and `text`
    /// parses as a URI. Returns `true` if the entry was appended; `false`
    /// means it was ignored, which is not an error.
    pub fn offer(&mut self, protocol: &str, text: &str) -> bool {
        if protocol != "http" && protocol != "https" {
            debug!(protocol, "ignoring mirror with unsupported protocol");
            return false;
        }
        match Url::parse(text) {
            Ok(url) => {
                self.urls.push(url);
                true
            }
            Err(err) => {
                debug!(%err, text, "ignoring unparseable mirror URL");
                false
            }
        }
    }

    /// Number of accepted mirrors.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Accepted mirrors in document order.
    pub fn as_slice(&self) -> &[Url] {
        &self.urls
    }

    pub(crate) fn into_urls(self) -> Vec<Url> {
        self.urls
    }
}
