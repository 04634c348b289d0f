//! Streaming manifest resolution.
//!
//! [`MetalinkResolver`] drives one resolution attempt: it opens the
//! manifest byte stream through the injected provider, tokenizes it
//! incrementally with quick-xml over an 8 KiB buffered reader, feeds each
//! start/end/text event to the parser state machine, and runs preflight
//! validation when the stream is exhausted. The whole attempt runs on one
//! logical task; the only suspension points are the stream open and each
//! buffered read, and cancellation is observed at both.

mod blocking;

use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::{ResolveError, ResolveResult};
use crate::parser::ParseRequest;
use crate::stream::ManifestStreamProvider;
use crate::target::ResolvedTarget;

/// Buffered-read granularity over the manifest stream (8 KiB).
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Resolves metalink manifests into verified download targets.
///
/// One resolver can serve many attempts; each call to [`resolve`] owns its
/// parse state exclusively and discards it on any failure or cancellation.
///
/// [`resolve`]: MetalinkResolver::resolve
pub struct MetalinkResolver {
    provider: Arc<dyn ManifestStreamProvider>,
    requested_file: String,
    max_size: u64,
}

impl MetalinkResolver {
    /// Create a resolver for `requested_file`.
    ///
    /// `max_size` caps the bytes read from the manifest document itself,
    /// not the eventual payload.
    pub fn new(
        provider: Arc<dyn ManifestStreamProvider>,
        requested_file: impl Into<String>,
        max_size: u64,
    ) -> Self {
        Self {
            provider,
            requested_file: requested_file.into(),
            max_size,
        }
    }

    /// Resolve the manifest at `source` into a [`ResolvedTarget`].
    ///
    /// Fails fast: the first transport, markup or validation error aborts
    /// the attempt and remaining bytes are not read. Cancelling `cancel`
    /// completes the attempt with [`ResolveError::Cancelled`].
    pub async fn resolve(
        &self,
        source: &Url,
        cancel: &CancellationToken,
    ) -> ResolveResult<ResolvedTarget> {
        debug!(file = %self.requested_file, %source, "resolving metalink manifest");

        let stream = tokio::select! {
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            opened = self.provider.open(source, self.max_size) => opened?,
        };

        let mut reader = Reader::from_reader(BufReader::with_capacity(READ_BUFFER_SIZE, stream));
        reader.config_mut().trim_text(true);

        let mut request = ParseRequest::new(self.requested_file.clone());
        let mut buf = Vec::new();
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                event = reader.read_event_into_async(&mut buf) => {
                    event.map_err(|e| scan_error(e, source))?
                }
            };

            match event {
                Event::Start(ref e) => {
                    let (name, attributes) = decode_start(e)?;
                    request.start_element(&name, &attributes)?;
                }
                Event::Empty(ref e) => {
                    let (name, attributes) = decode_start(e)?;
                    request.start_element(&name, &attributes)?;
                    request.end_element();
                }
                Event::End(_) => request.end_element(),
                Event::Text(ref t) => {
                    let text = t.unescape().map_err(|e| {
                        ResolveError::ManifestMalformed(format!("bad text content: {}", e))
                    })?;
                    request.text(&text);
                }
                Event::CData(ref t) => {
                    let text = std::str::from_utf8(t).map_err(|e| {
                        ResolveError::ManifestMalformed(format!("bad text content: {}", e))
                    })?;
                    request.text(text);
                }
                Event::Eof => break,
                // declaration, comments, processing instructions, doctype
                _ => {}
            }
            buf.clear();
        }

        request.finish()
    }
}

/// Decode an element name and its attributes into owned strings.
fn decode_start(e: &BytesStart<'_>) -> ResolveResult<(String, Vec<(String, String)>)> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            ResolveError::ManifestMalformed(format!("bad attribute in <{}>: {}", name, err))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| {
                ResolveError::ManifestMalformed(format!(
                    "bad value for attribute '{}' in <{}>: {}",
                    key, name, err
                ))
            })?
            .into_owned();
        attributes.push((key, value));
    }
    Ok((name, attributes))
}

/// Map a scanner error: I/O failures come from the stream provider and stay
/// transport errors; everything else is malformed markup.
fn scan_error(err: quick_xml::Error, source: &Url) -> ResolveError {
    match err {
        quick_xml::Error::Io(e) => ResolveError::Transport {
            url: source.to_string(),
            reason: e.to_string(),
        },
        other => ResolveError::ManifestMalformed(format!("markup syntax error: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStreamProvider;

    const SHA256_HEX: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn manifest() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<metalink xmlns="urn:ietf:params:xml:ns:metalink">
  <files>
    <file name="repo.bin">
      <size>4096</size>
      <verification>
        <hash name="sha256">{}</hash>
      </verification>
      <resources>
        <url protocol="https">https://mirror-a.example.com/repo.bin</url>
        <url protocol="http">http://mirror-b.example.com/repo.bin</url>
      </resources>
    </file>
  </files>
</metalink>"#,
            SHA256_HEX
        )
    }

    fn source() -> Url {
        Url::parse("https://example.com/repo.meta4").unwrap()
    }

    #[tokio::test]
    async fn test_resolve_happy_path() {
        let provider = Arc::new(MemoryStreamProvider::new(manifest().into_bytes()));
        let resolver = MetalinkResolver::new(provider, "repo.bin", 64 * 1024);

        let target = resolver
            .resolve(&source(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(target.size(), 4096);
        assert_eq!(target.sha256(), Some(SHA256_HEX));
        assert_eq!(target.urls().len(), 2);
        assert_eq!(target.urls()[0].host_str(), Some("mirror-a.example.com"));
        assert_eq!(target.urls()[1].host_str(), Some("mirror-b.example.com"));
    }

    #[tokio::test]
    async fn test_resolve_pre_cancelled() {
        let provider = Arc::new(MemoryStreamProvider::new(manifest().into_bytes()));
        let resolver = MetalinkResolver::new(provider, "repo.bin", 64 * 1024);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver.resolve(&source(), &cancel).await.unwrap_err();
        assert!(matches!(err, ResolveError::Cancelled));
    }

    #[tokio::test]
    async fn test_resolve_truncated_document_is_malformed() {
        // Cut the stream in the middle of a tag.
        let full = manifest();
        let truncated = full[..full.find("</size>").unwrap() + 3].to_string();
        let provider = Arc::new(MemoryStreamProvider::new(truncated.into_bytes()));
        let resolver = MetalinkResolver::new(provider, "repo.bin", 64 * 1024);

        let err = resolver
            .resolve(&source(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ManifestMalformed(_)));
    }

    #[tokio::test]
    async fn test_resolve_cdata_mirror_url() {
        // CDATA content is not entity-decoded, so a raw ampersand is fine.
        let doc = format!(
            r#"<metalink><files><file name="repo.bin">
  <size>4096</size>
  <verification><hash name="sha256">{}</hash></verification>
  <resources>
    <url protocol="https"><![CDATA[https://mirror-a.example.com/repo.bin?a=1&b=2]]></url>
  </resources>
</file></files></metalink>"#,
            SHA256_HEX
        );
        let provider = Arc::new(MemoryStreamProvider::new(doc.into_bytes()));
        let resolver = MetalinkResolver::new(provider, "repo.bin", 64 * 1024);

        let target = resolver
            .resolve(&source(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(target.urls().len(), 1);
        assert_eq!(target.urls()[0].query(), Some("a=1&b=2"));
    }

    #[tokio::test]
    async fn test_resolve_invalid_utf8_cdata_is_malformed() {
        let mut doc = br#"<metalink><files><file name="repo.bin">
  <size><![CDATA["#
            .to_vec();
        doc.push(0xff);
        doc.extend_from_slice(b"]]></size></file></files></metalink>");
        let provider = Arc::new(MemoryStreamProvider::new(doc));
        let resolver = MetalinkResolver::new(provider, "repo.bin", 64 * 1024);

        let err = resolver
            .resolve(&source(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ManifestMalformed(_)));
    }

    #[tokio::test]
    async fn test_resolve_over_budget_is_transport_error() {
        let provider = Arc::new(MemoryStreamProvider::new(manifest().into_bytes()));
        let resolver = MetalinkResolver::new(provider, "repo.bin", 16);

        let err = resolver
            .resolve(&source(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Transport { .. }));
    }
}
