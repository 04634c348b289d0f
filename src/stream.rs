//! Stream-provider boundary for manifest retrieval.
//!
//! The resolver never fetches bytes itself; it asks a
//! [`ManifestStreamProvider`] to open a readable byte stream for the
//! manifest's source URL. The trait is dyn-compatible (boxed-future
//! returns) so providers can be injected, which also keeps the resolver
//! testable against in-memory documents.
//!
//! The provider enforces the manifest size budget: every returned stream is
//! wrapped so that delivering more than `max_size` bytes fails the read
//! with an I/O error, which the resolver surfaces as a transport failure.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::TryStreamExt;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;
use url::Url;

use crate::error::{ResolveError, ResolveResult};

/// Default timeout for manifest HTTP requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A readable manifest byte stream.
pub type ManifestStream = Box<dyn AsyncRead + Send + Unpin>;

/// Opens manifest byte streams for the resolver.
pub trait ManifestStreamProvider: Send + Sync {
    /// Asynchronously open a byte stream for `source`.
    ///
    /// The returned stream must fail once more than `max_size` bytes have
    /// been delivered.
    fn open<'a>(
        &'a self,
        source: &'a Url,
        max_size: u64,
    ) -> Pin<Box<dyn Future<Output = ResolveResult<ManifestStream>> + Send + 'a>>;
}

/// HTTP(S) stream provider backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpStreamProvider {
    client: reqwest::Client,
}

impl HttpStreamProvider {
    /// Create a provider with the default request timeout.
    pub fn new() -> ResolveResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> ResolveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Runtime(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl ManifestStreamProvider for HttpStreamProvider {
    fn open<'a>(
        &'a self,
        source: &'a Url,
        max_size: u64,
    ) -> Pin<Box<dyn Future<Output = ResolveResult<ManifestStream>> + Send + 'a>> {
        Box::pin(async move {
            let transport = |reason: String| ResolveError::Transport {
                url: source.to_string(),
                reason,
            };

            let response = self
                .client
                .get(source.clone())
                .send()
                .await
                .map_err(|e| transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(transport(format!("request failed with status {}", status)));
            }

            let stream = response.bytes_stream().map_err(io::Error::other);
            let reader = StreamReader::new(Box::pin(stream));
            Ok(Box::new(SizeBudget::new(reader, max_size)) as ManifestStream)
        })
    }
}

/// In-memory stream provider.
///
/// Serves a manifest document already held in memory, for callers that
/// retrieve the bytes themselves and for tests.
#[derive(Debug, Clone)]
pub struct MemoryStreamProvider {
    document: Bytes,
}

impl MemoryStreamProvider {
    pub fn new(document: impl Into<Bytes>) -> Self {
        Self {
            document: document.into(),
        }
    }
}

impl ManifestStreamProvider for MemoryStreamProvider {
    fn open<'a>(
        &'a self,
        _source: &'a Url,
        max_size: u64,
    ) -> Pin<Box<dyn Future<Output = ResolveResult<ManifestStream>> + Send + 'a>> {
        let document = self.document.clone();
        Box::pin(async move {
            let reader = io::Cursor::new(document);
            Ok(Box::new(SizeBudget::new(reader, max_size)) as ManifestStream)
        })
    }
}

/// Counting reader that fails once the byte budget is exceeded.
struct SizeBudget<R> {
    inner: R,
    remaining: u64,
}

impl<R> SizeBudget<R> {
    fn new(inner: R, budget: u64) -> Self {
        Self {
            inner,
            remaining: budget,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for SizeBudget<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        // Read into a clamped view of at most one byte past the budget so
        // an overrun is detectable without committing bytes to the caller:
        // an erroring poll_read must not have made progress.
        let limit = usize::try_from(this.remaining.saturating_add(1)).unwrap_or(usize::MAX);
        let mut clamped = buf.take(limit);
        ready!(Pin::new(&mut this.inner).poll_read(cx, &mut clamped))?;

        let read = clamped.filled().len();
        if read as u64 > this.remaining {
            return Poll::Ready(Err(io::Error::other("manifest exceeds size budget")));
        }
        this.remaining -= read as u64;

        // The inner reader initialized `read` bytes of the clamped view,
        // which aliases the parent buffer's unfilled region.
        unsafe { buf.assume_init(read) };
        buf.advance(read);
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_size_budget_allows_exact_budget() {
        let mut reader = SizeBudget::new(io::Cursor::new(vec![0u8; 100]), 100);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 100);
    }

    #[tokio::test]
    async fn test_size_budget_fails_when_exceeded() {
        let mut reader = SizeBudget::new(io::Cursor::new(vec![0u8; 200]), 100);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert!(err.to_string().contains("size budget"));
        // The erroring read commits nothing, so only in-budget bytes can
        // ever reach the caller.
        assert!(out.len() <= 100, "{} bytes leaked past the budget", out.len());
    }

    #[tokio::test]
    async fn test_size_budget_overrun_errors_on_first_read() {
        // A single oversized read must report the overrun as the read
        // result, not as progress plus a deferred error.
        let mut reader = SizeBudget::new(io::Cursor::new(vec![7u8; 64]), 16);
        let mut buf = [0u8; 64];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(err.to_string().contains("size budget"));
    }

    #[tokio::test]
    async fn test_memory_provider_serves_document() {
        let provider = MemoryStreamProvider::new(&b"<metalink/>"[..]);
        let source = Url::parse("https://example.com/repo.meta4").unwrap();
        let mut stream = provider.open(&source, 1024).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"<metalink/>");
    }
}
