//! Blocking adapter over the asynchronous resolver.

use tokio_util::sync::CancellationToken;
use url::Url;

use super::MetalinkResolver;
use crate::error::{ResolveError, ResolveResult};
use crate::target::ResolvedTarget;

impl MetalinkResolver {
    /// Resolve the manifest at `source`, blocking the calling thread.
    ///
    /// Drives a private, call-local current-thread runtime until the
    /// asynchronous resolution completes; cancellation is observed the same
    /// way as in [`resolve`](MetalinkResolver::resolve). Must not be called
    /// from within an asynchronous context.
    pub fn resolve_blocking(
        &self,
        source: &Url,
        cancel: &CancellationToken,
    ) -> ResolveResult<ResolvedTarget> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ResolveError::Runtime(format!("failed to create runtime: {}", e)))?;
        runtime.block_on(self.resolve(source, cancel))
    }
}
