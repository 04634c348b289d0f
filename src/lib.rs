//! Mirrorlink - streaming metalink manifest resolution
//!
//! A metalink manifest is an XML document advertising a named file behind
//! multiple mirror URLs together with its size and cryptographic digest.
//! This crate resolves such a manifest into a [`ResolvedTarget`]: a ranked
//! list of usable mirror URLs plus the size and digest any downloaded
//! payload must match. Clients that must not trust a single mirror hand the
//! target to their download machinery, which is responsible for fetching
//! the payload and verifying it.
//!
//! The manifest is parsed incrementally as it arrives from the network; the
//! document is never buffered whole. Unknown elements are skipped at any
//! nesting depth, mirror entries are filtered to http/https, and a final
//! preflight pass cross-checks the accumulated fields before a target is
//! returned.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mirrorlink::{HttpStreamProvider, MetalinkResolver};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let provider = Arc::new(HttpStreamProvider::new()?);
//! let resolver = MetalinkResolver::new(provider, "repo.bin", 256 * 1024);
//! let source = Url::parse("https://example.com/repo.meta4")?;
//! let target = resolver.resolve(&source, &CancellationToken::new()).await?;
//! for url in target.urls() {
//!     println!("mirror: {url}");
//! }
//! ```

pub mod digest;
pub mod error;
pub mod mirrors;
pub mod parser;
pub mod resolver;
pub mod stream;
mod target;

pub use digest::{validate_hex_digest, DigestAlgorithm};
pub use error::{ResolveError, ResolveResult};
pub use mirrors::MirrorList;
pub use parser::ParseRequest;
pub use resolver::MetalinkResolver;
pub use stream::{HttpStreamProvider, ManifestStream, ManifestStreamProvider, MemoryStreamProvider};
pub use target::ResolvedTarget;
