//! Manifest parser state machine.
//!
//! [`ParseRequest`] consumes start-element / end-element / text events for
//! one metalink document and accumulates the requested file's size, digest
//! and mirror URLs. It holds no parse tree: nested unknown elements are
//! skipped with a depth counter plus a saved return state (passthrough),
//! and the grammar is enforced purely by the current state.
//!
//! The event source is the streaming resolver, which drives a quick-xml
//! tokenizer over the manifest byte stream; the per-event interface is kept
//! scanner-agnostic so the machine can be exercised directly in tests.
//!
//! Once the document is exhausted, [`ParseRequest::finish`] runs the
//! preflight cross-field validation and produces the [`ResolvedTarget`].

use tracing::debug;

use crate::digest::{validate_hex_digest, DigestAlgorithm};
use crate::error::{ResolveError, ResolveResult};
use crate::mirrors::MirrorList;
use crate::target::ResolvedTarget;

/// Parser states, one per recognized element nesting level.
///
/// `Passthrough` is the skip mode for unrecognized subtrees; every other
/// state corresponds to being inside one recognized element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Initial,
    Metalink,
    Files,
    File,
    Size,
    Verification,
    Hash,
    Resources,
    Url,
    Passthrough,
}

/// Accumulated parse state for one manifest resolution attempt.
///
/// Owned exclusively by the resolution attempt that created it and dropped
/// when the attempt completes or is cancelled.
#[derive(Debug)]
pub struct ParseRequest {
    requested_file: String,

    state: ParseState,
    /// Nested unknown elements currently being skipped. Nonzero only while
    /// `state == Passthrough`.
    passthrough_depth: u32,
    /// State to resume when passthrough unwinds to depth zero.
    passthrough_return: ParseState,

    found_any_file: bool,
    found_requested_file: bool,
    /// Set when the matching `<file>` subtree closes; remaining `<file>`
    /// elements are then skipped wholesale.
    requested_file_complete: bool,

    /// Declared payload size; 0 means "not yet seen".
    declared_size: u64,
    /// True once any `<hash>` with a recognized algorithm was seen.
    digest_kind_known: bool,
    /// Algorithm of the currently open `<hash>` element, if recognized.
    active_algorithm: Option<DigestAlgorithm>,
    /// Protocol of the currently open `<url>` element.
    active_url_protocol: Option<String>,

    /// Text fragments of the currently open size/hash/url element. Only one
    /// text-bearing element can be open at a time, so a single buffer
    /// suffices; committed when the element closes.
    text_buf: String,

    sha256: Option<String>,
    sha512: Option<String>,
    mirrors: MirrorList,
}

impl ParseRequest {
    /// Create parse state for resolving `requested_file`.
    pub fn new(requested_file: impl Into<String>) -> Self {
        Self {
            requested_file: requested_file.into(),
            state: ParseState::Initial,
            passthrough_depth: 0,
            passthrough_return: ParseState::Initial,
            found_any_file: false,
            found_requested_file: false,
            requested_file_complete: false,
            declared_size: 0,
            digest_kind_known: false,
            active_algorithm: None,
            active_url_protocol: None,
            text_buf: String::new(),
            sha256: None,
            sha512: None,
            mirrors: MirrorList::new(),
        }
    }

    fn transition(&mut self, next: ParseState) {
        // Self-transitions are a programming error in the dispatch below.
        debug_assert_ne!(self.state, next);
        self.state = next;
    }

    fn enter_passthrough(&mut self) {
        debug_assert_ne!(self.state, ParseState::Passthrough);
        debug_assert_eq!(self.passthrough_depth, 0);
        self.passthrough_return = self.state;
        self.transition(ParseState::Passthrough);
    }

    /// Dispatch a start-of-element event.
    pub fn start_element(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
    ) -> ResolveResult<()> {
        match self.state {
            ParseState::Initial => {
                if name == "metalink" {
                    self.transition(ParseState::Metalink);
                } else {
                    // Unknown root is tolerated; preflight reports the
                    // missing file entry.
                    self.enter_passthrough();
                }
            }
            ParseState::Metalink => {
                if name == "files" {
                    self.transition(ParseState::Files);
                } else {
                    self.enter_passthrough();
                }
            }
            ParseState::Files => {
                if self.requested_file_complete {
                    // The requested file is fully resolved; ignore the rest.
                    self.enter_passthrough();
                } else if name == "file" {
                    let file_name = required_attribute(name, attributes, "name")?;
                    self.found_any_file = true;
                    if file_name == self.requested_file {
                        self.found_requested_file = true;
                        self.transition(ParseState::File);
                    } else {
                        debug!(file = %file_name, "skipping non-matching file entry");
                        self.enter_passthrough();
                    }
                } else {
                    self.enter_passthrough();
                }
            }
            ParseState::File => match name {
                "size" => {
                    self.text_buf.clear();
                    self.transition(ParseState::Size);
                }
                "verification" => self.transition(ParseState::Verification),
                "resources" => self.transition(ParseState::Resources),
                _ => self.enter_passthrough(),
            },
            ParseState::Size => self.enter_passthrough(),
            ParseState::Verification => {
                if name == "hash" {
                    let algorithm = required_attribute(name, attributes, "name")?;
                    self.active_algorithm = DigestAlgorithm::from_name(&algorithm);
                    if self.active_algorithm.is_some() {
                        self.digest_kind_known = true;
                    } else {
                        debug!(%algorithm, "ignoring hash with unrecognized algorithm");
                    }
                    self.text_buf.clear();
                    self.transition(ParseState::Hash);
                } else {
                    self.enter_passthrough();
                }
            }
            ParseState::Hash => self.enter_passthrough(),
            ParseState::Resources => {
                // By the time mirrors appear, size and digest kind must be
                // settled; later elements cannot repair a missing size.
                if self.declared_size == 0 {
                    return Err(ResolveError::ManifestInvalid(
                        "missing or zero size".to_string(),
                    ));
                }
                if !self.digest_kind_known {
                    return Err(ResolveError::ManifestInvalid(
                        "missing recognized digest".to_string(),
                    ));
                }
                if name == "url" {
                    let protocol = required_attribute(name, attributes, "protocol")?;
                    if protocol == "http" || protocol == "https" {
                        self.active_url_protocol = Some(protocol);
                        self.text_buf.clear();
                        self.transition(ParseState::Url);
                    } else {
                        debug!(%protocol, "skipping mirror with unsupported protocol");
                        self.enter_passthrough();
                    }
                } else {
                    self.enter_passthrough();
                }
            }
            ParseState::Url => self.enter_passthrough(),
            ParseState::Passthrough => self.passthrough_depth += 1,
        }
        Ok(())
    }

    /// Dispatch an end-of-element event, popping to the parent state.
    pub fn end_element(&mut self) {
        match self.state {
            ParseState::Passthrough => {
                if self.passthrough_depth > 0 {
                    self.passthrough_depth -= 1;
                } else {
                    self.state = self.passthrough_return;
                }
            }
            ParseState::Size => {
                // strtoull semantics: unparseable text counts as zero and
                // is rejected by the resources precondition.
                self.declared_size = self.text_buf.trim().parse().unwrap_or(0);
                self.text_buf.clear();
                self.transition(ParseState::File);
            }
            ParseState::Hash => {
                if let Some(algorithm) = self.active_algorithm.take() {
                    let value = std::mem::take(&mut self.text_buf);
                    let slot = match algorithm {
                        DigestAlgorithm::Sha256 => &mut self.sha256,
                        DigestAlgorithm::Sha512 => &mut self.sha512,
                    };
                    // First occurrence wins; later hashes for the same
                    // algorithm are ignored.
                    if slot.is_none() {
                        *slot = Some(value.trim().to_string());
                    }
                }
                self.text_buf.clear();
                self.transition(ParseState::Verification);
            }
            ParseState::Url => {
                let protocol = self.active_url_protocol.take().unwrap_or_default();
                let text = std::mem::take(&mut self.text_buf);
                self.mirrors.offer(&protocol, text.trim());
                self.transition(ParseState::Resources);
            }
            ParseState::Verification | ParseState::Resources => {
                self.transition(ParseState::File);
            }
            ParseState::File => {
                self.requested_file_complete = true;
                self.transition(ParseState::Files);
            }
            ParseState::Files => self.transition(ParseState::Metalink),
            ParseState::Metalink => self.transition(ParseState::Initial),
            // The scanner guarantees balanced elements; an end event in
            // Initial cannot occur.
            ParseState::Initial => {}
        }
    }

    /// Dispatch a text event. Fragments accumulate and are committed when
    /// the enclosing element closes.
    pub fn text(&mut self, text: &str) {
        match self.state {
            ParseState::Size | ParseState::Url => self.text_buf.push_str(text),
            ParseState::Hash if self.active_algorithm.is_some() => self.text_buf.push_str(text),
            _ => {}
        }
    }

    /// Preflight validation, run once at end-of-document.
    ///
    /// Cross-checks the accumulated fields in order, short-circuiting on
    /// the first failure, and constructs the [`ResolvedTarget`].
    pub fn finish(self) -> ResolveResult<ResolvedTarget> {
        if !self.found_any_file {
            return Err(ResolveError::ManifestInvalid(
                "no file entry found".to_string(),
            ));
        }
        if !self.found_requested_file {
            return Err(ResolveError::ManifestInvalid(format!(
                "requested file not present: {}",
                self.requested_file
            )));
        }
        if self.sha256.is_none() && self.sha512.is_none() {
            return Err(ResolveError::ManifestInvalid(
                "no digest found".to_string(),
            ));
        }
        if let Some(ref digest) = self.sha256 {
            if !validate_hex_digest(digest, DigestAlgorithm::Sha256.hex_len()) {
                return Err(ResolveError::ManifestInvalid(
                    "malformed sha256 digest".to_string(),
                ));
            }
        }
        if let Some(ref digest) = self.sha512 {
            if !validate_hex_digest(digest, DigestAlgorithm::Sha512.hex_len()) {
                return Err(ResolveError::ManifestInvalid(
                    "malformed sha512 digest".to_string(),
                ));
            }
        }
        if self.mirrors.is_empty() {
            return Err(ResolveError::ManifestInvalid(
                "no usable mirror URL found".to_string(),
            ));
        }

        debug!(
            file = %self.requested_file,
            size = self.declared_size,
            mirrors = self.mirrors.len(),
            "manifest resolved"
        );
        Ok(ResolvedTarget::new(
            self.mirrors.into_urls(),
            self.declared_size,
            self.sha256,
            self.sha512,
        ))
    }
}

fn required_attribute(
    element: &str,
    attributes: &[(String, String)],
    key: &str,
) -> ResolveResult<String> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| {
            ResolveError::ManifestMalformed(format!(
                "element <{}> is missing required attribute '{}'",
                element, key
            ))
        })
}
