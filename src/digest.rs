//! Digest algorithm identification and hex-digest validation.
//!
//! A manifest advertises the expected payload digest as lowercase hex text
//! inside a `<hash name="...">` element. Only sha256 and sha512 are
//! accepted; everything else is treated as unrecognized and ignored by the
//! parser. Actual digest computation over downloaded bytes belongs to the
//! fetch side, not here.

/// Supported digest algorithms for payload verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Parse a `<hash name="...">` attribute value.
    ///
    /// Returns `None` for unrecognized algorithms (md5, sha1, ...), which
    /// the parser skips without failing.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(DigestAlgorithm::Sha256),
            "sha512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Expected length of the lowercase hex digest string.
    pub fn hex_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha512 => 128,
        }
    }

    /// Canonical algorithm name as it appears in manifests.
    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a hex digest string against an expected length.
///
/// Accepts exactly `expected_len` characters, all of them lowercase
/// hexadecimal. Uppercase hex is rejected: manifests carry digests in
/// canonical lowercase and the downloaded-payload comparison is exact.
pub fn validate_hex_digest(value: &str, expected_len: usize) -> bool {
    value.len() == expected_len
        && value
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
