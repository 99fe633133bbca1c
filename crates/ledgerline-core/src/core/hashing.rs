// ledgerline-core/src/core/hashing.rs
// ============================================================================
// Module: Ledgerline Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content fingerprints.
// Purpose: Provide the deterministic encoding and keys used by the content store.
// Dependencies: base64, serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Structured payloads are canonicalized with RFC 8785 (JCS): object keys are
//! sorted, whitespace is fixed, and numbers use the shortest round-trip form.
//! The content fingerprint is the SHA-256 digest of those canonical bytes, so
//! logically identical payloads always share one content-store entry.
//!
//! Fingerprints are also accepted as opaque caller-supplied pointers, so the
//! type itself carries arbitrary non-empty bytes; only computed fingerprints
//! are guaranteed to be [`FINGERPRINT_LEN`] bytes long.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for content fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing.
    Sha256,
}

/// Default hash algorithm for content fingerprints.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Length in bytes of a computed fingerprint.
pub const FINGERPRINT_LEN: usize = 32;

/// Maximum length in bytes of a caller-supplied pointer.
pub const MAX_POINTER_BYTES: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical encodings or parsing fingerprints.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// Fingerprint text was not valid base64.
    #[error("invalid fingerprint encoding: {0}")]
    Encoding(String),
}

// ============================================================================
// SECTION: Fingerprint
// ============================================================================

/// Content-store key.
///
/// # Invariants
/// - Serialized form is standard base64 of the raw bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// Wraps raw fingerprint or pointer bytes.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the fingerprint, returning its raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the standard base64 rendering used at API boundaries.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Parses a base64 rendering.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Encoding`] when the text is not valid base64.
    pub fn from_base64(text: &str) -> Result<Self, HashError> {
        BASE64.decode(text).map(Self).map_err(|err| HashError::Encoding(err.to_string()))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fingerprint").field(&self.to_base64()).finish()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Fingerprints raw bytes using the provided algorithm.
#[must_use]
pub fn fingerprint_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> Fingerprint {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            Fingerprint(hasher.finalize().to_vec())
        }
    }
}

/// Canonicalizes a value and fingerprints the result.
///
/// Returns both the canonical bytes (the content-store value) and their
/// fingerprint (the content-store key).
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn encode_canonical<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<(Vec<u8>, Fingerprint), HashError> {
    let bytes = canonical_json_bytes(value)?;
    let fingerprint = fingerprint_bytes(algorithm, &bytes);
    Ok((bytes, fingerprint))
}
