//! Signer identities
//!
//! A signer is an opaque, comparable identity recorded for a bundle entry.
//! Identities are carried as hex SHA-256 fingerprints, typically derived
//! from the signer's certificate bytes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque identity of one signer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerId(String);

impl SignerId {
    /// Wrap an already-computed fingerprint
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self(fingerprint.into())
    }

    /// Derive an identity from raw certificate bytes
    pub fn from_cert_der(der: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(der);
        Self(hex::encode(hasher.finalize()))
    }

    /// The hex fingerprint backing this identity
    pub fn fingerprint(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entry name → signer set
///
/// Two of these exist per bundle: the *pending* table (signers announced by
/// signature metadata, not yet reconciled against manifest digests) and the
/// *established* table (signers already confirmed).
pub type SignerTable = HashMap<String, Vec<SignerId>>;
