//! Per-entry trust verification
//!
//! Trust states: UNVERIFIED (bundle carries no security metadata at all),
//! NONE (metadata exists, entry never queried), then per entry either
//! VERIFIED (digest matched, signers recorded) or INVALID (no digest
//! coverage, or bytes do not match).
//!
//! Verification runs at most once per entry name. The ledger's mutex is the
//! system's single critical section; it is never held across filesystem
//! access.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::manifest::{Manifest, SHA256_DIGEST_ATTR};
use crate::signer::{SignerId, SignerTable};

/// Trust status of one bundle entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Security metadata exists but this entry was never verified
    None,
    /// Verification ran and the entry's bytes match no recorded digest
    Invalid,
    /// The bundle carries no security metadata; verification is a no-op
    Unverified,
    /// Verification succeeded; zero or more signers recorded
    Verified,
}

/// Immutable verification record for one entry name
///
/// `signers` is `None` for invalid or unsigned entries and `Some` when the
/// entry was confirmed against named signers. Written once, never evicted.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRecord {
    pub name: String,
    pub status: Status,
    pub signers: Option<Vec<SignerId>>,
}

/// Tagged outcome of one verifier invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// No digest covers the name, or the bytes do not match the digest
    Mismatch,
    /// Digest matched; the entry's signers, if it carried any
    Verified(Option<Vec<SignerId>>),
}

/// The verifier collaborator
///
/// Given the selected manifest and the ledger's signer tables, decide whether
/// `bytes` are the entry the signing data describes. Implementations may
/// promote pending signers to established as a side effect; both tables are
/// handed over under the ledger lock.
pub trait EntryVerifier: Send + Sync {
    fn verify(
        &self,
        manifest: &Manifest,
        pending: &mut SignerTable,
        established: &mut SignerTable,
        name: &str,
        bytes: &[u8],
    ) -> VerifyOutcome;
}

/// Digest-based verifier over manifest `SHA-256-Digest` attributes
///
/// An established-table hit wins outright. Otherwise the entry's section in
/// the manifest must carry a digest; the digest is base64-decoded and
/// compared against SHA-256 of the bytes. On a match the entry's pending
/// signers move to the established table and are reported.
#[derive(Debug, Default)]
pub struct DigestVerifier;

impl EntryVerifier for DigestVerifier {
    fn verify(
        &self,
        manifest: &Manifest,
        pending: &mut SignerTable,
        established: &mut SignerTable,
        name: &str,
        bytes: &[u8],
    ) -> VerifyOutcome {
        if let Some(signers) = established.get(name) {
            return VerifyOutcome::Verified(Some(signers.clone()));
        }

        let recorded = manifest
            .attributes_for(name)
            .and_then(|attrs| attrs.get(SHA256_DIGEST_ATTR));
        let Some(recorded) = recorded else {
            return VerifyOutcome::Mismatch;
        };
        let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(recorded) else {
            return VerifyOutcome::Mismatch;
        };

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        if hasher.finalize().as_slice() != expected.as_slice() {
            return VerifyOutcome::Mismatch;
        }

        match pending.remove(name) {
            Some(signers) => {
                established.insert(name.to_string(), signers.clone());
                VerifyOutcome::Verified(Some(signers))
            }
            None => VerifyOutcome::Verified(None),
        }
    }
}

/// Pending/established signer tables plus the per-entry status cache
///
/// All three live behind one mutex. The status table is append-only: exactly
/// one write happens per entry name, and repeat queries return the cached
/// record unchanged.
#[derive(Debug, Default)]
pub struct SignerLedger {
    inner: Mutex<LedgerInner>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    pending: SignerTable,
    established: SignerTable,
    status: HashMap<String, StatusRecord>,
}

impl SignerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the pending table from scanned signature metadata
    pub fn absorb_pending(&self, table: SignerTable) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending.extend(table);
    }

    /// Record an already-confirmed signer set for `name`
    pub fn establish(&self, name: impl Into<String>, signers: Vec<SignerId>) {
        let mut inner = self.inner.lock().unwrap();
        inner.established.insert(name.into(), signers);
    }

    /// Write a status record directly, bypassing verification
    ///
    /// Used by the manifest selector to mark the manifest entry VERIFIED as
    /// soon as a signed archive root is scanned.
    pub fn record(&self, name: impl Into<String>, status: Status, signers: Option<Vec<SignerId>>) {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        inner.status.insert(
            name.clone(),
            StatusRecord {
                name,
                status,
                signers,
            },
        );
    }

    /// True iff the bundle carries any signature metadata
    pub fn has_security_data(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        !inner.pending.is_empty() || !inner.established.is_empty()
    }

    /// Cached record for `name`, if verification has run
    pub fn status_of(&self, name: &str) -> Option<StatusRecord> {
        let inner = self.inner.lock().unwrap();
        inner.status.get(name).cloned()
    }

    /// Verify `bytes` for `name`, caching the decision
    ///
    /// Returns the entry's signers (`None` for invalid or unsigned results,
    /// mirroring the cached record). Without security metadata this is a
    /// no-op returning `None` and caching nothing. The whole check-then-write
    /// sequence holds the ledger lock, so two racing callers cannot both
    /// reach the verifier for one name.
    pub fn verify_with(
        &self,
        manifest: &Manifest,
        verifier: &dyn EntryVerifier,
        name: &str,
        bytes: &[u8],
    ) -> Option<Vec<SignerId>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.is_empty() && inner.established.is_empty() {
            return None;
        }
        if let Some(record) = inner.status.get(name) {
            return record.signers.clone();
        }

        let LedgerInner {
            pending,
            established,
            status,
        } = &mut *inner;
        let (record, signers) = match verifier.verify(manifest, pending, established, name, bytes) {
            VerifyOutcome::Mismatch => (
                StatusRecord {
                    name: name.to_string(),
                    status: Status::Invalid,
                    signers: None,
                },
                None,
            ),
            VerifyOutcome::Verified(signers) => (
                StatusRecord {
                    name: name.to_string(),
                    status: Status::Verified,
                    signers: signers.clone(),
                },
                signers,
            ),
        };
        status.insert(name.to_string(), record);
        signers
    }
}
