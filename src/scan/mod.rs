//! Manifest selection across backing roots
//!
//! Roots are scanned in reverse declaration order so that later-declared
//! roots override earlier ones, matching the shadowing the merged filesystem
//! view applies. The first root to yield a manifest wins; signature metadata
//! found along the way seeds the signer ledger even when the scan continues.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::{Manifest, ManifestError, MANIFEST_PATH};
use crate::signer::SignerTable;
use crate::trust::{SignerLedger, Status};

/// Errors from scanning backing roots
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("i/o error reading root {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed manifest in root {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },
}

/// Explicit output of streaming one archive-file root
///
/// An archive reader reports everything the selector needs as plain data:
/// whether signature-bearing entries exist, the signer tables it
/// accumulated, and the manifest it parsed, if any.
#[derive(Debug, Default)]
pub struct ArchiveScan {
    /// Whether the archive carries any entries left to verify
    pub has_signers: bool,
    /// Signers announced by signature metadata, keyed by entry name
    pub pending: SignerTable,
    /// Signers already confirmed during the scan, keyed by entry name
    pub established: SignerTable,
    /// The archive's manifest, if it carried one
    pub manifest: Option<Manifest>,
}

/// The archive-stream collaborator for archive-file roots
pub trait ScanSource: Send + Sync {
    fn scan(&self, path: &Path) -> Result<ArchiveScan, ScanError>;
}

/// Scan source for deployments without archive-file roots
///
/// Reports every archive root as empty: no manifest, no signers.
#[derive(Debug, Default)]
pub struct NullScanSource;

impl ScanSource for NullScanSource {
    fn scan(&self, _path: &Path) -> Result<ArchiveScan, ScanError> {
        Ok(ArchiveScan::default())
    }
}

/// Select the effective manifest and seed the ledger with signer data
///
/// Directory roots are checked for a manifest file directly; archive-file
/// roots go through the scan source. Scanning stops at the first root that
/// yields a manifest. Returns `None` when no root carries one; the caller
/// substitutes its default.
pub fn select_manifest(
    roots: &[PathBuf],
    source: &dyn ScanSource,
    ledger: &SignerLedger,
) -> Result<Option<Manifest>, ScanError> {
    for root in roots.iter().rev() {
        if root.is_dir() {
            let manifest_file = root.join(MANIFEST_PATH);
            if manifest_file.exists() {
                let text = fs::read_to_string(&manifest_file).map_err(|source| ScanError::Io {
                    path: root.clone(),
                    source,
                })?;
                let manifest = Manifest::parse(&text).map_err(|source| ScanError::Manifest {
                    path: root.clone(),
                    source,
                })?;
                return Ok(Some(manifest));
            }
        } else {
            let scan = source.scan(root)?;
            if scan.has_signers {
                let manifest_signers = scan.established.get(MANIFEST_PATH).cloned();
                ledger.absorb_pending(scan.pending);
                if let Some(signers) = manifest_signers {
                    ledger.establish(MANIFEST_PATH, signers.clone());
                    // The manifest entry itself carries the signature block;
                    // it is trusted as soon as the scan confirms it
                    ledger.record(MANIFEST_PATH, Status::Verified, Some(signers));
                }
            }
            if scan.manifest.is_some() {
                return Ok(scan.manifest);
            }
        }
    }
    Ok(None)
}
