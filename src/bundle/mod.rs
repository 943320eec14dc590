//! The bundle facade
//!
//! [`SecureBundle`] composes the manifest selector, the version overlay
//! resolver, the signer ledger, and the filesystem collaborator into the
//! object a dynamic loader consumes. Construction runs to completion before
//! the bundle is usable; afterwards only the ledger mutates.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::manifest::{Attributes, Manifest, MANIFEST_PATH};
use crate::overlay::{OverlayError, VersionOverlay};
use crate::provider::{Provider, SERVICES_DIR};
use crate::scan::{select_manifest, NullScanSource, ScanError, ScanSource};
use crate::signer::SignerId;
use crate::trust::{DigestVerifier, EntryVerifier, SignerLedger, Status};
use crate::vfs::{normalize, BundleFs, BundlePath, DirUnionFs, PathFilter};

/// Feature version assumed when the builder is not told otherwise
pub const DEFAULT_FEATURE_VERSION: u32 = 21;

/// Errors from bundle construction and path-based queries
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error("path belongs to a different bundle filesystem")]
    ForeignPath,
}

/// Builder assembling a bundle in two stages: content first, then metadata
/// and trust derivation
pub struct BundleBuilder {
    roots: Vec<PathBuf>,
    path_filter: Option<PathFilter>,
    feature_version: u32,
    default_manifest: Manifest,
    scan_source: Box<dyn ScanSource>,
    verifier: Box<dyn EntryVerifier>,
    fs: Option<Arc<dyn BundleFs>>,
    name: Option<String>,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            path_filter: None,
            feature_version: DEFAULT_FEATURE_VERSION,
            default_manifest: Manifest::new(),
            scan_source: Box::new(NullScanSource),
            verifier: Box::new(DigestVerifier),
            fs: None,
            name: None,
        }
    }

    /// Add one backing root; declaration order decides precedence
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(path.into());
        self
    }

    /// Add backing roots in declaration order
    pub fn roots<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Path-inclusion filter applied by the merged view
    pub fn path_filter(mut self, filter: PathFilter) -> Self {
        self.path_filter = Some(filter);
        self
    }

    /// Feature version bounding applicable overlays
    pub fn feature_version(mut self, version: u32) -> Self {
        self.feature_version = version;
        self
    }

    /// Manifest used when no root carries one
    pub fn default_manifest(mut self, manifest: Manifest) -> Self {
        self.default_manifest = manifest;
        self
    }

    /// Archive-stream collaborator for archive-file roots
    pub fn scan_source(mut self, source: Box<dyn ScanSource>) -> Self {
        self.scan_source = source;
        self
    }

    /// Verifier collaborator deciding per-entry trust
    pub fn verifier(mut self, verifier: Box<dyn EntryVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replace the merged filesystem view (directory union by default)
    pub fn fs(mut self, fs: Arc<dyn BundleFs>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Bundle name; defaults to the primary root's file stem
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Assemble the bundle
    ///
    /// Order: merged view → manifest selection (seeding the ledger) →
    /// overlay resolution (multi-release only) → package and provider
    /// enumeration. Any root I/O failure here is fatal.
    pub fn build(self) -> Result<SecureBundle, BundleError> {
        let fs: Arc<dyn BundleFs> = match self.fs {
            Some(fs) => fs,
            None => {
                let mut union = DirUnionFs::new(self.roots.clone());
                if let Some(filter) = self.path_filter.clone() {
                    union = union.with_filter(filter);
                }
                Arc::new(union)
            }
        };

        let ledger = SignerLedger::new();
        let manifest = select_manifest(&self.roots, self.scan_source.as_ref(), &ledger)?
            .unwrap_or(self.default_manifest);

        let overlay = if manifest.is_multi_release() {
            VersionOverlay::resolve(fs.as_ref(), self.feature_version)?
        } else {
            VersionOverlay::empty()
        };

        let packages = scan_packages(fs.as_ref())?;
        let providers = scan_providers(fs.as_ref())?;

        let name = self.name.unwrap_or_else(|| {
            fs.primary_root()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Ok(SecureBundle {
            name,
            manifest,
            overlay,
            ledger,
            verifier: self.verifier,
            fs,
            packages,
            providers,
        })
    }
}

/// One logical bundle view over layered backing roots
pub struct SecureBundle {
    name: String,
    manifest: Manifest,
    overlay: VersionOverlay,
    ledger: SignerLedger,
    verifier: Box<dyn EntryVerifier>,
    fs: Arc<dyn BundleFs>,
    packages: BTreeSet<String>,
    providers: Vec<Provider>,
}

impl SecureBundle {
    /// Build a bundle over directory roots with default collaborators
    pub fn from_roots<I, P>(roots: I) -> Result<Self, BundleError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        BundleBuilder::new().roots(roots).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first declared root, for reporting
    pub fn primary_root(&self) -> &Path {
        self.fs.primary_root()
    }

    /// The selected manifest
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The resolved version overlay
    pub fn overlay(&self) -> &VersionOverlay {
        &self.overlay
    }

    /// Mint a path bound to this bundle's filesystem view
    pub fn path(&self, rel: impl AsRef<str>) -> BundlePath {
        BundlePath::new(self.fs.token(), rel.as_ref())
    }

    /// The root of this bundle's merged view, as a bound path
    pub fn root_path(&self) -> BundlePath {
        BundlePath::new(self.fs.token(), "")
    }

    /// Locate an entry, honoring the version overlay
    ///
    /// A canonical path present in the overlay resolves to the versioned
    /// copy even when the root-level copy also exists.
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        self.fs.resolve(&self.effective_path(name))
    }

    /// Bytes of an entry, honoring the version overlay
    pub fn open(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        let rel = self.effective_path(name);
        if !self.fs.exists(&rel) {
            return Ok(None);
        }
        self.fs.read(&rel).map(Some)
    }

    /// Verify the entry at `path` and report its trust status
    ///
    /// Bytes are read before the ledger lock is taken; I/O failures are
    /// fatal and propagate. Paths minted by another bundle are rejected.
    pub fn verify_path(&self, path: &BundlePath) -> Result<Status, BundleError> {
        if path.token() != self.fs.token() {
            return Err(BundleError::ForeignPath);
        }
        let name = path.as_str();
        if self.ledger.status_of(name).is_some() {
            return Ok(self.file_status(name));
        }
        let bytes = self.fs.read(name)?;
        self.verify_entry(name, &bytes);
        Ok(self.file_status(name))
    }

    /// Verify raw bytes for an entry name and return its signers
    ///
    /// The loader-facing primitive: `None` when the bundle has no security
    /// data, when the entry is invalid, or when it verified unsigned.
    pub fn verify_entry(&self, name: &str, bytes: &[u8]) -> Option<Vec<SignerId>> {
        self.ledger
            .verify_with(&self.manifest, self.verifier.as_ref(), name, bytes)
    }

    /// Current trust status of an entry, without verifying
    pub fn file_status(&self, name: &str) -> Status {
        if !self.ledger.has_security_data() {
            return Status::Unverified;
        }
        self.ledger
            .status_of(name)
            .map(|record| record.status)
            .unwrap_or(Status::None)
    }

    /// Signers of the manifest itself, if it is signed
    pub fn manifest_signers(&self) -> Option<Vec<SignerId>> {
        self.ledger
            .status_of(MANIFEST_PATH)
            .and_then(|record| record.signers)
    }

    /// The manifest's attribute block for `name`, only if it can be trusted
    ///
    /// Trusted means the entry's recorded signer set matches the manifest's
    /// own signer set in size; an unsigned manifest trusts unconditionally.
    pub fn trusted_attributes(&self, name: &str) -> Option<&Attributes> {
        let entry_signers = self
            .ledger
            .status_of(name)
            .and_then(|record| record.signers)
            .unwrap_or_default();
        match self.manifest_signers() {
            Some(manifest_signers) if manifest_signers.len() != entry_signers.len() => None,
            _ => self.manifest.attributes_for(name),
        }
    }

    /// Whether any signature metadata exists for this bundle
    pub fn has_security_data(&self) -> bool {
        self.ledger.has_security_data()
    }

    /// Dot-joined packages of `.class` files outside `META-INF`
    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    /// Declared service providers
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    fn effective_path(&self, name: &str) -> String {
        let canonical = normalize(name);
        self.overlay.redirect(&canonical).unwrap_or(canonical)
    }
}

impl std::fmt::Debug for SecureBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureBundle")
            .field("name", &self.name)
            .field("primary_root", &self.primary_root())
            .field("overlays", &self.overlay.len())
            .field("packages", &self.packages.len())
            .finish()
    }
}

fn scan_packages(fs: &dyn BundleFs) -> Result<BTreeSet<String>, BundleError> {
    let mut packages = BTreeSet::new();
    for rel in fs.walk("")? {
        if rel.starts_with("META-INF/") || !rel.ends_with(".class") {
            continue;
        }
        if let Some((parent, _)) = rel.rsplit_once('/') {
            packages.insert(parent.replace('/', "."));
        }
    }
    Ok(packages)
}

fn scan_providers(fs: &dyn BundleFs) -> Result<Vec<Provider>, BundleError> {
    if !fs.exists(SERVICES_DIR) {
        return Ok(Vec::new());
    }
    let mut providers = Vec::new();
    for rel in fs.walk(SERVICES_DIR)? {
        let service = rel.rsplit_once('/').map(|(_, s)| s).unwrap_or(&rel);
        let contents = fs.read(&rel)?;
        let contents = String::from_utf8_lossy(&contents);
        providers.push(Provider::from_lines(service, &contents, fs.filter()));
    }
    Ok(providers)
}
