//! sealpack - signed bundle views for dynamic loading
//!
//! This crate assembles one logical view over layered backing roots
//! (directories or archive files), selects the effective manifest with
//! later-declared roots taking precedence, resolves multi-release version
//! overlays, and verifies per-entry signature trust lazily, caching each
//! decision exactly once.
//!
//! The archive byte format, the general-purpose union filesystem, and the
//! cryptographic signature chain are collaborator boundaries: see
//! [`scan::ScanSource`], [`vfs::BundleFs`], and [`trust::EntryVerifier`].

pub mod bundle;
pub mod manifest;
pub mod overlay;
pub mod provider;
pub mod scan;
pub mod signer;
pub mod trust;
pub mod vfs;

pub use bundle::{BundleBuilder, BundleError, SecureBundle, DEFAULT_FEATURE_VERSION};
pub use manifest::{Attributes, Manifest, ManifestError, MANIFEST_PATH};
pub use overlay::{OverlayError, VersionOverlay, VERSIONS_DIR};
pub use provider::Provider;
pub use scan::{ArchiveScan, NullScanSource, ScanError, ScanSource};
pub use signer::{SignerId, SignerTable};
pub use trust::{DigestVerifier, EntryVerifier, SignerLedger, Status, StatusRecord, VerifyOutcome};
pub use vfs::{BundleFs, BundlePath, DirUnionFs, FsToken, PathFilter};
