//! Integration tests: layered roots, manifest selection, version overlays
//!
//! Exercises the merged view end to end: root precedence, default-manifest
//! fallback, multi-release overlay selection at different feature versions,
//! and the find_file redirect.

use std::fs;

use tempfile::TempDir;

use sealpack::{BundleBuilder, BundleError, OverlayError, ScanError, SecureBundle};

fn root_with(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, contents) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }
    dir
}

// === Manifest selection ===

#[test]
fn test_last_declared_root_supplies_manifest() {
    let a = root_with(&[("META-INF/MANIFEST.MF", "Bundle-Label: a\n")]);
    let b = root_with(&[("META-INF/MANIFEST.MF", "Bundle-Label: b\n")]);
    let c = root_with(&[("META-INF/MANIFEST.MF", "Bundle-Label: c\n")]);

    let bundle = SecureBundle::from_roots([a.path(), b.path(), c.path()]).unwrap();
    assert_eq!(
        bundle.manifest().main_attributes().get("Bundle-Label"),
        Some("c")
    );
}

#[test]
fn test_manifestless_later_root_defers_to_earlier() {
    let a = root_with(&[("META-INF/MANIFEST.MF", "Bundle-Label: a\n")]);
    let b = root_with(&[("pkg/B.class", "b")]);

    let bundle = SecureBundle::from_roots([a.path(), b.path()]).unwrap();
    assert_eq!(
        bundle.manifest().main_attributes().get("Bundle-Label"),
        Some("a")
    );
}

#[test]
fn test_malformed_manifest_aborts_construction() {
    let bad = root_with(&[("META-INF/MANIFEST.MF", "no colon here\n")]);
    assert!(matches!(
        SecureBundle::from_roots([bad.path()]),
        Err(BundleError::Scan(ScanError::Manifest { .. }))
    ));
}

// === Union shadowing ===

#[test]
fn test_later_root_shadows_entry_content() {
    let a = root_with(&[("shared.txt", "from a"), ("only-a.txt", "a")]);
    let b = root_with(&[("shared.txt", "from b")]);

    let bundle = SecureBundle::from_roots([a.path(), b.path()]).unwrap();
    assert_eq!(bundle.open("shared.txt").unwrap().unwrap(), b"from b");
    assert_eq!(bundle.open("only-a.txt").unwrap().unwrap(), b"a");
    assert_eq!(bundle.primary_root(), a.path());
}

// === Version overlays ===

fn multi_release_root() -> TempDir {
    root_with(&[
        ("META-INF/MANIFEST.MF", "Multi-Release: true\n"),
        ("pkg/A.class", "root copy"),
        ("META-INF/versions/9/pkg/A.class", "v9 copy"),
        ("META-INF/versions/17/pkg/A.class", "v17 copy"),
    ])
}

#[test]
fn test_overlay_excludes_current_feature_version() {
    let dir = multi_release_root();
    let bundle = BundleBuilder::new()
        .root(dir.path())
        .feature_version(17)
        .build()
        .unwrap();

    // 17 is not strictly older than 17, so the 9 overlay applies
    assert_eq!(bundle.overlay().get("pkg/A.class"), Some(9));
    assert_eq!(bundle.open("pkg/A.class").unwrap().unwrap(), b"v9 copy");
}

#[test]
fn test_overlay_picks_newest_applicable_version() {
    let dir = multi_release_root();
    let bundle = BundleBuilder::new()
        .root(dir.path())
        .feature_version(21)
        .build()
        .unwrap();

    assert_eq!(bundle.overlay().get("pkg/A.class"), Some(17));
    assert_eq!(bundle.open("pkg/A.class").unwrap().unwrap(), b"v17 copy");
}

#[test]
fn test_find_file_prefers_versioned_copy() {
    let dir = multi_release_root();
    let bundle = BundleBuilder::new()
        .root(dir.path())
        .feature_version(21)
        .build()
        .unwrap();

    // Both copies exist on disk; the overlaid path must win
    let found = bundle.find_file("pkg/A.class").unwrap();
    assert_eq!(
        found,
        dir.path().join("META-INF/versions/17/pkg/A.class")
    );
    assert!(found.exists());
}

#[test]
fn test_non_overlaid_path_resolves_at_root() {
    let dir = root_with(&[
        ("META-INF/MANIFEST.MF", "Multi-Release: true\n"),
        ("META-INF/versions/9/pkg/A.class", "v9"),
        ("pkg/B.class", "plain"),
    ]);
    let bundle = BundleBuilder::new()
        .root(dir.path())
        .feature_version(17)
        .build()
        .unwrap();

    assert_eq!(
        bundle.find_file("pkg/B.class").unwrap(),
        dir.path().join("pkg/B.class")
    );
    assert!(bundle.find_file("pkg/Missing.class").is_none());
}

#[test]
fn test_plain_bundle_ignores_version_directories() {
    // No Multi-Release attribute: the versions directory is inert content
    let dir = root_with(&[
        ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
        ("pkg/A.class", "root copy"),
        ("META-INF/versions/9/pkg/A.class", "v9 copy"),
    ]);
    let bundle = SecureBundle::from_roots([dir.path()]).unwrap();

    assert!(bundle.overlay().is_empty());
    assert_eq!(bundle.open("pkg/A.class").unwrap().unwrap(), b"root copy");
}

#[test]
fn test_non_numeric_version_directory_aborts_construction() {
    let dir = root_with(&[
        ("META-INF/MANIFEST.MF", "Multi-Release: true\n"),
        ("META-INF/versions/current/pkg/A.class", "v?"),
    ]);
    assert!(matches!(
        SecureBundle::from_roots([dir.path()]),
        Err(BundleError::Overlay(
            OverlayError::BadVersionDirectory { name }
        )) if name == "current"
    ));
}

#[test]
fn test_multi_release_without_versions_directory_aborts() {
    let dir = root_with(&[("META-INF/MANIFEST.MF", "Multi-Release: true\n")]);
    assert!(matches!(
        SecureBundle::from_roots([dir.path()]),
        Err(BundleError::Overlay(OverlayError::Io(_)))
    ));
}

#[test]
fn test_overlays_combine_across_roots() {
    let base = root_with(&[
        ("META-INF/MANIFEST.MF", "Multi-Release: true\n"),
        ("META-INF/versions/9/pkg/A.class", "base v9"),
    ]);
    let patch = root_with(&[("META-INF/versions/11/pkg/A.class", "patch v11")]);

    let bundle = BundleBuilder::new()
        .roots([base.path(), patch.path()])
        .feature_version(17)
        .build()
        .unwrap();

    assert_eq!(bundle.overlay().get("pkg/A.class"), Some(11));
    assert_eq!(bundle.open("pkg/A.class").unwrap().unwrap(), b"patch v11");
}
