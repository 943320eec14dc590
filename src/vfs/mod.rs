//! Filesystem collaborator boundary
//!
//! A bundle consumes one merged view over its backing roots through the
//! [`BundleFs`] trait. The general-purpose union filesystem lives outside
//! this crate; [`DirUnionFs`] here is the minimal union over directory roots
//! that directory-only deployments and the test suite run on.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

/// Path-inclusion filter over bundle-relative paths
pub type PathFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Identity of one filesystem instance
///
/// Paths minted by a bundle are stamped with its filesystem token; handing a
/// path to a bundle with a different token is a caller error and is rejected
/// synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FsToken(u64);

impl FsToken {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A relative path bound to the filesystem instance that minted it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundlePath {
    token: FsToken,
    rel: String,
}

impl BundlePath {
    pub(crate) fn new(token: FsToken, rel: impl Into<String>) -> Self {
        Self {
            token,
            rel: normalize(&rel.into()),
        }
    }

    pub fn token(&self) -> FsToken {
        self.token
    }

    /// The bundle-relative path, `/`-separated
    pub fn as_str(&self) -> &str {
        &self.rel
    }
}

/// Merged read-only view over the backing roots
pub trait BundleFs: Send + Sync {
    /// Identity of this filesystem instance
    fn token(&self) -> FsToken;

    /// The first declared root, used for reporting
    fn primary_root(&self) -> &Path;

    /// Whether `rel` names an existing entry in the merged view
    fn exists(&self, rel: &str) -> bool;

    /// Existence-checked backing location for `rel`
    fn resolve(&self, rel: &str) -> Option<PathBuf>;

    /// Bytes of the entry at `rel`
    fn read(&self, rel: &str) -> io::Result<Vec<u8>>;

    /// Relative paths of every regular file beneath `rel`, sorted
    ///
    /// Fails if `rel` does not exist in the merged view.
    fn walk(&self, rel: &str) -> io::Result<Vec<String>>;

    /// The path-inclusion filter this view was built with, if any
    fn filter(&self) -> Option<&PathFilter>;
}

/// Union over N directory roots
///
/// Later-declared roots shadow earlier ones, matching manifest-selection
/// precedence. The path filter hides entries from every operation.
pub struct DirUnionFs {
    token: FsToken,
    roots: Vec<PathBuf>,
    filter: Option<PathFilter>,
}

impl DirUnionFs {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            token: FsToken::next(),
            roots,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn included(&self, rel: &str) -> bool {
        self.filter.as_ref().map(|f| f(rel)).unwrap_or(true)
    }

    /// Roots in shadowing order: last declared first
    fn lookup_order(&self) -> impl Iterator<Item = &PathBuf> {
        self.roots.iter().rev()
    }
}

impl BundleFs for DirUnionFs {
    fn token(&self) -> FsToken {
        self.token
    }

    fn primary_root(&self) -> &Path {
        self.roots.first().map(PathBuf::as_path).unwrap_or(Path::new(""))
    }

    fn exists(&self, rel: &str) -> bool {
        self.resolve(rel).is_some()
    }

    fn resolve(&self, rel: &str) -> Option<PathBuf> {
        let rel = normalize(rel);
        if !self.included(&rel) {
            return None;
        }
        self.lookup_order()
            .map(|root| root.join(&rel))
            .find(|p| p.exists())
    }

    fn read(&self, rel: &str) -> io::Result<Vec<u8>> {
        match self.resolve(rel) {
            Some(path) => std::fs::read(path),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no entry {:?} in bundle view", rel),
            )),
        }
    }

    fn walk(&self, rel: &str) -> io::Result<Vec<String>> {
        let rel = normalize(rel);
        let bases: Vec<&PathBuf> = self
            .lookup_order()
            .filter(|root| root.join(&rel).exists())
            .collect();
        if bases.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no directory {:?} in bundle view", rel),
            ));
        }

        let mut found = Vec::new();
        for root in bases {
            let base = root.join(&rel);
            for entry in WalkDir::new(&base) {
                let entry = entry.map_err(io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let sub = entry
                    .path()
                    .strip_prefix(&base)
                    .expect("walkdir yields paths under its base");
                let full = join_rel(&rel, sub);
                if full.is_empty() {
                    continue;
                }
                if self.included(&full) && !found.contains(&full) {
                    found.push(full);
                }
            }
        }
        found.sort();
        Ok(found)
    }

    fn filter(&self) -> Option<&PathFilter> {
        self.filter.as_ref()
    }
}

/// Canonicalize a bundle-relative name: forward slashes, no leading slash,
/// no empty segments
pub(crate) fn normalize(name: &str) -> String {
    name.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn join_rel(base: &str, sub: &Path) -> String {
    let sub = sub
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if base.is_empty() {
        sub
    } else {
        format!("{}/{}", base, sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn root_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, contents) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
        }
        dir
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/pkg//A.class"), "pkg/A.class");
        assert_eq!(normalize("pkg\\A.class"), "pkg/A.class");
        assert_eq!(normalize("./pkg/A.class"), "pkg/A.class");
    }

    #[test]
    fn test_later_root_shadows_earlier() {
        let a = root_with(&[("shared.txt", "from a"), ("only_a.txt", "a")]);
        let b = root_with(&[("shared.txt", "from b")]);
        let fs = DirUnionFs::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);

        assert_eq!(fs.read("shared.txt").unwrap(), b"from b");
        assert_eq!(fs.read("only_a.txt").unwrap(), b"a");
        assert_eq!(fs.primary_root(), a.path());
    }

    #[test]
    fn test_missing_entry() {
        let a = root_with(&[]);
        let fs = DirUnionFs::new(vec![a.path().to_path_buf()]);
        assert!(!fs.exists("nope.txt"));
        assert_eq!(
            fs.read("nope.txt").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_walk_merges_roots() {
        let a = root_with(&[("dir/one.txt", "1"), ("dir/sub/two.txt", "2")]);
        let b = root_with(&[("dir/three.txt", "3")]);
        let fs = DirUnionFs::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]);

        let files = fs.walk("dir").unwrap();
        assert_eq!(files, vec!["dir/one.txt", "dir/sub/two.txt", "dir/three.txt"]);
    }

    #[test]
    fn test_walk_missing_dir_errors() {
        let a = root_with(&[]);
        let fs = DirUnionFs::new(vec![a.path().to_path_buf()]);
        assert!(fs.walk("absent").is_err());
    }

    #[test]
    fn test_filter_hides_entries() {
        let a = root_with(&[("keep/x.txt", "x"), ("drop/y.txt", "y")]);
        let fs = DirUnionFs::new(vec![a.path().to_path_buf()])
            .with_filter(Arc::new(|rel| !rel.starts_with("drop/")));

        assert!(fs.exists("keep/x.txt"));
        assert!(!fs.exists("drop/y.txt"));
        let files = fs.walk("").unwrap();
        assert_eq!(files, vec!["keep/x.txt"]);
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = root_with(&[]);
        let one = DirUnionFs::new(vec![a.path().to_path_buf()]);
        let two = DirUnionFs::new(vec![a.path().to_path_buf()]);
        assert_ne!(one.token(), two.token());
    }
}
