//! Filesystem-backed [`FileResolver`].

use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::resolver::FileResolver;

/// Resolves directive paths against a document root on disk.
///
/// - `file="..."` is relative to the directory of the current document and may
///   not be absolute or contain `..`.
/// - `virtual="/..."` is relative to the document root; a `virtual` path
///   without a leading `/` is relative to the current document's directory.
///
/// Paths that resolve outside the root are reported as missing.
///
/// # Example
///
/// ```
/// use rw_ssi::{FileResolver, FsFileResolver};
///
/// let files = FsFileResolver::new("/srv/www").with_document("/srv/www/docs/index.shtml");
/// // Nothing exists under /srv/www in this example.
/// assert!(files.find_file("header.html", false).is_none());
/// assert!(files.find_file("../secret", false).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FsFileResolver {
    root: PathBuf,
    document_dir: PathBuf,
}

impl FsFileResolver {
    /// Create a resolver rooted at `root`; the current document sits at the root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            document_dir: root.clone(),
            root,
        }
    }

    /// Set the document being processed.
    ///
    /// Relative document paths are taken relative to the root.
    #[must_use]
    pub fn with_document(mut self, document: impl AsRef<Path>) -> Self {
        let document = self.root.join(document.as_ref());
        self.document_dir = document
            .parent()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        self
    }

    /// Document root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str, is_virtual: bool) -> Option<PathBuf> {
        let candidate = if is_virtual {
            match path.strip_prefix('/') {
                Some(rooted) => self.root.join(rooted),
                None => self.document_dir.join(path),
            }
        } else {
            let relative = Path::new(path);
            let escapes = relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                tracing::warn!(path, "Rejected file path outside the current directory");
                return None;
            }
            self.document_dir.join(relative)
        };

        let canonical = candidate.canonicalize().ok()?;
        let canonical_root = self.root.canonicalize().ok()?;
        if canonical.starts_with(&canonical_root) {
            Some(canonical)
        } else {
            tracing::warn!(path, "Rejected path outside the document root");
            None
        }
    }

    fn metadata(&self, path: &str, is_virtual: bool) -> Option<Metadata> {
        let resolved = self.resolve(path, is_virtual)?;
        fs::metadata(resolved).ok().filter(Metadata::is_file)
    }
}

impl FileResolver for FsFileResolver {
    fn find_file(&self, path: &str, is_virtual: bool) -> Option<PathBuf> {
        self.resolve(path, is_virtual).filter(|p| p.is_file())
    }

    fn last_modified(&self, path: &str, is_virtual: bool) -> Option<i64> {
        let modified = self.metadata(path, is_virtual)?.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        i64::try_from(since_epoch.as_millis()).ok()
    }

    fn size(&self, path: &str, is_virtual: bool) -> Option<u64> {
        self.metadata(path, is_virtual).map(|m| m.len())
    }

    fn open(&self, file: &Path) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(file)?))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("header.html"), "<h1>Header</h1>").unwrap();
        fs::write(dir.path().join("docs/part.html"), "part").unwrap();
        dir
    }

    #[test]
    fn test_file_relative_to_document() {
        let dir = site();
        let files = FsFileResolver::new(dir.path()).with_document("docs/index.shtml");

        assert!(files.find_file("part.html", false).is_some());
        assert_eq!(files.size("part.html", false), Some(4));
        assert!(files.find_file("header.html", false).is_none());
    }

    #[test]
    fn test_virtual_from_root() {
        let dir = site();
        let files = FsFileResolver::new(dir.path()).with_document("docs/index.shtml");

        assert!(files.find_file("/header.html", true).is_some());
        assert!(files.find_file("part.html", true).is_some());
        assert_eq!(files.size("/header.html", true), Some(15));
    }

    #[test]
    fn test_file_rejects_parent_and_absolute() {
        let dir = site();
        let files = FsFileResolver::new(dir.path()).with_document("docs/index.shtml");

        assert!(files.find_file("../header.html", false).is_none());
        assert!(files.find_file("/header.html", false).is_none());
    }

    #[test]
    fn test_virtual_cannot_escape_root() {
        let outer = tempfile::tempdir().unwrap();
        fs::create_dir(outer.path().join("www")).unwrap();
        fs::write(outer.path().join("secret.txt"), "secret").unwrap();
        let files = FsFileResolver::new(outer.path().join("www"));

        assert!(files.find_file("/../secret.txt", true).is_none());
        assert!(files.find_file("../secret.txt", true).is_none());
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = site();
        let files = FsFileResolver::new(dir.path());

        assert!(files.find_file("/docs", true).is_none());
        assert_eq!(files.size("/docs", true), None);
    }

    #[test]
    fn test_last_modified_and_open() {
        let dir = site();
        let files = FsFileResolver::new(dir.path());

        assert!(files.last_modified("header.html", false).unwrap() > 0);
        let found = files.find_file("header.html", false).unwrap();
        let mut content = String::new();
        files.open(&found).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "<h1>Header</h1>");
    }

    #[test]
    fn test_missing_file() {
        let dir = site();
        let files = FsFileResolver::new(dir.path());

        assert_eq!(files.last_modified("missing.html", false), None);
        assert_eq!(files.size("missing.html", true), None);
    }
}
