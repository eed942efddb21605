//! The rendered output tree.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use super::slug::Slug;
use crate::error::{Error, Result};
use crate::model::NoteId;

/// Extension of note pages.
pub const PAGE_EXTENSION: &str = "html";

/// Writes files below one root directory and nowhere else.
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: PathBuf,
}

impl OutputTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Page path for a note, checked to stay inside the root.
    pub fn page_path(&self, id: &NoteId, slug: &Slug) -> Result<PathBuf> {
        let relative = format!("{}.{PAGE_EXTENSION}", slug.as_str());
        self.path_for(&relative).ok_or_else(|| Error::PathEscape {
            id: id.clone(),
            slug: slug.to_string(),
        })
    }

    /// Join a relative path onto the root, or `None` if it could leave it.
    pub fn path_for(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        let mut components = rel.components().peekable();
        components.peek()?;
        if components.all(|c| matches!(c, Component::Normal(_))) {
            Some(self.root.join(rel))
        } else {
            None
        }
    }

    /// Write `bytes` to `path` unless it already holds exactly them.
    ///
    /// Returns whether the file was written.
    pub fn write_if_changed(&self, path: &Path, bytes: &[u8]) -> io::Result<bool> {
        match fs::read(path) {
            Ok(existing) if existing == bytes => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        write_atomic(path, bytes)?;
        Ok(true)
    }

    /// Remove a file and any directories below the root it leaves empty.
    ///
    /// Returns whether a file was removed.
    pub fn remove(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        }
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.root || !d.starts_with(&self.root) {
                break;
            }
            // Fails when not empty, which ends the walk.
            if fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
        Ok(true)
    }
}

/// Write a file by renaming a fully written temporary file over it.
///
/// The temporary file lives in the destination directory so the rename
/// never crosses filesystems.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_path_for_rejects_escapes() {
        let tree = OutputTree::new("/out");
        assert_eq!(tree.path_for("a/b.html"), Some(PathBuf::from("/out/a/b.html")));
        assert_eq!(tree.path_for("../b.html"), None);
        assert_eq!(tree.path_for("a/../../b.html"), None);
        assert_eq!(tree.path_for("/etc/passwd"), None);
        assert_eq!(tree.path_for("./a.html"), None);
        assert_eq!(tree.path_for(""), None);
    }

    #[test]
    fn test_write_if_changed() {
        let dir = TempDir::new().unwrap();
        let tree = OutputTree::new(dir.path());
        let path = tree.path_for("x/y/page.html").unwrap();

        assert!(tree.write_if_changed(&path, b"one").unwrap());
        assert!(!tree.write_if_changed(&path, b"one").unwrap());
        assert!(tree.write_if_changed(&path, b"two").unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn test_remove_prunes_empty_dirs() {
        let dir = TempDir::new().unwrap();
        let tree = OutputTree::new(dir.path());
        let keep = tree.path_for("x/keep.html").unwrap();
        let gone = tree.path_for("x/y/gone.html").unwrap();
        write_atomic(&keep, b"k").unwrap();
        write_atomic(&gone, b"g").unwrap();

        assert!(tree.remove(&gone).unwrap());
        assert!(!dir.path().join("x/y").exists());
        assert!(keep.exists());
        assert!(!tree.remove(&gone).unwrap());
    }
}
