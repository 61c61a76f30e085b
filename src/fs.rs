//! FileSystem abstraction for testable staging operations.
//!
//! Extends the teacher's read-oriented `FileSystem` trait with the
//! recursive copy/write operations `TransferStaging` needs, since our
//! phases mutate a shared scratch volume rather than only reading a repo.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn copy_tree(&self, from: &Path, to: &Path) -> Result<()>;
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;
}

pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).context(format!("creating directory {path:?}"))?;
        set_world_readable(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        fs::remove_dir_all(path).context(format!("removing directory {path:?}"))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context(format!("reading file {path:?}"))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(format!("creating directory {parent:?}"))?;
        }
        fs::write(path, contents).context(format!("writing file {path:?}"))?;
        set_world_readable(path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).context(format!("creating directory {parent:?}"))?;
        }
        fs::copy(from, to).context(format!("copying {from:?} to {to:?}"))?;
        set_world_readable(to)
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> Result<()> {
        if !from.exists() {
            return Ok(());
        }
        fs::create_dir_all(to).context(format!("creating directory {to:?}"))?;
        for entry in fs::read_dir(from).context(format!("reading directory {from:?}"))? {
            let entry = entry.context("reading directory entry")?;
            let src = entry.path();
            let dst = to.join(entry.file_name());
            if src.is_dir() {
                self.copy_tree(&src, &dst)?;
            } else {
                self.copy_file(&src, &dst)?;
            }
        }
        set_world_readable(to)
    }
}

#[cfg(unix)]
fn set_world_readable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let meta = fs::metadata(path).context(format!("reading metadata for {path:?}"))?;
    let mut perms = meta.permissions();
    let mode = if meta.is_dir() { 0o777 } else { 0o666 };
    perms.set_mode(mode);
    fs::set_permissions(path, perms).context(format!("setting permissions on {path:?}"))
}

#[cfg(not(unix))]
fn set_world_readable(_path: &Path) -> Result<()> {
    Ok(())
}

/// In-memory `FileSystem` for orchestrator/staging tests that must not
/// touch the real disk. Backed by a flat map of paths to either file
/// contents or a directory marker.
pub struct MockFileSystem {
    entries: std::sync::RwLock<std::collections::HashMap<PathBuf, Option<Vec<u8>>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            entries: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, contents: &[u8]) {
        self.entries
            .write()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), Some(contents.to_vec()));
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.entries
            .read()
            .unwrap()
            .get(path.as_ref())
            .cloned()
            .flatten()
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.entries.read().unwrap().contains_key(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.entries.write().unwrap().insert(path.to_path_buf(), None);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let entries = self.entries.read().unwrap();
        let contents = entries
            .get(path)
            .and_then(|v| v.clone())
            .ok_or_else(|| anyhow::anyhow!("no such mock file {path:?}"))?;
        Ok(String::from_utf8(contents)?)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(path.to_path_buf(), Some(contents.to_vec()));
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        let contents = self
            .entries
            .read()
            .unwrap()
            .get(from)
            .and_then(|v| v.clone())
            .ok_or_else(|| anyhow::anyhow!("no such mock file {from:?}"))?;
        self.write(to, &contents)
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> Result<()> {
        let snapshot: Vec<(PathBuf, Option<Vec<u8>>)> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, v)| (p.clone(), v.clone()))
            .collect();
        for (path, value) in snapshot {
            let rel = path.strip_prefix(from).unwrap();
            let dest = to.join(rel);
            self.entries.write().unwrap().insert(dest, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn real_copy_tree_preserves_structure() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::create_dir(src.path().join("sub")).unwrap();
        std::fs::write(src.path().join("a.txt"), b"hello").unwrap();
        std::fs::write(src.path().join("sub/b.txt"), b"world").unwrap();

        let fs = RealFileSystem::new();
        fs.copy_tree(src.path(), dst.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.path().join("a.txt")).unwrap(),
            "hello"
        );
        assert_eq!(
            std::fs::read_to_string(dst.path().join("sub/b.txt")).unwrap(),
            "world"
        );
    }

    #[test]
    fn real_copy_tree_of_missing_source_is_a_noop() {
        let dst = TempDir::new().unwrap();
        let fs = RealFileSystem::new();
        fs.copy_tree(&dst.path().join("does-not-exist"), dst.path())
            .unwrap();
    }

    #[test]
    fn mock_write_and_read_roundtrip() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/mock/a.json"), b"{}").unwrap();
        assert_eq!(fs.read_to_string(Path::new("/mock/a.json")).unwrap(), "{}");
    }

    #[test]
    fn mock_copy_tree_copies_matching_prefix() {
        let fs = MockFileSystem::new();
        fs.add_file("/mock/src/a.txt", b"1");
        fs.add_file("/mock/src/sub/b.txt", b"2");
        fs.copy_tree(Path::new("/mock/src"), Path::new("/mock/dst"))
            .unwrap();
        assert_eq!(fs.contents("/mock/dst/a.txt").unwrap(), b"1");
        assert_eq!(fs.contents("/mock/dst/sub/b.txt").unwrap(), b"2");
    }

    #[test]
    fn mock_remove_dir_all_drops_prefix() {
        let fs = MockFileSystem::new();
        fs.add_file("/mock/a/b.txt", b"1");
        fs.remove_dir_all(Path::new("/mock/a")).unwrap();
        assert!(!fs.exists(Path::new("/mock/a/b.txt")));
    }
}
