use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::result::CommonResult;

/// File system abstraction for durable side-channels and testing
pub trait FileSystem: Send + Sync {
    /// Check if a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Read a whole file as UTF-8
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace the contents of a file, creating it if needed
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Remove a file. Removing a missing file is not an error.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Real file system implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write beside the target and rename so readers never see a torn file
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// In-memory file system for testing
#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: Mutex<HashMap<PathBuf, String>>,
    fail_writes: AtomicBool,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), contents.into());
        }
    }

    /// Make every subsequent write fail (simulates a full or read-only disk)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn files(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<PathBuf, String>>> {
        self.files
            .lock()
            .map_err(|_| io::Error::other("mock file system lock poisoned"))
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files()?
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "mock file system is read-only",
            ));
        }
        self.files()?.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files()?.remove(path);
        Ok(())
    }
}

/// Read and decode a JSON file. A missing file yields `None`.
pub fn read_json<T: DeserializeOwned>(fs: &dyn FileSystem, path: &Path) -> CommonResult<Option<T>> {
    if !fs.exists(path) {
        return Ok(None);
    }
    let content = fs.read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Encode a value as pretty JSON and write it out
pub fn write_json<T: Serialize>(fs: &dyn FileSystem, path: &Path, value: &T) -> CommonResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs.write(path, &content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommonError;

    #[test]
    fn test_mock_roundtrip() {
        let fs = MockFileSystem::new();
        let path = Path::new("/clip.json");

        assert!(read_json::<Vec<u32>>(&fs, path).unwrap().is_none());

        write_json(&fs, path, &vec![1u32, 2, 3]).unwrap();
        let back: Option<Vec<u32>> = read_json(&fs, path).unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        fs.remove(path).unwrap();
        assert!(!fs.exists(path));
    }

    #[test]
    fn test_mock_write_failure() {
        let fs = MockFileSystem::new();
        fs.set_fail_writes(true);

        let err = write_json(&fs, Path::new("/clip.json"), &1u32).unwrap_err();
        assert!(matches!(err, CommonError::Io(_)));
    }

    #[test]
    fn test_corrupt_json_is_an_error() {
        let fs = MockFileSystem::new();
        fs.add_file("/bad.json", "{not json");

        let err = read_json::<Vec<u32>>(&fs, Path::new("/bad.json")).unwrap_err();
        assert!(matches!(err, CommonError::Json(_)));
    }

    #[test]
    fn test_real_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clip.json");
        let fs = RealFileSystem;

        fs.write(&path, "[]").unwrap();
        assert_eq!(fs.read_to_string(&path).unwrap(), "[]");
        assert!(!path.with_extension("tmp").exists());

        fs.remove(&path).unwrap();
        fs.remove(&path).unwrap();
        assert!(!fs.exists(&path));
    }
}
