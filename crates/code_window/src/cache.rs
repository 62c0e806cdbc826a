use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use eyre::WrapErr;

use crate::decode::{SourceEncoding, decode};

#[derive(Debug)]
struct CachedFile {
    lines: Arc<Vec<String>>,
    modified: Option<SystemTime>,
}

/// Source file contents keyed by path, loaded on first access
#[derive(Debug, Default)]
pub struct FileCache {
    files: HashMap<PathBuf, CachedFile>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines of a file without their line terminators, reading it if it is not cached yet.
    ///
    /// Read failures are not cached.
    pub fn lines(&mut self, path: &Path) -> eyre::Result<Arc<Vec<String>>> {
        if let Some(cached) = self.files.get(path) {
            return Ok(Arc::clone(&cached.lines));
        }

        let bytes = fs::read(path).wrap_err_with(|| format!("reading {}", path.display()))?;
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        let (text, encoding) = decode(&bytes);
        if encoding != SourceEncoding::Utf8 {
            tracing::debug!(path = %path.display(), ?encoding, "decoded source with fallback encoding");
        }
        let lines: Arc<Vec<String>> = Arc::new(text.lines().map(str::to_string).collect());
        tracing::trace!(path = %path.display(), lines = lines.len(), "cached source file");

        self.files.insert(
            path.to_path_buf(),
            CachedFile {
                lines: Arc::clone(&lines),
                modified,
            },
        );
        Ok(lines)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        self.files.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// Drop the entry for `path` when the file changed on disk since it was read.
    ///
    /// Returns whether an entry was dropped.
    pub fn invalidate_if_modified(&mut self, path: &Path) -> bool {
        let Some(cached) = self.files.get(path) else {
            return false;
        };
        let current = fs::metadata(path).and_then(|m| m.modified()).ok();
        if current == cached.modified {
            return false;
        }
        tracing::debug!(path = %path.display(), "source file changed, reloading");
        self.files.remove(path);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn lines_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "one\r\ntwo\nthree").unwrap();

        let mut cache = FileCache::new();
        let lines = cache.lines(&path).unwrap();
        assert_eq!(*lines, vec!["one", "two", "three"]);
        assert!(cache.contains(&path));

        // served from the cache even after the file is gone
        fs::remove_file(&path).unwrap();
        assert_eq!(cache.lines(&path).unwrap().len(), 3);
        assert_eq!(cache.paths(), vec![path]);
    }

    #[test]
    fn missing_file_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.py");
        let mut cache = FileCache::new();
        assert!(cache.lines(&path).is_err());
        assert!(!cache.contains(&path));
    }

    #[test]
    fn modified_file_is_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        fs::write(&path, "one\n").unwrap();

        let mut cache = FileCache::new();
        cache.lines(&path).unwrap();
        assert!(!cache.invalidate_if_modified(&path));

        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        drop(file);

        assert!(cache.invalidate_if_modified(&path));
        assert!(!cache.contains(&path));
    }
}
