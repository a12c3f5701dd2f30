//! File-backed LocalIdentityStore: one JSON file per key.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CoreResult, StoreError};
use crate::traits::LocalIdentityStore;

/// Stores each blob at `{dir}/{key}.json`.
///
/// Writes go through a temporary file and a rename so a crash mid-write
/// never leaves a truncated identity behind.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    dir: PathBuf,
}

impl FileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

impl LocalIdentityStore for FileIdentityStore {
    fn read(&self, key: &str) -> CoreResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFailed(format!("{}: {}", path.display(), e)).into()),
        }
    }

    fn write(&self, key: &str, blob: &str) -> CoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            StoreError::WriteFailed(format!("create {}: {}", self.dir.display(), e))
        })?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "identity blob written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_reads_none() {
        let dir = TempDir::new().unwrap();
        let store = FileIdentityStore::new(dir.path());
        assert!(store.read("coherence.visitor_identity").unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FileIdentityStore::new(dir.path().join("nested"));
        store.write("coherence.visitor_identity", r#"{"visitorId":"v"}"#).unwrap();
        assert_eq!(
            store.read("coherence.visitor_identity").unwrap().as_deref(),
            Some(r#"{"visitorId":"v"}"#)
        );
        assert!(dir.path().join("nested/coherence.visitor_identity.json").exists());
    }

    #[test]
    fn test_key_is_sanitized() {
        let dir = TempDir::new().unwrap();
        let store = FileIdentityStore::new(dir.path());
        store.write("../escape/key", "x").unwrap();
        assert!(dir.path().join(".._escape_key.json").exists());
        assert_eq!(store.read("../escape/key").unwrap().as_deref(), Some("x"));
    }
}
