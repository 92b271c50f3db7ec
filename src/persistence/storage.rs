// State storage backends
// A backend only moves opaque text; encoding and validation live in
// serialization.rs.

use crate::persistence::PersistenceError;
use std::path::{Path, PathBuf};

/// Where the state blob lives
pub trait StateStorage: Send {
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError>;

    /// `Ok(None)` when nothing has been saved yet
    fn load(&mut self) -> Result<Option<String>, PersistenceError>;
}

/// Blob in a single file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStorage for FileStorage {
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        // Write beside the target, then rename over it
        let temp = self.temp_path();
        std::fs::write(&temp, blob)?;
        std::fs::rename(&temp, &self.path)?;
        log::info!("State saved to {:?}", self.path);
        Ok(())
    }

    fn load(&mut self) -> Result<Option<String>, PersistenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob (tests, hosts without a filesystem)
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blob: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Some(blob.into()),
        }
    }

    pub fn contents(&self) -> Option<&str> {
        self.blob.as_deref()
    }
}

impl StateStorage for MemoryStorage {
    fn save(&mut self, blob: &str) -> Result<(), PersistenceError> {
        self.blob = Some(blob.to_string());
        Ok(())
    }

    fn load(&mut self) -> Result<Option<String>, PersistenceError> {
        Ok(self.blob.clone())
    }
}
