//! Persistence for the one-time "how to interact" tip.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::StoreError;

/// Remembers whether the guide tip has been shown before.
pub trait GuideStore {
    fn was_shown(&self) -> bool;
    fn mark_shown(&mut self) -> Result<(), StoreError>;
}

/// In-memory flag, for tests and for platforms without a data dir.
#[derive(Debug, Default)]
pub struct MemoryGuideStore {
    shown: bool,
}

impl MemoryGuideStore {
    pub fn new(shown: bool) -> Self {
        Self { shown }
    }
}

impl GuideStore for MemoryGuideStore {
    fn was_shown(&self) -> bool {
        self.shown
    }

    fn mark_shown(&mut self) -> Result<(), StoreError> {
        self.shown = true;
        Ok(())
    }
}

/// Marker file named after the guide key. Existence means "shown".
#[derive(Debug)]
pub struct FileGuideStore {
    path: PathBuf,
}

impl FileGuideStore {
    pub fn new(dir: &Path, key: &str) -> Self {
        Self {
            path: dir.join(format!("{key}.flag")),
        }
    }

    /// Store under the platform data directory for this app.
    pub fn in_data_dir(key: &str) -> Result<Self, StoreError> {
        let dirs = ProjectDirs::from("dev", "pasture", "pasture").ok_or(StoreError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir(), key))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GuideStore for FileGuideStore {
    fn was_shown(&self) -> bool {
        self.path.exists()
    }

    fn mark_shown(&mut self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&self.path, b"1").map_err(io_err)
    }
}
