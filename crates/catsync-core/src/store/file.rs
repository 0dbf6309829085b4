use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{CategorySnapshot, FallbackStore, StoreError};

/// Snapshot file inside the session directory
const CATEGORY_DATA_FILE: &str = "category_data.json";

/// Name fragments marking cached responses in the persistent cache directory.
const TAGGED_CACHE_MARKERS: [&str; 2] = ["category", "api"];

/// Keys older builds kept in the persistent directory.
const LEGACY_PERSISTENT_FILES: [&str; 2] = ["categories.json", "categories_last_fetched.json"];

/// File-backed fallback store.
///
/// The snapshot lives in a per-session directory. The optional persistent
/// directory and sessions root are only touched by `purge`, the
/// user-triggered cache clear.
pub struct FileStore {
    session_dir: PathBuf,
    persistent_dir: Option<PathBuf>,
    sessions_root: Option<PathBuf>,
    /// Remove `session_dir` when the session ends.
    ephemeral: bool,
}

impl FileStore {
    pub fn new(session_dir: PathBuf, persistent_dir: Option<PathBuf>) -> Self {
        Self {
            session_dir,
            persistent_dir,
            sessions_root: None,
            ephemeral: false,
        }
    }

    /// Directory holding every session's directory, swept by `purge`.
    pub fn with_sessions_root(mut self, root: PathBuf) -> Self {
        self.sessions_root = Some(root);
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    fn snapshot_path(&self) -> PathBuf {
        self.session_dir.join(CATEGORY_DATA_FILE)
    }

    fn try_save(&self, snapshot: &CategorySnapshot) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.session_dir)?;
        let contents = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(self.snapshot_path(), contents)?;
        Ok(())
    }

    fn try_load(&self) -> Result<Option<CategorySnapshot>, StoreError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn try_clear(&self) -> Result<(), StoreError> {
        remove_if_exists(&self.snapshot_path())
    }

    fn try_sweep_sessions(root: &Path) -> Result<usize, StoreError> {
        if !root.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            match remove_if_exists(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(session = %path.display(), error = %e, "Failed to remove session cache"),
            }
        }
        Ok(removed)
    }

    fn try_purge_persistent(dir: &Path) -> Result<usize, StoreError> {
        if !dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for name in LEGACY_PERSISTENT_FILES {
            let path = dir.join(name);
            if path.exists() {
                remove_if_exists(&path)?;
                removed += 1;
            }
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if !TAGGED_CACHE_MARKERS.iter().any(|m| name.contains(m)) {
                continue;
            }
            // Keep going past individual failures, like the rest of the store.
            match remove_if_exists(&entry.path()) {
                Ok(()) => {
                    debug!(cache = %name, "Removed tagged cache");
                    removed += 1;
                }
                Err(e) => warn!(cache = %name, error = %e, "Failed to remove tagged cache"),
            }
        }
        Ok(removed)
    }
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

impl FallbackStore for FileStore {
    fn save(&self, snapshot: &CategorySnapshot) {
        match self.try_save(snapshot) {
            Ok(()) => debug!(count = snapshot.categories.len(), "Saved category snapshot"),
            Err(e) => warn!(error = %e, "Failed to save category snapshot"),
        }
    }

    fn load(&self) -> Option<CategorySnapshot> {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to read category snapshot");
                None
            }
        }
    }

    fn clear(&self) {
        if let Err(e) = self.try_clear() {
            warn!(error = %e, "Failed to clear category snapshot");
        }
    }

    fn purge(&self) {
        self.clear();
        if let Some(root) = &self.sessions_root {
            match Self::try_sweep_sessions(root) {
                Ok(removed) => info!(removed, "Purged session category caches"),
                Err(e) => warn!(error = %e, "Failed to purge session category caches"),
            }
        }
        if let Some(dir) = &self.persistent_dir {
            match Self::try_purge_persistent(dir) {
                Ok(removed) => info!(removed, "Purged persistent category caches"),
                Err(e) => warn!(error = %e, "Failed to purge persistent category caches"),
            }
        }
    }

    fn end_session(&self) {
        if !self.ephemeral {
            return;
        }
        match remove_if_exists(&self.session_dir) {
            Ok(()) => debug!(session = %self.session_dir.display(), "Removed session cache"),
            Err(e) => warn!(error = %e, "Failed to remove session cache"),
        }
    }
}
