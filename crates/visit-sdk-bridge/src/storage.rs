// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session storage backends for desktop, tests and the host binary.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use visit_sdk_core::error::Result;

use crate::traits::SessionStorage;

/// Process-lifetime storage.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    previously_revoked: AtomicBool,
}

impl MemorySessionStorage {
    pub fn new(previously_revoked: bool) -> Self {
        Self {
            previously_revoked: AtomicBool::new(previously_revoked),
        }
    }
}

impl SessionStorage for MemorySessionStorage {
    fn previously_revoked(&self) -> bool {
        self.previously_revoked.load(Ordering::SeqCst)
    }

    fn set_previously_revoked(&self, revoked: bool) -> Result<()> {
        self.previously_revoked.store(revoked, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    previously_revoked: bool,
}

/// JSON file storage (`session.json` in the data directory).
#[derive(Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
    state: Mutex<SessionFile>,
}

impl FileSessionStorage {
    pub const FILE_NAME: &'static str = "session.json";

    /// Open the session file in `dir`. A missing or unreadable file starts
    /// from defaults.
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(Self::FILE_NAME);
        let state = std::fs::read_to_string(&path)
            .ok()
            .and_then(|data| match serde_json::from_str(&data) {
                Ok(state) => Some(state),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "ignoring corrupt session file");
                    None
                }
            })
            .unwrap_or_default();
        debug!(path = %path.display(), ?state, "session storage opened");
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn previously_revoked(&self) -> bool {
        self.state
            .lock()
            .expect("session lock poisoned")
            .previously_revoked
    }

    fn set_previously_revoked(&self, revoked: bool) -> Result<()> {
        let mut state = self.state.lock().expect("session lock poisoned");
        state.previously_revoked = revoked;
        let json = serde_json::to_string_pretty(&*state)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_round_trips_flag() {
        let storage = MemorySessionStorage::new(true);
        assert!(storage.previously_revoked());
        storage.set_previously_revoked(false).unwrap();
        assert!(!storage.previously_revoked());
    }

    #[test]
    fn file_storage_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::open(dir.path());
        assert!(!storage.previously_revoked());
        storage.set_previously_revoked(true).unwrap();

        let reopened = FileSessionStorage::open(dir.path());
        assert!(reopened.previously_revoked());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FileSessionStorage::FILE_NAME), "{not json").unwrap();
        let storage = FileSessionStorage::open(dir.path());
        assert!(!storage.previously_revoked());
    }
}
