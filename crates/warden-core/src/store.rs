// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! On-disk persistence for [`SharedState`].
//!
//! State lives in a single JSON document (`state.json`) under the data
//! directory. Writes go to a sibling temporary file first and are then renamed
//! over the target, so a crash mid-write never leaves a truncated document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::state::{SharedState, StateSnapshot};

/// File name of the persisted state document.
pub const STATE_FILE: &str = "state.json";

/// Loads and saves the shared state document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store for `state.json` inside `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(STATE_FILE),
        }
    }

    /// Returns the document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted snapshot, or `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<StateSnapshot>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    /// Loads the shared state, falling back to defaults when nothing is saved.
    pub fn load_state(&self) -> Result<SharedState, StoreError> {
        match self.load()? {
            Some(snapshot) => {
                SharedState::from_snapshot(snapshot).map_err(|source| StoreError::Invalid {
                    path: self.path.clone(),
                    source,
                })
            }
            None => {
                tracing::info!(path = %self.path.display(), "No saved state, starting with defaults");
                Ok(SharedState::default())
            }
        }
    }

    /// Atomically replaces the document with `snapshot`.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Serialization {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source: std::io::Error| StoreError::Io {
            path: tmp.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), bytes = json.len(), "Saved shared state");
        Ok(())
    }

    /// Saves the current contents of `state`.
    pub fn save_state(&self, state: &SharedState) -> Result<(), StoreError> {
        self.save(&state.snapshot())
    }
}
