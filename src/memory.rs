//! Persisted session memory
//!
//! Keeps the operation history, free-form project context and operator
//! feedback in a JSON file so a later run can resume the same project.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Content hash of one file touched by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// RFC 3339
    pub timestamp: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDigest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub timestamp: String,
    pub feedback: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MemoryState {
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    project_context: BTreeMap<String, Value>,
    #[serde(default)]
    user_feedback: Vec<FeedbackEntry>,
}

/// In-memory view of the state file. Mutations stay local until [`commit`].
///
/// [`commit`]: SessionMemory::commit
#[derive(Debug, Clone)]
pub struct SessionMemory {
    path: PathBuf,
    state: MemoryState,
}

impl SessionMemory {
    /// Loads the state file, starting empty when it is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = if path.exists() {
            match Self::read_state(&path) {
                Ok(state) => state,
                Err(e) => {
                    warn!("Could not load memory from {}: {:#}", path.display(), e);
                    MemoryState::default()
                }
            }
        } else {
            debug!("No memory file at {}", path.display());
            MemoryState::default()
        };
        Self { path, state }
    }

    fn read_state(path: &Path) -> Result<MemoryState> {
        let content = fs::read_to_string(path).context("Failed to read memory file")?;
        serde_json::from_str(&content).context("Failed to parse memory file")
    }

    /// Writes the whole state back to disk.
    pub fn commit(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        let content =
            serde_json::to_string_pretty(&self.state).context("Failed to serialize memory")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!("Memory saved to {}", self.path.display());
        Ok(())
    }

    pub fn remember<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize '{}'", key))?;
        self.state.project_context.insert(key.to_string(), value);
        Ok(())
    }

    /// Returns the remembered value, or `None` if absent or of another shape.
    pub fn recall<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.state.project_context.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Remembered '{}' has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub fn log(&mut self, action: &str, detail: Option<&str>, files: Vec<FileDigest>) {
        self.state.history.push(HistoryEntry {
            timestamp: now(),
            action: action.to_string(),
            detail: detail.map(str::to_string),
            files,
        });
    }

    pub fn add_feedback(&mut self, feedback: &str) {
        self.state.user_feedback.push(FeedbackEntry {
            timestamp: now(),
            feedback: feedback.to_string(),
        });
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    pub fn feedback(&self) -> &[FeedbackEntry] {
        &self.state.user_feedback
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Hashes the given project-relative files; unreadable ones are left out.
pub fn digest_files<'a>(
    project_root: &Path,
    paths: impl IntoIterator<Item = &'a str>,
) -> Vec<FileDigest> {
    paths
        .into_iter()
        .filter_map(|rel| match fs::read(project_root.join(rel)) {
            Ok(bytes) => Some(FileDigest {
                path: rel.to_string(),
                sha256: hex::encode(Sha256::digest(&bytes)),
            }),
            Err(e) => {
                debug!("Not hashing {}: {}", rel, e);
                None
            }
        })
        .collect()
}
