use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Governs whether plan entries for files that do not exist yet are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Create missing parents and files, overwrite existing ones.
    CreateOrOverwrite,
    /// Only replace regular files that already exist.
    OverwriteExistingOnly,
}

/// Mapping from project-relative path to the full replacement content.
///
/// Keys are unique within a plan. Paths are untrusted until the applier has
/// validated them against the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileWritePlan {
    entries: BTreeMap<String, String>,
}

impl FileWritePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.entries.insert(path.into(), content.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl FromIterator<(String, String)> for FileWritePlan {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Why a plan entry was refused before touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum PathRejection {
    #[error("path is empty")]
    Empty,
    #[error("absolute paths are not allowed")]
    Absolute,
    #[error("path contains a parent-directory component")]
    ParentTraversal,
    #[error("path resolves outside the project root")]
    EscapesRoot,
}

/// Per-entry result of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub written: Vec<String>,
    /// Entries skipped because the target did not exist (fix mode).
    pub skipped: Vec<String>,
    pub rejected: Vec<(String, PathRejection)>,
    /// Entries whose write failed, with the I/O error text.
    pub failed: Vec<(String, String)>,
}

impl ApplyReport {
    pub fn written_count(&self) -> usize {
        self.written.len()
    }

    pub fn has_problems(&self) -> bool {
        !self.rejected.is_empty() || !self.failed.is_empty()
    }

    /// One-line summary suitable for the operator.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} file(s) written", self.written.len())];
        if !self.skipped.is_empty() {
            parts.push(format!("{} skipped", self.skipped.len()));
        }
        if !self.rejected.is_empty() {
            parts.push(format!("{} rejected", self.rejected.len()));
        }
        if !self.failed.is_empty() {
            parts.push(format!("{} failed", self.failed.len()));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_insert_replaces_earlier_entry() {
        let mut plan = FileWritePlan::new();
        plan.insert("a.txt", "one");
        plan.insert("a.txt", "two");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.get("a.txt"), Some("two"));
    }

    #[test]
    fn summary_mentions_only_nonempty_buckets() {
        let mut report = ApplyReport::default();
        report.written.push("a".to_string());
        assert_eq!(report.summary(), "1 file(s) written");

        report.skipped.push("b".to_string());
        report
            .rejected
            .push(("../c".to_string(), PathRejection::ParentTraversal));
        assert_eq!(report.summary(), "1 file(s) written, 1 skipped, 1 rejected");
        assert!(report.has_problems());
    }
}
