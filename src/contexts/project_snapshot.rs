use std::fs;
use std::path::{Component, Path};
use tracing::warn;

use crate::data::ProjectSnapshot;

/// Lists every regular file under `project_root`, relative to it.
///
/// Directories and symlinks are never included. Unreadable directories are
/// logged and skipped since the listing only feeds model context.
pub fn snapshot(project_root: &Path) -> ProjectSnapshot {
    snapshot_excluding(project_root, &[])
}

/// Same as [`snapshot`] but does not descend into directories whose name is
/// listed in `ignored_dirs` (e.g. `node_modules`).
pub fn snapshot_excluding(project_root: &Path, ignored_dirs: &[String]) -> ProjectSnapshot {
    let mut paths = Vec::new();
    walk(project_root, project_root, ignored_dirs, &mut paths);
    ProjectSnapshot::new(paths)
}

fn walk(root: &Path, dir: &Path, ignored_dirs: &[String], out: &mut Vec<String>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            let name = entry.file_name();
            if ignored_dirs.iter().any(|d| name.to_str() == Some(d.as_str())) {
                continue;
            }
            walk(root, &path, ignored_dirs, out);
        } else if file_type.is_file() {
            if let Ok(rel) = path.strip_prefix(root) {
                out.push(to_display_path(rel));
            }
        }
    }
}

fn to_display_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
