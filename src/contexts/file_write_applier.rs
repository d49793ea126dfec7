use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::data::{ApplyReport, FileWritePlan, PathRejection, WriteMode};

/// Applies a validated plan onto `project_root`.
///
/// Every entry is handled on its own: a rejected, skipped or failed entry
/// never prevents the remaining entries from being written, and nothing
/// already written is rolled back. Each write replaces the whole file.
pub fn apply(plan: &FileWritePlan, project_root: &Path, mode: WriteMode) -> ApplyReport {
    let mut report = ApplyReport::default();

    let canonical_root = match project_root.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            warn!(
                "Project root {} is not accessible: {}",
                project_root.display(),
                e
            );
            for path in plan.paths() {
                report.failed.push((path.to_string(), e.to_string()));
            }
            return report;
        }
    };

    for (rel, content) in plan.iter() {
        let target = match resolve_target(&canonical_root, rel) {
            Ok(t) => t,
            Err(reason) => {
                warn!("Rejected plan entry '{}': {}", rel, reason);
                report.rejected.push((rel.to_string(), reason));
                continue;
            }
        };

        if mode == WriteMode::OverwriteExistingOnly && !is_regular_file(&target) {
            debug!("Skipping '{}': file does not exist", rel);
            report.skipped.push(rel.to_string());
            continue;
        }

        match write_entry(&target, content, mode) {
            Ok(()) => {
                debug!("Wrote {}", target.display());
                report.written.push(rel.to_string());
            }
            Err(e) => {
                warn!("Failed to write '{}': {}", rel, e);
                report.failed.push((rel.to_string(), e.to_string()));
            }
        }
    }

    report
}

/// Checks the shape of a plan path without touching the filesystem.
///
/// Both `/` and `\` count as separators so that a Windows-style `..\x`
/// cannot slip through on any platform.
pub fn validate_relative_path(rel: &str) -> Result<PathBuf, PathRejection> {
    if rel.trim().is_empty() {
        return Err(PathRejection::Empty);
    }
    if rel.starts_with('/') || rel.starts_with('\\') || Path::new(rel).is_absolute() {
        return Err(PathRejection::Absolute);
    }
    if rel.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathRejection::ParentTraversal);
    }

    let mut clean = PathBuf::new();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(PathRejection::ParentTraversal),
            Component::RootDir | Component::Prefix(_) => return Err(PathRejection::Absolute),
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(PathRejection::Empty);
    }
    Ok(clean)
}

fn resolve_target(canonical_root: &Path, rel: &str) -> Result<PathBuf, PathRejection> {
    let clean = validate_relative_path(rel)?;
    let target = canonical_root.join(clean);

    // A symlinked target (even a dangling one) must point back inside the root.
    if let Ok(meta) = fs::symlink_metadata(&target) {
        if meta.file_type().is_symlink() {
            match target.canonicalize() {
                Ok(resolved) if resolved.starts_with(canonical_root) => {}
                _ => return Err(PathRejection::EscapesRoot),
            }
        }
    }

    // The deepest existing ancestor decides where new directories would land.
    for ancestor in target.ancestors() {
        if ancestor.exists() {
            let resolved = ancestor
                .canonicalize()
                .map_err(|_| PathRejection::EscapesRoot)?;
            if !resolved.starts_with(canonical_root) {
                return Err(PathRejection::EscapesRoot);
            }
            break;
        }
    }

    Ok(target)
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_file())
        .unwrap_or(false)
}

fn write_entry(target: &Path, content: &str, mode: WriteMode) -> std::io::Result<()> {
    if mode == WriteMode::CreateOrOverwrite {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(target, content)
}
