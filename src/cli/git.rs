use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use super::subprocess::run_bounded;
use autonomy::data::ProjectConfig;

const GITIGNORE: &str = "node_modules/
.next/
.env.local
.env
dist/
build/
*.log
.DS_Store
.vscode/
.idea/
coverage/
.nyc_output/
";

/// Identity used for the initial commit.
#[derive(Debug, Clone)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// What the bootstrap managed to do.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GitReport {
    pub committed: bool,
    pub pushed: bool,
    pub warnings: Vec<String>,
}

/// Initializes a repository with an initial commit, then pushes when a
/// remote URL is configured. Failures are collected as warnings.
pub async fn bootstrap(
    config: &ProjectConfig,
    project_path: &Path,
    identity: &GitIdentity,
    limit: Duration,
) -> GitReport {
    let mut report = GitReport::default();

    if let Err(e) = write_gitignore(project_path) {
        note(&mut report, format!("{:#}", e));
    }

    let commit_message = format!("Initial commit for {}", config.name);
    let local_steps: [Vec<&str>; 5] = [
        vec!["init"],
        vec!["config", "user.name", identity.name.as_str()],
        vec!["config", "user.email", identity.email.as_str()],
        vec!["add", "."],
        vec!["commit", "-m", commit_message.as_str()],
    ];
    report.committed = run_steps(&local_steps, project_path, limit, &mut report.warnings).await;

    if let Some(url) = &config.repo_url {
        if report.committed {
            let remote_steps: [Vec<&str>; 3] = [
                vec!["remote", "add", "origin", url.as_str()],
                vec!["branch", "-M", "main"],
                vec!["push", "-u", "origin", "main"],
            ];
            report.pushed =
                run_steps(&remote_steps, project_path, limit, &mut report.warnings).await;
        } else {
            note(&mut report, "skipping push: nothing committed".to_string());
        }
    }

    report
}

/// Runs steps in order, stopping at the first failure.
async fn run_steps(
    steps: &[Vec<&str>],
    project_path: &Path,
    limit: Duration,
    warnings: &mut Vec<String>,
) -> bool {
    for args in steps {
        let label = format!("git {}", args.join(" "));
        match run_bounded("git", args, Some(project_path), limit).await {
            Ok(outcome) if outcome.success => {}
            Ok(outcome) => {
                let message = format!("{} failed: {}", label, outcome.short_error());
                warn!("{}", message);
                warnings.push(message);
                return false;
            }
            Err(e) => {
                let message = format!("{} failed: {:#}", label, e);
                warn!("{}", message);
                warnings.push(message);
                return false;
            }
        }
    }
    true
}

fn write_gitignore(project_path: &Path) -> Result<()> {
    let path = project_path.join(".gitignore");
    fs::write(&path, GITIGNORE).with_context(|| format!("Failed to write {}", path.display()))
}

fn note(report: &mut GitReport, message: String) {
    warn!("{}", message);
    report.warnings.push(message);
}
