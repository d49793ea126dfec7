use anyhow::{Context, Result, bail};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tokio::io::AsyncBufRead;

use super::prompt::Prompter;
use autonomy::contexts::apply;
use autonomy::data::{ApplyReport, ProjectConfig, ProjectType, WriteMode, split_list};
use autonomy::registries::template_for;

pub const DEFAULT_PROJECT_NAME: &str = "my-awesome-app";
const DEFAULT_FEATURES: &str = "responsive design, modern UI, fast performance";
const DEFAULT_TECH_STACK: &str = "tailwindcss, typescript";

fn unsafe_name_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9._-]+").expect("valid regex"))
}

fn repeated_dashes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-{2,}").expect("valid regex"))
}

/// Turns free text into a directory-safe project name.
pub fn sanitize_project_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace(char::is_whitespace, "-");
    let stripped = unsafe_name_chars_re().replace_all(&lowered, "");
    let collapsed = repeated_dashes_re().replace_all(&stripped, "-");
    let name = collapsed.trim_matches(|c| c == '-' || c == '.');

    if name.is_empty() {
        DEFAULT_PROJECT_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Asks the operator for everything needed to create a project.
pub async fn gather_requirements<R: AsyncBufRead + Unpin>(
    prompter: &mut Prompter<R>,
    port: u16,
) -> Result<ProjectConfig> {
    println!("Let's create your project!\n");

    let raw_name = prompter.ask("Project name", DEFAULT_PROJECT_NAME).await?;
    let name = sanitize_project_name(&raw_name);
    if name != raw_name {
        println!("Using project name: {}", name);
    }

    println!("\nAvailable project types:");
    for (i, kind) in ProjectType::ALL.iter().enumerate() {
        println!("{}. {}", i + 1, kind.as_str().to_uppercase());
    }
    let choice = prompter
        .choose("Choose project type", ProjectType::ALL.len(), 1)
        .await?;
    let project_type = ProjectType::from_choice(choice).unwrap_or(ProjectType::Nextjs);

    let description = prompter
        .ask(
            "Project description",
            &format!("A modern {} application", project_type),
        )
        .await?;
    let features = split_list(
        &prompter
            .ask("Key features (comma-separated)", DEFAULT_FEATURES)
            .await?,
    );
    let tech_stack = split_list(
        &prompter
            .ask("Additional technologies (comma-separated)", DEFAULT_TECH_STACK)
            .await?,
    );

    let setup_git = prompter.confirm("Setup Git repository?", true).await?;
    let repo_url = if setup_git {
        let url = prompter.ask("Remote repository URL (optional)", "").await?;
        (!url.is_empty()).then_some(url)
    } else {
        None
    };

    Ok(ProjectConfig {
        name,
        project_type,
        description,
        features,
        tech_stack,
        setup_git,
        repo_url,
        port,
    })
}

/// Makes sure `project_path` is an empty directory.
///
/// An existing path is only removed after the operator agrees; returns
/// `false` when they decline.
pub async fn prepare_directory<R: AsyncBufRead + Unpin>(
    project_path: &Path,
    prompter: &mut Prompter<R>,
    dry_run: bool,
) -> Result<bool> {
    if project_path.exists() {
        println!("⚠ {} already exists", project_path.display());
        if !prompter
            .confirm("Delete it and start over?", false)
            .await?
        {
            return Ok(false);
        }
        if dry_run {
            println!("[DRY RUN] Would delete {}", project_path.display());
            return Ok(true);
        }
        if project_path.is_dir() {
            fs::remove_dir_all(project_path)
        } else {
            fs::remove_file(project_path)
        }
        .with_context(|| format!("Failed to remove {}", project_path.display()))?;
    }

    if dry_run {
        println!("[DRY RUN] Would create {}", project_path.display());
        return Ok(true);
    }
    fs::create_dir_all(project_path)
        .with_context(|| format!("Failed to create {}", project_path.display()))?;
    Ok(true)
}

/// Writes the starter files for `config` into `project_path`.
pub fn generate_code(config: &ProjectConfig, project_path: &Path) -> Result<ApplyReport> {
    let template = template_for(config.project_type);
    if template.kind() != config.project_type {
        println!(
            "⚠ No dedicated {} template yet, using the {} one",
            config.project_type,
            template.kind()
        );
    }

    let plan = template.render(config);
    let report = apply(&plan, project_path, WriteMode::CreateOrOverwrite);
    if report.written_count() == 0 {
        bail!("No template files could be written: {}", report.summary());
    }
    Ok(report)
}
