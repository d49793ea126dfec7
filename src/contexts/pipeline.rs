use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::file_write_applier::{apply, validate_relative_path};
use super::project_snapshot::snapshot_excluding;
use super::response_interpreter::interpret;
use crate::data::{
    ApplyReport, CompletionModel, FileWritePlan, Instruction, ModelRequest, OperationKind,
    ProjectConfig, ProjectSnapshot,
};

const JSON_CONTRACT: &str = "Respond with a single JSON object and nothing else: keys are file \
paths relative to the project root, values are the complete new file contents as strings. \
Do not wrap the JSON in markdown fences.";

const ENHANCE_SYSTEM: &str = "You are a senior full-stack developer. Enhance the provided project \
with the requested features. Focus on modern best practices, clean code, and the specific \
features requested.";

const FEATURE_SYSTEM: &str = "You are a senior developer. Add the requested feature to the \
existing project. Consider the existing project structure and maintain consistency.";

const FIX_SYSTEM: &str = "You are a senior developer. Fix the described issue in the project. \
Only return files that already exist in the project.";

const EXPLAIN_SYSTEM: &str =
    "You are a senior developer. Explain this code in detail for someone learning the project.";

/// Knobs shared by every pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub timeout: Duration,
    /// Directory names left out of the snapshot sent to the model.
    pub snapshot_ignore: Vec<String>,
    /// Interpret plans but never write them.
    pub dry_run: bool,
}

/// What happened to one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The model produced no usable text; the project is untouched.
    Unavailable,
    /// The model answered but not with a valid plan; the project is untouched.
    NoPlan,
    /// Dry run: the plan that would have been applied.
    DryRun(FileWritePlan),
    Applied {
        plan: FileWritePlan,
        report: ApplyReport,
    },
    Explanation(String),
}

/// Builds the prompt pair for an instruction.
///
/// Plan-producing kinds embed the snapshot; `Explain` uses the instruction
/// text (the code to explain) verbatim as the task body.
pub fn build_request(
    instruction: &Instruction,
    snapshot: &ProjectSnapshot,
    project: Option<&ProjectConfig>,
) -> ModelRequest {
    let project_type = project
        .map(|p| p.project_type.as_str())
        .unwrap_or("unknown");

    match instruction.kind() {
        OperationKind::EnhanceInitial => {
            let mut user = format!("Enhance this {} project with the following:\n", project_type);
            if let Some(p) = project {
                user.push_str(&format!("- Project: {}\n", p.name));
                user.push_str(&format!("- Description: {}\n", p.description));
                user.push_str(&format!("- Features: {}\n", p.features.join(", ")));
                user.push_str(&format!("- Tech Stack: {}\n", p.tech_stack.join(", ")));
            }
            user.push_str(&format!(
                "\nCurrent project files:\n{}\n\n{}\n",
                snapshot.render(),
                instruction.text()
            ));
            ModelRequest::new(format!("{}\n{}", ENHANCE_SYSTEM, JSON_CONTRACT), user)
        }
        OperationKind::AddFeature => ModelRequest::new(
            format!("{}\n{}", FEATURE_SYSTEM, JSON_CONTRACT),
            format!(
                "Add this feature to the project: {}\nProject type: {}\nCurrent files:\n{}\n",
                instruction.text(),
                project_type,
                snapshot.render()
            ),
        ),
        OperationKind::FixIssue => ModelRequest::new(
            format!("{}\n{}", FIX_SYSTEM, JSON_CONTRACT),
            format!(
                "Fix this issue: {}\nProject type: {}\nCurrent files:\n{}\n",
                instruction.text(),
                project_type,
                snapshot.render()
            ),
        ),
        OperationKind::Explain => ModelRequest::new(EXPLAIN_SYSTEM, instruction.text()),
    }
}

/// Code-modification pipeline for one project:
/// snapshot → model → interpreter → applier.
pub struct ModificationPipeline<'a, M: CompletionModel> {
    model: &'a M,
    project_root: PathBuf,
    project: Option<&'a ProjectConfig>,
    settings: &'a PipelineSettings,
}

impl<'a, M: CompletionModel> ModificationPipeline<'a, M> {
    pub fn new(
        model: &'a M,
        project_root: impl Into<PathBuf>,
        project: Option<&'a ProjectConfig>,
        settings: &'a PipelineSettings,
    ) -> Self {
        Self {
            model,
            project_root: project_root.into(),
            project,
            settings,
        }
    }

    /// Runs one instruction to completion.
    pub async fn run(&self, instruction: &Instruction) -> PipelineOutcome {
        let snapshot = match instruction.kind() {
            OperationKind::Explain => ProjectSnapshot::default(),
            _ => snapshot_excluding(&self.project_root, &self.settings.snapshot_ignore),
        };
        let request = build_request(instruction, &snapshot, self.project);

        info!(
            "Running {} with {} file(s) of context",
            instruction.kind(),
            snapshot.len()
        );
        let raw = self
            .model
            .complete(
                &request.system_prompt,
                &request.user_prompt,
                self.settings.timeout,
            )
            .await;

        if raw.trim().is_empty() {
            warn!("No usable text from the model for {}", instruction.kind());
            return PipelineOutcome::Unavailable;
        }

        let Some(mode) = instruction.kind().write_mode() else {
            return PipelineOutcome::Explanation(raw);
        };

        let Some(plan) = interpret(&raw) else {
            return PipelineOutcome::NoPlan;
        };

        if self.settings.dry_run {
            return PipelineOutcome::DryRun(plan);
        }

        let report = apply(&plan, &self.project_root, mode);
        info!("{}: {}", instruction.kind(), report.summary());
        PipelineOutcome::Applied { plan, report }
    }

    /// Reads a project file and asks the model to explain it.
    pub async fn explain_file(&self, relative_path: &str) -> Result<PipelineOutcome> {
        let clean = validate_relative_path(relative_path)
            .with_context(|| format!("Refusing to read '{}'", relative_path))?;
        let full = self.project_root.join(&clean);
        let code = fs::read_to_string(&full)
            .with_context(|| format!("Failed to read {}", full.display()))?;
        let suffix = clean
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let instruction = Instruction::new(
            OperationKind::Explain,
            format!("Explain this {} file:\n\n{}", suffix, code),
        );
        Ok(self.run(&instruction).await)
    }
}
