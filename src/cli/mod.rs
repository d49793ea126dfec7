use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{debug, warn};

mod command;
mod git;
mod progress;
mod prompt;
mod scaffold;
mod subprocess;

use command::ReplCommand;
use git::GitIdentity;
use progress::{ProgressIndicator, StepStatus};
use prompt::Prompter;
use subprocess::{run_bounded, start_dev_server};

pub use subprocess::ResourceManager;

use autonomy::config::AppConfig;
use autonomy::contexts::{
    ModificationPipeline, OllamaClient, PipelineOutcome, PipelineSettings, snapshot_excluding,
};
use autonomy::data::{ApplyReport, CompletionModel, Instruction, OperationKind, ProjectConfig};
use autonomy::memory::{FileDigest, SessionMemory, digest_files};
use autonomy::registries::{ModelPreferences, template_for};

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
}

const MEMORY_PROJECT_CONFIG: &str = "project_config";
const MEMORY_PROJECT_PATH: &str = "project_path";
const MEMORY_MODEL: &str = "model";

const CODE_EXTENSIONS: [&str; 5] = ["js", "jsx", "ts", "tsx", "py"];
const MANIFEST_FILE: &str = "package.json";

const ENHANCE_REQUEST: &str =
    "Please enhance the code to include the requested features and improve the overall architecture.";

/// Full session: create a project, then enter the command loop.
pub async fn run_new(app: &AppConfig, config: Config, resources: Arc<ResourceManager>) -> Result<()> {
    print_banner();
    let model = startup(app, config).await?;
    let memory = SessionMemory::load(&app.memory_path);
    let prompter = Prompter::new(BufReader::new(tokio::io::stdin()));

    let workspace = std::env::current_dir().context("Failed to determine working directory")?;

    let mut session = Session::new(app, config, model, memory, resources, prompter);
    if session.create_project(&workspace).await? {
        session.interactive_loop().await?;
    }
    println!("Goodbye!");
    Ok(())
}

/// Re-opens the project recorded in the memory file and enters the command loop.
pub async fn run_resume(
    app: &AppConfig,
    config: Config,
    resources: Arc<ResourceManager>,
) -> Result<()> {
    print_banner();
    let memory = SessionMemory::load(&app.memory_path);
    let Some(path) = memory.recall::<PathBuf>(MEMORY_PROJECT_PATH) else {
        bail!(
            "No project recorded in {}; run `autonomy new` first",
            app.memory_path.display()
        );
    };
    if !path.is_dir() {
        bail!("Recorded project {} no longer exists", path.display());
    }

    let model = startup(app, config).await?;
    let prompter = Prompter::new(BufReader::new(tokio::io::stdin()));
    let mut session = Session::new(app, config, model, memory, resources, prompter);
    session.project = session.memory.recall(MEMORY_PROJECT_CONFIG);
    session.project_path = Some(path.clone());
    println!("✓ Resumed project at {}", path.display());

    session.interactive_loop().await?;
    println!("Goodbye!");
    Ok(())
}

fn print_banner() {
    let title = format!("autonomy v{}", env!("CARGO_PKG_VERSION"));
    println!("╔{}╗", "═".repeat(60));
    println!("║{:^60}║", title);
    println!("║{:^60}║", "Conversational web-project assistant");
    println!("║{:^60}║", "build · fix · explain · deploy");
    println!("╚{}╝", "═".repeat(60));
    println!();
}

/// Connects to the inference endpoint and checks the external tools.
async fn startup(app: &AppConfig, config: Config) -> Result<OllamaClient> {
    println!("Connecting to inference endpoint at {}", app.endpoint);
    let preferences = ModelPreferences::new(&app.models);
    let (client, choice) =
        OllamaClient::connect(&app.endpoint, preferences.candidates(), app.sampling.clone())
            .await
            .context("Inference endpoint unavailable")?;

    if choice.fallback {
        println!(
            "⚠ None of the preferred models are installed; falling back to {}",
            choice.name
        );
    } else {
        println!("✓ Using model {}", choice.name);
    }

    check_tools(app, config).await?;
    Ok(client)
}

async fn check_tools(app: &AppConfig, config: Config) -> Result<()> {
    let mut tools = vec!["node", app.package_manager.as_str(), "git"];
    tools.dedup();

    let mut missing = Vec::new();
    for tool in tools {
        match run_bounded(tool, &["--version"], None, app.probe_timeout()).await {
            Ok(outcome) if outcome.success => {
                if config.verbose {
                    println!("  {} {}", tool, outcome.stdout.trim());
                }
            }
            Ok(outcome) => {
                debug!("{} --version failed: {}", tool, outcome.short_error());
                missing.push(tool);
            }
            Err(e) => {
                debug!("{} --version failed: {:#}", tool, e);
                missing.push(tool);
            }
        }
    }

    if !missing.is_empty() {
        bail!("Missing required tools: {}", missing.join(", "));
    }
    println!("✓ Required tools found");
    Ok(())
}

struct Session<'a, M, R> {
    app: &'a AppConfig,
    config: Config,
    model: M,
    memory: SessionMemory,
    resources: Arc<ResourceManager>,
    prompter: Prompter<R>,
    settings: PipelineSettings,
    project: Option<ProjectConfig>,
    project_path: Option<PathBuf>,
}

impl<'a, M, R> Session<'a, M, R>
where
    M: CompletionModel,
    R: AsyncBufRead + Unpin,
{
    fn new(
        app: &'a AppConfig,
        config: Config,
        model: M,
        memory: SessionMemory,
        resources: Arc<ResourceManager>,
        prompter: Prompter<R>,
    ) -> Self {
        let settings = PipelineSettings {
            timeout: app.request_timeout(),
            snapshot_ignore: app.snapshot_ignore.clone(),
            dry_run: config.dry_run,
        };
        Self {
            app,
            config,
            model,
            memory,
            resources,
            prompter,
            settings,
            project: None,
            project_path: None,
        }
    }

    /// Gathers requirements and builds the project under `workspace`.
    /// Returns `false` if the operator backed out.
    async fn create_project(&mut self, workspace: &Path) -> Result<bool> {
        let project = scaffold::gather_requirements(&mut self.prompter, self.app.dev_server_port)
            .await?;
        let project_path = workspace.join(&project.name);

        if !scaffold::prepare_directory(&project_path, &mut self.prompter, self.config.dry_run)
            .await?
        {
            println!("Existing directory left untouched");
            return Ok(false);
        }

        self.memory.remember(MEMORY_PROJECT_CONFIG, &project)?;
        self.memory.remember(MEMORY_PROJECT_PATH, &project_path)?;
        self.memory.remember(MEMORY_MODEL, &self.model.model_name())?;
        self.commit_memory();
        self.project = Some(project.clone());
        self.project_path = Some(project_path.clone());

        let mut progress = ProgressIndicator::new(if project.setup_git { 4 } else { 3 });

        progress.start_step("Generating project files");
        progress.finish_step(self.generate_files(&project, &project_path)?);

        progress.start_step(&format!("Enhancing with {}", self.model.model_name()));
        let enhance = Instruction::new(OperationKind::EnhanceInitial, ENHANCE_REQUEST);
        let outcome = self.pipeline(&project_path).run(&enhance).await;
        progress.finish_step(self.report_outcome(&enhance, outcome, &project_path));

        progress.start_step("Installing dependencies");
        progress.finish_step(self.install_dependencies(&project_path).await);

        if project.setup_git {
            progress.start_step("Setting up Git");
            progress.finish_step(self.setup_git(&project, &project_path).await);
        }

        progress.finish();

        println!("\n✓ Project '{}' created", project.name);
        println!("  Location: {}", project_path.display());

        if self
            .prompter
            .confirm("Start development server?", true)
            .await?
        {
            self.run_dev_server(&project_path).await;
        }
        Ok(true)
    }

    fn generate_files(&mut self, project: &ProjectConfig, project_path: &Path) -> Result<StepStatus> {
        if self.config.dry_run {
            let plan = template_for(project.project_type).render(project);
            for path in plan.paths() {
                println!("[DRY RUN] Would write {}", path);
            }
            return Ok(StepStatus::Skipped);
        }

        let report = scaffold::generate_code(project, project_path)?;
        println!("✓ {}", report.summary());
        let digests = digest_files(project_path, report.written.iter().map(String::as_str));
        self.record("create_project", Some(&project.name), digests);
        Ok(if report.has_problems() {
            StepStatus::Warning
        } else {
            StepStatus::Done
        })
    }

    async fn install_dependencies(&mut self, project_path: &Path) -> StepStatus {
        let pm = self.app.package_manager.as_str();
        if self.config.dry_run {
            println!("[DRY RUN] Would run: {} install --legacy-peer-deps", pm);
            return StepStatus::Skipped;
        }

        let result = run_bounded(
            pm,
            &["install", "--legacy-peer-deps"],
            Some(project_path),
            self.app.install_timeout(),
        )
        .await;
        let failure = match result {
            Ok(outcome) if outcome.success => {
                println!("✓ Dependencies installed");
                self.record("install_dependencies", None, Vec::new());
                return StepStatus::Done;
            }
            Ok(outcome) => outcome.short_error(),
            Err(e) => format!("{:#}", e),
        };
        warn!("Dependency installation failed: {}", failure);
        println!(
            "⚠ Dependency installation failed, but the project is created: {}",
            failure
        );
        StepStatus::Warning
    }

    async fn setup_git(&mut self, project: &ProjectConfig, project_path: &Path) -> StepStatus {
        if self.config.dry_run {
            println!("[DRY RUN] Would initialize a Git repository and commit");
            if let Some(url) = &project.repo_url {
                println!("[DRY RUN] Would push to {}", url);
            }
            return StepStatus::Skipped;
        }

        let identity = GitIdentity {
            name: self.app.git_user_name.clone(),
            email: self.app.git_user_email.clone(),
        };
        let report = git::bootstrap(project, project_path, &identity, self.app.vcs_timeout()).await;
        for warning in &report.warnings {
            println!("⚠ {}", warning);
        }
        if report.committed {
            println!("✓ Git repository initialized");
            self.record("git_init", None, Vec::new());
        }
        if report.pushed {
            if let Some(url) = &project.repo_url {
                println!("✓ Pushed to {}", url);
            }
        }
        if report.warnings.is_empty() {
            StepStatus::Done
        } else {
            StepStatus::Warning
        }
    }

    async fn run_dev_server(&mut self, project_path: &Path) {
        let pm = self.app.package_manager.as_str();
        if self.config.dry_run {
            println!("[DRY RUN] Would run: {} run dev", pm);
            return;
        }

        println!("Starting development server...");
        let settle = std::time::Duration::from_secs(self.app.dev_server_check_secs);
        match start_dev_server(pm, project_path, settle, &self.resources).await {
            Ok(()) => {
                println!("✓ Development server started");
                println!("  Visit http://localhost:{} to view your app", self.port());
            }
            Err(e) => eprintln!("✗ {:#}", e),
        }
    }

    fn port(&self) -> u16 {
        self.project
            .as_ref()
            .map(|p| p.port)
            .unwrap_or(self.app.dev_server_port)
    }

    async fn interactive_loop(&mut self) -> Result<()> {
        println!("\n{}", command::HELP);
        loop {
            let Some(line) = self.prompter.line("\nCommand> ").await? else {
                break;
            };

            let result = match command::parse(&line) {
                ReplCommand::Exit => break,
                ReplCommand::Empty => continue,
                ReplCommand::Help => {
                    println!("{}", command::HELP);
                    Ok(())
                }
                ReplCommand::AddFeature => {
                    self.modify(OperationKind::AddFeature, "Describe the feature to add")
                        .await
                }
                ReplCommand::FixIssue => {
                    self.modify(
                        OperationKind::FixIssue,
                        "Describe the issue or paste the error message",
                    )
                    .await
                }
                ReplCommand::Explain => self.explain_code().await,
                ReplCommand::Deploy => {
                    self.deploy_guide();
                    Ok(())
                }
                ReplCommand::Status => self.show_status(),
                ReplCommand::Feedback => self.collect_feedback().await,
                ReplCommand::Unknown(input) => {
                    eprintln!("✗ Unknown command '{}'. Type 'help' for the list.", input);
                    Ok(())
                }
            };

            if let Err(e) = result {
                eprintln!("✗ {:#}", e);
            }
        }
        Ok(())
    }

    fn require_project(&self) -> Result<PathBuf> {
        self.project_path.clone().context("No active project")
    }

    fn pipeline(&self, project_path: &Path) -> ModificationPipeline<'_, M> {
        ModificationPipeline::new(
            &self.model,
            project_path,
            self.project.as_ref(),
            &self.settings,
        )
    }

    async fn modify(&mut self, kind: OperationKind, question: &str) -> Result<()> {
        let project_path = self.require_project()?;
        let text = self.prompter.ask(question, "").await?;
        if text.is_empty() {
            println!("Nothing to do");
            return Ok(());
        }

        let instruction = Instruction::new(kind, text);
        println!("Working on it with {}...", self.model.model_name());
        let outcome = self.pipeline(&project_path).run(&instruction).await;
        self.report_outcome(&instruction, outcome, &project_path);
        Ok(())
    }

    fn report_outcome(
        &mut self,
        instruction: &Instruction,
        outcome: PipelineOutcome,
        project_path: &Path,
    ) -> StepStatus {
        match outcome {
            PipelineOutcome::Unavailable => {
                println!("⚠ AI enhancement unavailable; the project was not changed");
                StepStatus::Warning
            }
            PipelineOutcome::NoPlan => {
                println!("⚠ The model did not return a usable file plan; the project was not changed");
                StepStatus::Warning
            }
            PipelineOutcome::DryRun(plan) => {
                println!("[DRY RUN] Would write {} file(s):", plan.len());
                for path in plan.paths() {
                    println!("  {}", path);
                }
                StepStatus::Skipped
            }
            PipelineOutcome::Applied { report, .. } => {
                print_apply_report(&report);
                let digests =
                    digest_files(project_path, report.written.iter().map(String::as_str));
                self.record(instruction.kind().label(), Some(instruction.text()), digests);
                if report.has_problems() {
                    StepStatus::Warning
                } else {
                    StepStatus::Done
                }
            }
            PipelineOutcome::Explanation(text) => {
                println!("{}", text.trim());
                StepStatus::Done
            }
        }
    }

    async fn explain_code(&mut self) -> Result<()> {
        let project_path = self.require_project()?;
        let files: Vec<String> = snapshot_excluding(&project_path, &self.app.snapshot_ignore)
            .paths()
            .iter()
            .filter(|p| is_code_file(p))
            .cloned()
            .collect();
        if files.is_empty() {
            bail!("No code files found");
        }

        println!("\nAvailable files:");
        for (i, file) in files.iter().enumerate() {
            println!("{}. {}", i + 1, file);
        }
        let choice = self
            .prompter
            .choose("Choose file to explain", files.len(), 1)
            .await?;
        let file = &files[choice - 1];

        let outcome = self.pipeline(&project_path).explain_file(file).await?;
        match outcome {
            PipelineOutcome::Explanation(text) => {
                println!("\n── {} ──", file);
                println!("{}", text.trim());
            }
            _ => println!("⚠ No explanation available"),
        }
        Ok(())
    }

    fn deploy_guide(&self) {
        println!(
            "Deployment guide

1. Prepare
   - Make sure the project builds: {pm} run build
   - Test the production build locally: {pm} start

2. Host
   - Upload the project or connect the Git repository to your hosting provider
   - Use a Node.js runtime image or template

3. Container
   - Expose port {port}
   - Startup command: {pm} start
   - Configure health checks

4. Environment
   - NODE_ENV=production
   - PORT={port}
   - Any app-specific variables

5. Scale
   - Enable auto-scaling where available
   - Monitor performance metrics
   - Add load balancing if needed",
            pm = self.app.package_manager,
            port = self.port()
        );
    }

    fn show_status(&self) -> Result<()> {
        let project_path = self.require_project()?;
        let mut rows: Vec<(&str, String)> = Vec::new();

        if let Some(project) = &self.project {
            rows.push(("Name", project.name.clone()));
            rows.push(("Type", project.project_type.to_string()));
            rows.push(("Description", project.description.clone()));
            rows.push(("Features", project.features.join(", ")));
            rows.push(("Tech Stack", project.tech_stack.join(", ")));
        }
        rows.push(("Location", project_path.display().to_string()));
        rows.push((
            "Files",
            snapshot_excluding(&project_path, &self.app.snapshot_ignore)
                .len()
                .to_string(),
        ));
        rows.push((
            "Dependencies",
            if project_path.join(MANIFEST_FILE).is_file() {
                "✓ Configured".to_string()
            } else {
                "✗ Missing".to_string()
            },
        ));
        rows.push(("Model", self.model.model_name().to_string()));
        rows.push(("Operations", self.memory.history().len().to_string()));

        println!("\nProject status");
        println!("{}", "-".repeat(60));
        for (key, value) in rows {
            println!("{:<14}{}", key, value);
        }
        println!("{}", "-".repeat(60));
        Ok(())
    }

    async fn collect_feedback(&mut self) -> Result<()> {
        let feedback = self.prompter.ask("Your feedback", "").await?;
        if feedback.is_empty() {
            return Ok(());
        }
        self.memory.add_feedback(&feedback);
        self.commit_memory();
        println!("✓ Thanks, feedback saved");
        Ok(())
    }

    fn record(&mut self, action: &str, detail: Option<&str>, files: Vec<FileDigest>) {
        self.memory.log(action, detail, files);
        self.commit_memory();
    }

    fn commit_memory(&self) {
        if self.config.dry_run {
            debug!("Dry run: not saving memory");
            return;
        }
        if let Err(e) = self.memory.commit() {
            warn!("Could not save memory: {:#}", e);
            eprintln!("⚠ Could not save memory: {:#}", e);
        }
    }
}

fn print_apply_report(report: &ApplyReport) {
    for path in &report.written {
        println!("✓ {}", path);
    }
    for path in &report.skipped {
        println!("⊚ Skipped {} (file does not exist)", path);
    }
    for (path, reason) in &report.rejected {
        println!("✗ Rejected {}: {}", path, reason);
    }
    for (path, error) in &report.failed {
        println!("✗ Failed {}: {}", path, error);
    }
    println!("{}", report.summary());
}

fn is_code_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| CODE_EXTENSIONS.contains(&e))
}
