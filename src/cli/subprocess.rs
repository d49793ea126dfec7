use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 20;

/// Result of a finished external command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    /// Last non-empty stderr line, for one-line status messages.
    pub fn short_error(&self) -> String {
        self.stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
            .unwrap_or_else(|| match self.code {
                Some(code) => format!("exit code {}", code),
                None => "terminated by signal".to_string(),
            })
    }
}

/// Runs a command to completion, killing it if it outlives `limit`.
///
/// Only spawn failures and timeouts are errors; a non-zero exit is reported
/// through [`CommandOutcome::success`].
pub async fn run_bounded(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    limit: Duration,
) -> Result<CommandOutcome> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!("Running {} {}", program, args.join(" "));
    let child = command
        .spawn()
        .with_context(|| format!("Failed to start '{}'", program))?;

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| {
            anyhow!(
                "'{} {}' did not finish within {}s",
                program,
                args.join(" "),
                limit.as_secs()
            )
        })?
        .with_context(|| format!("Failed to wait for '{}'", program))?;

    Ok(CommandOutcome {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

struct ManagedChild {
    label: String,
    child: Child,
}

/// Owns long-running children so they can be stopped on exit or interrupt.
pub struct ResourceManager {
    children: Mutex<Vec<ManagedChild>>,
    grace: Duration,
}

impl ResourceManager {
    pub fn new(grace: Duration) -> Self {
        Self {
            children: Mutex::new(Vec::new()),
            grace,
        }
    }

    pub async fn register(&self, label: impl Into<String>, child: Child) {
        let label = label.into();
        debug!("Tracking process '{}' (pid {:?})", label, child.id());
        self.children.lock().await.push(ManagedChild { label, child });
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.children.lock().await.len()
    }

    /// Terminates every registered child: SIGTERM first, SIGKILL after the grace period.
    ///
    /// Children spawned as process group leaders are signalled as a whole group.
    pub async fn shutdown(&self) {
        let mut children = self.children.lock().await;
        for mut managed in children.drain(..) {
            info!("Stopping {}", managed.label);
            terminate(&mut managed.child, self.grace).await;
        }
    }
}

async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::Signal;

        signal_tree(pid, Signal::SIGTERM);
        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Process {} exited with {}", pid, status);
                // Members of its group may have outlived the leader.
                let leader = nix::unistd::Pid::from_raw(pid as i32);
                let _ = nix::sys::signal::killpg(leader, Signal::SIGKILL);
                return;
            }
            Ok(Err(e)) => warn!("Failed to wait for {}: {}", pid, e),
            Err(_) => warn!("Process {} ignored SIGTERM, killing", pid),
        }
        signal_tree(pid, Signal::SIGKILL);
        if let Err(e) = child.wait().await {
            warn!("Failed to reap {}: {}", pid, e);
        }
        return;
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Ok(Some(status)) = child.try_wait() {
        debug!("Process already exited with {}", status);
        return;
    }
    if let Err(e) = child.kill().await {
        warn!("Failed to kill process: {}", e);
    }
}

/// Signals the process group led by `pid`, or just `pid` when it leads none.
#[cfg(unix)]
fn signal_tree(pid: u32, sig: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(pid as i32);
    match killpg(pid, sig) {
        Ok(()) => {}
        Err(Errno::ESRCH) | Err(Errno::EPERM) => match kill(pid, sig) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to send {} to {}: {}", sig, pid, e),
        },
        Err(e) => warn!("Failed to send {} to group {}: {}", sig, pid, e),
    }
}

/// Starts `<package manager> run dev` and checks that it stays up.
///
/// The server is handed to `resources` once it survives `settle`; if it
/// exits earlier the tail of its stderr is returned as the error.
pub async fn start_dev_server(
    package_manager: &str,
    project_path: &Path,
    settle: Duration,
    resources: &ResourceManager,
) -> Result<()> {
    let mut command = Command::new(package_manager);
    command
        .args(["run", "dev"])
        .current_dir(project_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own group so shutdown reaches the server the package manager forks.
    #[cfg(unix)]
    command.process_group(0);
    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to start '{} run dev'", package_manager))?;

    let tail = Arc::new(Mutex::new(Vec::<String>::new()));
    if let Some(stderr) = child.stderr.take() {
        let tail = Arc::clone(&tail);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("dev server: {}", line);
                let mut tail = tail.lock().await;
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
        });
    }

    sleep(settle).await;

    match child.try_wait() {
        Ok(None) => {
            resources.register("development server", child).await;
            Ok(())
        }
        Ok(Some(status)) => {
            // Let the reader task drain what is left.
            sleep(Duration::from_millis(100)).await;
            let tail = tail.lock().await.join("\n");
            Err(anyhow!(
                "development server exited with {}: {}",
                status,
                tail.trim()
            ))
        }
        Err(e) => Err(anyhow!("cannot check development server: {}", e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::tempdir;

    #[tokio::test]
    async fn captures_exit_code_and_output() {
        let outcome = run_bounded(
            "sh",
            &["-c", "echo out; echo oops >&2; exit 3"],
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.code, Some(3));
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.short_error(), "oops");
    }

    #[tokio::test]
    async fn runs_in_the_given_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        let outcome = run_bounded("ls", &[], Some(dir.path()), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn times_out_long_commands() {
        let started = Instant::now();
        let err = run_bounded("sleep", &["5"], None, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("did not finish"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let result = run_bounded(
            "definitely-not-a-real-program-xyz",
            &["--version"],
            None,
            Duration::from_secs(1),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn shutdown_stops_registered_children() {
        let manager = ResourceManager::new(Duration::from_secs(2));
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        manager.register("sleeper", child).await;
        assert_eq!(manager.len().await, 1);

        let started = Instant::now();
        manager.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(manager.len().await, 0);
    }

    #[tokio::test]
    async fn shutdown_kills_children_that_ignore_sigterm() {
        let manager = ResourceManager::new(Duration::from_millis(300));
        let child = Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .spawn()
            .unwrap();
        // Give the shell time to install its trap.
        sleep(Duration::from_millis(200)).await;
        manager.register("stubborn", child).await;

        let started = Instant::now();
        manager.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    fn running(pid: i32) -> bool {
        // Zombies awaiting reaping by init count as stopped.
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn shutdown_reaches_grandchildren_in_the_group() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let child = Command::new("sh")
            .args([
                "-c",
                "trap '' TERM; sleep 300 & echo $! > grandchild.pid; wait",
            ])
            .current_dir(dir.path())
            .process_group(0)
            .spawn()
            .unwrap();

        let mut grandchild = None;
        for _ in 0..50 {
            if let Ok(text) = std::fs::read_to_string(&pid_file) {
                if let Ok(pid) = text.trim().parse::<i32>() {
                    grandchild = Some(pid);
                    break;
                }
            }
            sleep(Duration::from_millis(50)).await;
        }
        let grandchild = grandchild.expect("grandchild pid written");
        assert!(running(grandchild));

        let manager = ResourceManager::new(Duration::from_millis(300));
        manager.register("group", child).await;
        manager.shutdown().await;

        let mut stopped = false;
        for _ in 0..40 {
            if !running(grandchild) {
                stopped = true;
                break;
            }
            sleep(Duration::from_millis(50)).await;
        }
        assert!(stopped, "grandchild {} still running after shutdown", grandchild);
    }

    #[tokio::test]
    async fn dev_server_that_exits_reports_stderr() {
        let dir = tempdir().unwrap();
        let manager = ResourceManager::new(Duration::from_secs(1));

        // `sh run dev` tries to execute a script named "run" that does not exist.
        let err = start_dev_server("sh", dir.path(), Duration::from_millis(500), &manager)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exited"));
        assert_eq!(manager.len().await, 0);
    }
}
