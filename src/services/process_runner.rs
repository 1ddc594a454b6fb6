use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

#[derive(Debug)]
pub struct ProcessOutcome {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Runs `program args..` in `cwd` and waits at most `timeout`.
///
/// Spawn failures and non-zero exits become `AppError::ExternalProcess`,
/// an expired deadline becomes `AppError::Timeout` and the child is killed.
pub async fn run_checked<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
    cwd: &Path,
    timeout: Duration,
) -> AppResult<ProcessOutcome> {
    let program = program.as_ref();
    let label = Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned();

    debug!("Running {} in {}", label, cwd.display());
    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AppError::ExternalProcess {
            program: label.clone(),
            status: format!("failed to start: {}", e),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output.map_err(|e| AppError::ExternalProcess {
            program: label.clone(),
            status: format!("wait failed: {}", e),
        })?,
        Err(_) => {
            warn!("{} exceeded {:?}, killing it", label, timeout);
            return Err(AppError::Timeout {
                program: label,
                seconds: timeout.as_secs(),
            });
        }
    };

    let outcome = ProcessOutcome {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !outcome.status.success() {
        warn!(
            "{} failed with {}: {}",
            label,
            outcome.status,
            tail(&outcome.stderr, 10)
        );
        return Err(AppError::ExternalProcess {
            program: label,
            status: outcome.status.to_string(),
        });
    }
    debug!("{} finished: {}", label, tail(&outcome.stdout, 5));
    Ok(outcome)
}
