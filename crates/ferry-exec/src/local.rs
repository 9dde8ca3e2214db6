//! Local command execution using `tokio::process`

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::config::RemoteCommandOptions;
use crate::error::ExecError;
use crate::sink::OutputSink;
use crate::traits::CommandRunner;
use crate::verdict::Verdict;

/// Run `command` through the local shell and judge the outcome
///
/// Unlike the remote executor, any stderr byte counts, whitespace included,
/// and a failed exit is reported before the stderr rule is applied.
///
/// # Errors
/// `LocalCommandFailed` if the shell cannot be spawned or exits non-zero,
/// `StdErrPolicy` if stderr is non-empty while `fail_on_stderr` is set
#[instrument(skip(sink, options), level = "debug")]
pub async fn exec_local(
    command: &str,
    sink: &dyn OutputSink,
    options: Option<&RemoteCommandOptions>,
) -> Result<(), ExecError> {
    let options = RemoteCommandOptions::resolve(options);

    debug!(command = %command, "executing local command");

    let output = shell(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| local_failure(command, format!("failed to spawn shell: {e}")))?
        .wait_with_output()
        .await
        .map_err(|e| local_failure(command, e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !stdout.is_empty() {
        sink.write_line(&stdout);
    }
    if !stderr.is_empty() {
        sink.write_error(&stderr);
    }

    if !output.status.success() {
        let reason = describe_failure(output.status);
        error!(command = %command, reason = %reason, "local command failed");
        return Err(local_failure(command, reason));
    }

    debug!(command = %command, stderr_len = stderr.len(), "local command exited with code 0");

    Verdict::decide(Some(0), !stderr.is_empty(), options.fail_on_stderr).into_result(command)
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn describe_failure(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("non-zero exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn local_failure(command: &str, reason: String) -> ExecError {
    ExecError::LocalCommandFailed {
        command: command.to_string(),
        reason,
    }
}

/// Runs commands on the local machine
#[derive(Clone)]
pub struct LocalRunner {
    sink: Arc<dyn OutputSink>,
}

impl LocalRunner {
    /// Create a new local runner writing output to `sink`
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self { sink }
    }
}

impl std::fmt::Debug for LocalRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRunner").finish_non_exhaustive()
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(
        &self,
        cmd: &str,
        options: Option<&RemoteCommandOptions>,
    ) -> Result<(), ExecError> {
        exec_local(cmd, self.sink.as_ref(), options).await
    }

    fn runner_type(&self) -> &'static str {
        "local"
    }
}
