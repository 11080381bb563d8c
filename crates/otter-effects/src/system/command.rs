//! Subprocess helper shared by the package and service backends.

use std::process::Output;
use tokio::process::Command;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub(crate) struct CommandOutput {
    pub(crate) success: bool,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl CommandOutput {
    /// Best diagnostic text: stderr when present, else stdout.
    pub(crate) fn diagnostic(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        text.trim().to_string()
    }
}

/// Run `program` to completion, capturing its output.
pub(crate) async fn run(
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
) -> Result<CommandOutput, String> {
    tracing::debug!(program, ?args, "running command");
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    for (key, value) in env {
        command.env(key, value);
    }
    command
        .output()
        .await
        .map(CommandOutput::from)
        .map_err(|e| format!("failed to run {program}: {e}"))
}
