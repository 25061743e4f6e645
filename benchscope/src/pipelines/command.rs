//! External command invocation.
//!
//! Commands are shell templates run through `sh -c` so they can use `sudo`,
//! pipes and redirections. Placeholders are `{name}` tokens replaced verbatim
//! (no quoting; paths are expected to be shell-safe). There is no timeout: a
//! hanging tool blocks its caller.

use std::process::Command;

use log::debug;

use crate::domain::PipelineError;

/// Substitute `{name}` placeholders in a command template.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |command, (name, value)| {
        command.replace(&format!("{{{name}}}"), value)
    })
}

/// Run `command` with `sh -c` and return its combined output.
///
/// # Errors
/// Returns [`PipelineError::CommandSpawn`] if the shell can't be started and
/// [`PipelineError::CommandFailed`] (with stdout and stderr) on a non-zero exit.
pub fn run_shell(command: &str) -> Result<String, PipelineError> {
    debug!("exec: {command}");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|source| PipelineError::CommandSpawn {
            command: command.to_string(),
            source,
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(combined)
    } else {
        Err(PipelineError::CommandFailed {
            command: command.to_string(),
            output: format!("{} ({})", combined.trim_end(), output.status),
        })
    }
}
