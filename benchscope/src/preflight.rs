//! Pre-flight checks for the analysis agent
//!
//! The analysis endpoints shell out to external tools (`alp`, `kataribe`,
//! `pt-query-digest`, usually through `sudo`). A missing tool only shows up
//! when a benchmark finishes, so check for them before accepting requests.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::warn;

use crate::pipelines::AnalyzerConfig;

/// Run all pre-flight checks before serving the analysis endpoints.
///
/// With `strict`, missing tools are an error; otherwise they are reported as
/// warnings (unless `quiet`).
pub fn run_preflight_checks(config: &AnalyzerConfig, strict: bool, quiet: bool) -> Result<()> {
    check_report_dir(&config.report_dir)?;

    let missing = check_tools(&required_tools(config));
    if missing.is_empty() {
        return Ok(());
    }
    if strict {
        bail!(
            "Missing external tools: {}\n\n\
             Install them or adjust the command templates.",
            missing.join(", ")
        );
    }
    if !quiet {
        for tool in &missing {
            warn!("{tool} not found on PATH, the matching report will fail");
        }
    }
    Ok(())
}

/// Programs invoked by the configured command templates, in first-seen order.
#[must_use]
pub fn required_tools(config: &AnalyzerConfig) -> Vec<String> {
    let mut tools: Vec<String> = Vec::new();
    for template in [&config.alp_command, &config.kataribe_command, &config.digest_command] {
        for stage in template.split(['|', ';', '&']) {
            let mut words = stage.split_whitespace();
            let Some(mut program) = words.next() else { continue };
            if program == "sudo" {
                push_unique(&mut tools, program);
                let Some(next) = words.find(|w| !w.starts_with('-')) else { continue };
                program = next;
            }
            push_unique(&mut tools, program);
        }
    }
    tools
}

fn push_unique(tools: &mut Vec<String>, program: &str) {
    if !tools.iter().any(|t| t == program) {
        tools.push(program.to_string());
    }
}

/// Tools from `tools` that can't be found on `PATH`.
#[must_use]
pub fn check_tools<S: AsRef<str>>(tools: &[S]) -> Vec<String> {
    tools
        .iter()
        .map(|t| t.as_ref())
        .filter(|t| find_in_path(t).is_none())
        .map(str::to_string)
        .collect()
}

/// Locate an executable the way the shell would.
#[must_use]
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        return path.is_file().then(|| path.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).map(|dir| dir.join(program)).find(|candidate| candidate.is_file())
}

/// Check that reports can be written
fn check_report_dir(report_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(report_dir)
        .with_context(|| format!("Cannot create report directory {}", report_dir.display()))?;
    let metadata = std::fs::metadata(report_dir)
        .with_context(|| format!("Cannot read report directory {}", report_dir.display()))?;
    if metadata.permissions().readonly() {
        bail!(
            "Report directory is read-only: {}\n\n\
             Pass --report-dir with a writable location.",
            report_dir.display()
        );
    }
    Ok(())
}
