//! nginx access-log pipeline
//!
//! `start()` moves the live access log aside as `{access_log}.{stamp}` and
//! asks nginx to reopen its logs, so the fresh live file holds only the
//! traffic of this run. `stop()` hands the live file name and the run stamp
//! to the analysis endpoint, which produces:
//!
//! - `alp.log.{stamp}`: `alp ltsv` aggregation, grouped by the application's
//!   routes with dynamic segments collapsed to wildcards
//! - `kataribe.log.{stamp}`: `kataribe` report over the log converted to the
//!   `with_time` format (`access.log.kataribe.{stamp}`)
//!
//! nginx may keep writing to the moved file for a short while after the
//! rename; those lines are not analyzed.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use super::command::{render, run_shell};
use super::routes::collapse_routes;
use super::{announce, endpoint_url, ltsv, AnalyzerConfig, ACCESS_LOG_ENDPOINT};
use crate::client::post_json;
use crate::domain::{PipelineError, RunStamp};
use crate::profiling::SubProfiler;
use crate::publish::{Credentials, Publisher};

pub const NGINX_ACCESS_LOG: &str = "/var/log/nginx/access.log";
pub const DEFAULT_ROTATE_COMMAND: &str = "sudo mv {input} {output}";
pub const DEFAULT_REOPEN_COMMAND: &str = "sudo nginx -s reopen";

/// Application-side settings for the access-log pipeline.
#[derive(Debug, Clone)]
pub struct AccessLogConfig {
    pub access_log: PathBuf,
    /// `host:port` of the process hosting the analysis endpoint.
    pub host_addr: String,
    pub kataribe_conf: String,
    /// Extra arguments appended to the `alp` command line.
    pub alp_option: String,
    /// The application's route patterns (`/users/:id`, ...).
    pub routes: Vec<String>,
    pub credentials: Credentials,
    pub rotate_command: String,
    pub reopen_command: String,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            access_log: PathBuf::from(NGINX_ACCESS_LOG),
            host_addr: "127.0.0.1:80".to_string(),
            kataribe_conf: "kataribe.toml".to_string(),
            alp_option: String::new(),
            routes: Vec::new(),
            credentials: Credentials::default(),
            rotate_command: DEFAULT_ROTATE_COMMAND.to_string(),
            reopen_command: DEFAULT_REOPEN_COMMAND.to_string(),
        }
    }
}

/// Body of `POST /debug/accessLog`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessLogRequest {
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(rename = "runStamp")]
    pub run_stamp: String,
    #[serde(rename = "kataribeConfPath")]
    pub kataribe_conf_path: String,
    #[serde(rename = "alpOption")]
    pub alp_option: String,
    pub routes: Vec<String>,
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// Rotates the access log on start and requests analysis on stop.
pub struct AccessLogProfiler {
    config: AccessLogConfig,
    run: Option<RunStamp>,
}

impl AccessLogProfiler {
    #[must_use]
    pub fn new(config: AccessLogConfig) -> Self {
        Self { config, run: None }
    }

    fn rotated_path(&self, stamp: &RunStamp) -> PathBuf {
        let mut rotated = self.config.access_log.clone().into_os_string();
        rotated.push(format!(".{stamp}"));
        PathBuf::from(rotated)
    }
}

impl SubProfiler for AccessLogProfiler {
    fn name(&self) -> &str {
        "access-log"
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        let stamp = RunStamp::now();
        let live = self.config.access_log.display().to_string();
        let rotated = self.rotated_path(&stamp).display().to_string();
        info!("rotate {live} -> {rotated}");

        run_shell(&render(&self.config.rotate_command, &[("input", &live), ("output", &rotated)]))?;
        run_shell(&self.config.reopen_command)?;
        self.run = Some(stamp);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        let stamp = self
            .run
            .take()
            .ok_or_else(|| PipelineError::NotStarted(self.name().to_string()))?;
        let request = AccessLogRequest {
            file_name: self.config.access_log.display().to_string(),
            run_stamp: stamp.to_string(),
            kataribe_conf_path: self.config.kataribe_conf.clone(),
            alp_option: self.config.alp_option.clone(),
            routes: self.config.routes.clone(),
            credentials: self.config.credentials.clone(),
        };
        let url = endpoint_url(&self.config.host_addr, ACCESS_LOG_ENDPOINT);
        let result = post_json(&url, &[], &request)?;
        info!("result: {}", result.trim_end());
        Ok(())
    }
}

/// Log-host side: runs `alp` and `kataribe` over a finished run's log.
#[derive(Debug, Clone)]
pub struct AccessLogAnalyzer {
    config: AnalyzerConfig,
}

impl AccessLogAnalyzer {
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Produce (and optionally publish) both reports. Returns one summary
    /// line per report.
    ///
    /// # Errors
    /// Returns an error if the file name is missing, a tool fails, the log
    /// can't be converted, or publishing fails. `alp` runs first; its failure
    /// skips `kataribe`.
    pub fn analyze(&self, request: &AccessLogRequest) -> Result<String, PipelineError> {
        if request.file_name.is_empty() {
            return Err(PipelineError::MissingFileName("access-log"));
        }
        let stamp = if request.run_stamp.is_empty() {
            RunStamp::now()
        } else {
            RunStamp::parse(&request.run_stamp)
                .ok_or_else(|| PipelineError::InvalidRunStamp(request.run_stamp.clone()))?
        };
        let report_dir = &self.config.report_dir;
        std::fs::create_dir_all(report_dir)?;
        let publisher =
            Publisher::from_credentials(&request.credentials, &self.config.gist_api_base);

        let alp_report = report_dir.join(format!("alp.log.{stamp}"));
        run_shell(&render(
            &self.config.alp_command,
            &[
                ("input", &request.file_name),
                ("routes", &collapse_routes(&request.routes)),
                ("option", &request.alp_option),
                ("output", &alp_report.display().to_string()),
            ],
        ))?;
        let mut summary = vec![announce(
            publisher.as_ref(),
            &request.file_name,
            &alp_report,
            "access-log alp",
        )?];

        let converted = report_dir.join(format!("access.log.kataribe.{stamp}"));
        ltsv::convert_file(Path::new(&request.file_name), &converted)?;

        let kataribe_report = report_dir.join(format!("kataribe.log.{stamp}"));
        run_shell(&render(
            &self.config.kataribe_command,
            &[
                ("input", &converted.display().to_string()),
                ("conf", &request.kataribe_conf_path),
                ("output", &kataribe_report.display().to_string()),
            ],
        ))?;
        summary.push(announce(
            publisher.as_ref(),
            &converted.display().to_string(),
            &kataribe_report,
            "access-log kataribe",
        )?);

        Ok(summary.join("\n"))
    }
}
