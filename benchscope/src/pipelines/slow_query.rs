//! MySQL slow-query-log pipeline
//!
//! `start()` points MySQL at a fresh `{stamp}_slow_query.log` and logs every
//! query (`long_query_time = 0`). `stop()` hands the file name to the
//! analysis endpoint, which runs `pt-query-digest` over it (relative names
//! resolve against the MySQL data directory) into `digest_{file}`.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::command::{render, run_shell};
use super::{announce, endpoint_url, AnalyzerConfig, SLOW_QUERY_LOG_ENDPOINT};
use crate::client::post_json;
use crate::domain::{PipelineError, RunStamp};
use crate::profiling::SubProfiler;
use crate::publish::{Credentials, Publisher};

/// Runs SQL statements against the live database.
pub trait SqlExecutor: Send {
    /// # Errors
    /// Returns an error if the statement fails.
    fn execute(&self, statement: &str) -> Result<(), PipelineError>;
}

/// [`SqlExecutor`] driving the `mysql` command-line client.
#[derive(Debug, Clone)]
pub struct MysqlCli {
    client: String,
}

impl MysqlCli {
    /// `client` is the client invocation including connection flags,
    /// e.g. `mysql -uroot -h127.0.0.1`.
    #[must_use]
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
        }
    }
}

impl Default for MysqlCli {
    fn default() -> Self {
        Self::new("sudo mysql")
    }
}

impl SqlExecutor for MysqlCli {
    fn execute(&self, statement: &str) -> Result<(), PipelineError> {
        run_shell(&format!("{} -e \"{statement}\"", self.client))?;
        Ok(())
    }
}

/// Application-side settings for the slow-query pipeline.
#[derive(Debug, Clone, Default)]
pub struct SlowQueryLogConfig {
    /// `host:port` of the process hosting the analysis endpoint.
    pub host_addr: String,
    pub credentials: Credentials,
}

/// Body of `POST /debug/slowQueryLog`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowQueryLogRequest {
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(flatten)]
    pub credentials: Credentials,
}

/// Reconfigures the slow query log on start and requests a digest on stop.
pub struct SlowQueryLogProfiler<E> {
    config: SlowQueryLogConfig,
    executor: E,
    file_name: Option<String>,
}

impl<E: SqlExecutor> SlowQueryLogProfiler<E> {
    #[must_use]
    pub fn new(config: SlowQueryLogConfig, executor: E) -> Self {
        Self {
            config,
            executor,
            file_name: None,
        }
    }
}

/// Turn the slow query log off, for runs that aren't being profiled.
///
/// # Errors
/// Returns an error if the statement fails.
pub fn disable_slow_query_log(executor: &dyn SqlExecutor) -> Result<(), PipelineError> {
    executor.execute("SET GLOBAL slow_query_log = 0")
}

impl<E: SqlExecutor> SubProfiler for SlowQueryLogProfiler<E> {
    fn name(&self) -> &str {
        "slow-query-log"
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        let file_name = format!("{}_slow_query.log", RunStamp::now());
        info!("slow query log: {file_name}");

        self.executor.execute(&format!("SET GLOBAL slow_query_log_file = '{file_name}'"))?;
        self.executor.execute("SET GLOBAL long_query_time = 0")?;
        self.executor.execute("SET GLOBAL slow_query_log = 1")?;
        self.file_name = Some(file_name);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        let file_name = self
            .file_name
            .take()
            .ok_or_else(|| PipelineError::NotStarted(self.name().to_string()))?;
        let request = SlowQueryLogRequest {
            file_name,
            credentials: self.config.credentials.clone(),
        };
        let url = endpoint_url(&self.config.host_addr, SLOW_QUERY_LOG_ENDPOINT);
        let result = post_json(&url, &[], &request)?;
        info!("result: {}", result.trim_end());
        Ok(())
    }
}

/// Log-host side: digests a finished run's slow query log.
#[derive(Debug, Clone)]
pub struct SlowQueryAnalyzer {
    config: AnalyzerConfig,
}

impl SlowQueryAnalyzer {
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Produce (and optionally publish) the digest report.
    ///
    /// # Errors
    /// Returns an error if the file name is missing, `pt-query-digest` fails,
    /// or publishing fails.
    pub fn analyze(&self, request: &SlowQueryLogRequest) -> Result<String, PipelineError> {
        if request.file_name.is_empty() {
            return Err(PipelineError::MissingFileName("slow-query-log"));
        }
        let input = self.config.mysql_data_dir.join(&request.file_name);
        let base_name = Path::new(&request.file_name)
            .file_name()
            .map_or_else(|| request.file_name.clone(), |n| n.to_string_lossy().into_owned());

        std::fs::create_dir_all(&self.config.report_dir)?;
        let digest = self.config.report_dir.join(format!("digest_{base_name}"));
        run_shell(&render(
            &self.config.digest_command,
            &[("input", &input.display().to_string()), ("output", &digest.display().to_string())],
        ))?;

        let publisher =
            Publisher::from_credentials(&request.credentials, &self.config.gist_api_base);
        announce(publisher.as_ref(), &request.file_name, &digest, "slow-query-log digest")
    }
}
