//! Auxiliary sub-profiler pipelines
//!
//! Each pipeline is split across two processes:
//!
//! ```text
//!  application host                         log host (nginx / MySQL)
//!  ┌──────────────────────┐  POST JSON      ┌───────────────────────────┐
//!  │ SubProfiler.start()  │                 │ analysis endpoint         │
//!  │   rotate / reconfig  │                 │   external tools → report │
//!  │ SubProfiler.stop()  ─┼────────────────▶│   gist upload (optional)  │
//!  │                      │◀── text / 500 ──┼─  webhook post (optional) │
//!  └──────────────────────┘                 └───────────────────────────┘
//! ```
//!
//! - [`access_log`]: nginx access log → `alp` and `kataribe` reports
//! - [`slow_query`]: MySQL slow query log → `pt-query-digest` report
//! - [`endpoints`]: axum routes hosting both analyzers
//! - [`command`], [`ltsv`], [`routes`]: shared helpers

pub mod access_log;
pub mod command;
pub mod endpoints;
pub mod ltsv;
pub mod routes;
pub mod slow_query;

use std::path::{Path, PathBuf};

use log::info;

pub use access_log::{AccessLogAnalyzer, AccessLogConfig, AccessLogProfiler, AccessLogRequest};
pub use endpoints::analysis_router;
pub use slow_query::{
    disable_slow_query_log, MysqlCli, SlowQueryAnalyzer, SlowQueryLogConfig, SlowQueryLogProfiler,
    SlowQueryLogRequest, SqlExecutor,
};

use crate::domain::PipelineError;
use crate::publish::{Publisher, GITHUB_API_BASE};

pub const ACCESS_LOG_ENDPOINT: &str = "/debug/accessLog";
pub const SLOW_QUERY_LOG_ENDPOINT: &str = "/debug/slowQueryLog";

pub const DEFAULT_ALP_COMMAND: &str =
    r#"sudo alp ltsv --file {input} -r -m "{routes}" {option} > {output}"#;
pub const DEFAULT_KATARIBE_COMMAND: &str = "sudo cat {input} | kataribe -conf {conf} > {output}";
pub const DEFAULT_DIGEST_COMMAND: &str = "sudo pt-query-digest {input} > {output}";
pub const DEFAULT_MYSQL_DATA_DIR: &str = "/var/lib/mysql";

/// Settings for the log-host side of the pipelines.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Where reports and converted logs are written.
    pub report_dir: PathBuf,
    /// Relative slow-query log names are resolved against this directory.
    pub mysql_data_dir: PathBuf,
    pub gist_api_base: String,
    pub alp_command: String,
    pub kataribe_command: String,
    pub digest_command: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            report_dir: std::env::temp_dir(),
            mysql_data_dir: PathBuf::from(DEFAULT_MYSQL_DATA_DIR),
            gist_api_base: GITHUB_API_BASE.to_string(),
            alp_command: DEFAULT_ALP_COMMAND.to_string(),
            kataribe_command: DEFAULT_KATARIBE_COMMAND.to_string(),
            digest_command: DEFAULT_DIGEST_COMMAND.to_string(),
        }
    }
}

/// `http://{host_addr}{endpoint}`, tolerating a scheme or trailing slash on the host.
#[must_use]
pub fn endpoint_url(host_addr: &str, endpoint: &str) -> String {
    let host = host_addr.trim_start_matches("http://").trim_end_matches('/');
    format!("http://{host}{endpoint}")
}

/// Publish `report` if credentials allow; returns the summary line either way.
fn announce(
    publisher: Option<&Publisher>,
    title: &str,
    report: &Path,
    label: &str,
) -> Result<String, PipelineError> {
    match publisher {
        Some(publisher) => {
            let url = publisher.publish(title, report, label)?;
            Ok(format!("{label}: {url}"))
        }
        None => {
            info!("{label}: {}", report.display());
            Ok(format!("{label}: {}", report.display()))
        }
    }
}
