//! CLI argument definitions

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::pipelines::{
    AnalyzerConfig, DEFAULT_ALP_COMMAND, DEFAULT_DIGEST_COMMAND, DEFAULT_KATARIBE_COMMAND,
    DEFAULT_MYSQL_DATA_DIR,
};
use crate::publish::{Credentials, GITHUB_API_BASE};

#[derive(Parser)]
#[command(
    name = "benchscope",
    about = "Browse benchmark CPU profiles and analyze access/slow-query logs",
    after_help = "\
EXAMPLES:
    benchscope serve --dir /tmp/profiles          Browse every saved run on :8080
    benchscope agent --port 8081 --strict         Host the log analysis endpoints
    benchscope preflight                          Check for alp, kataribe, pt-query-digest"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve saved CPU profiles, one session per artifact
    Serve(ServeArgs),
    /// Serve the access-log and slow-query-log analysis endpoints
    Agent(AgentArgs),
    /// Report which external analysis tools are missing
    Preflight(ToolArgs),
}

#[derive(ClapArgs)]
pub struct ServeArgs {
    /// Directory scanned (recursively) for .pprof artifacts [default: temp dir]
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
}

impl ServeArgs {
    #[must_use]
    pub fn profile_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// # Errors
    /// Returns an error if `--bind`/`--port` don't form a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.bind, self.port)
    }
}

#[derive(ClapArgs)]
pub struct AgentArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8081")]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Fail at startup if an external tool is missing
    #[arg(long)]
    pub strict: bool,

    #[command(flatten)]
    pub tools: ToolArgs,
}

impl AgentArgs {
    /// # Errors
    /// Returns an error if `--bind`/`--port` don't form a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr(&self.bind, self.port)
    }
}

/// External tool invocation and report placement.
#[derive(ClapArgs)]
pub struct ToolArgs {
    /// Where reports are written [default: temp dir]
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// MySQL data directory holding slow query logs
    #[arg(long, value_name = "DIR", default_value = DEFAULT_MYSQL_DATA_DIR)]
    pub mysql_data_dir: PathBuf,

    /// GitHub API base URL for gist uploads
    #[arg(long, value_name = "URL", default_value = GITHUB_API_BASE)]
    pub gist_api_base: String,

    /// alp command template ({input}, {routes}, {option}, {output})
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_ALP_COMMAND)]
    pub alp_command: String,

    /// kataribe command template ({input}, {conf}, {output})
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_KATARIBE_COMMAND)]
    pub kataribe_command: String,

    /// pt-query-digest command template ({input}, {output})
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_DIGEST_COMMAND)]
    pub digest_command: String,
}

impl ToolArgs {
    #[must_use]
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            report_dir: self.report_dir.clone().unwrap_or_else(std::env::temp_dir),
            mysql_data_dir: self.mysql_data_dir.clone(),
            gist_api_base: self.gist_api_base.clone(),
            alp_command: self.alp_command.clone(),
            kataribe_command: self.kataribe_command.clone(),
            digest_command: self.digest_command.clone(),
        }
    }
}

/// Report publishing credentials, usually taken from the environment.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Username for webhook messages
    #[arg(long, env = "BOT_ACCOUNT_NAME", default_value = "")]
    pub bot_name: String,

    /// Token used to create private gists
    #[arg(long, env = "GITHUB_TOKEN", default_value = "", hide_env_values = true)]
    pub github_token: String,

    /// Discord webhook receiving report links
    #[arg(long, env = "DISCORD_WEBHOOK_URL", default_value = "", hide_env_values = true)]
    pub discord_webhook_url: String,
}

impl CredentialArgs {
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.bot_name, &self.github_token, &self.discord_webhook_url)
    }
}

fn parse_addr(bind: &str, port: u16) -> Result<SocketAddr> {
    let addr = if bind.contains(':') {
        format!("[{bind}]:{port}")
    } else {
        format!("{bind}:{port}")
    };
    addr.parse().with_context(|| format!("Invalid listen address: {addr}"))
}
