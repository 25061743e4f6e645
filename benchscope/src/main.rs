//! # benchscope - Main Entry Point
//!
//! Supports three subcommands:
//! - **serve** (`serve --dir <DIR>`): browse every saved CPU profile, one session per file
//! - **agent** (`agent --port <PORT>`): host the log analysis endpoints on the log host
//! - **preflight**: check that the external analysis tools are installed
//!
//! Live capture is a library concern: the application embeds
//! [`benchscope::profiling::Profiler`] (see `examples/demo-server.rs`).

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use benchscope::cli::{AgentArgs, Args, Command, ServeArgs, ToolArgs};
use benchscope::pipelines::analysis_router;
use benchscope::preflight::{find_in_path, required_tools, run_preflight_checks};
use benchscope::serving::SessionServer;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("read-only") {
        EXIT_NOPERM
    } else if msg.contains("invalid listen address") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    if !quiet {
        println!("benchscope v{}", env!("CARGO_PKG_VERSION"));
    }

    match args.command {
        Command::Serve(serve) => run_serve(&serve, quiet).await,
        Command::Agent(agent) => run_agent(&agent, quiet).await,
        Command::Preflight(tools) => run_preflight(&tools, quiet),
    }
}

async fn run_serve(args: &ServeArgs, quiet: bool) -> Result<()> {
    let addr = args.listen_addr()?;
    let dir = args.profile_dir();
    if !quiet {
        println!("profiles: {}", dir.display());
        println!("listen: http://{addr}");
    }

    let server = Arc::new(SessionServer::new(dir));
    tokio::select! {
        result = server.serve(addr) => result.context("Profile server failed")?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
    Ok(())
}

async fn run_agent(args: &AgentArgs, quiet: bool) -> Result<()> {
    let addr = args.listen_addr()?;
    let config = args.tools.analyzer_config();
    run_preflight_checks(&config, args.strict, quiet)?;

    if !quiet {
        println!("reports: {}", config.report_dir.display());
        println!("listen: http://{addr}");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to listen on {addr}"))?;
    tokio::select! {
        result = axum::serve(listener, analysis_router(config)) => {
            result.context("Analysis server failed")?;
        }
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
    Ok(())
}

fn run_preflight(args: &ToolArgs, quiet: bool) -> Result<()> {
    let config = args.analyzer_config();
    let mut missing = Vec::new();
    for tool in required_tools(&config) {
        match find_in_path(&tool) {
            Some(path) => {
                if !quiet {
                    println!("ok      {tool} ({})", path.display());
                }
            }
            None => {
                println!("missing {tool}");
                missing.push(tool);
            }
        }
    }
    if !missing.is_empty() {
        bail!("Missing external tools: {}", missing.join(", "));
    }
    Ok(())
}
