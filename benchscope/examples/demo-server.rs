//! Demo server wired up with benchscope
//!
//! A tiny user API whose benchmark runs are profiled end to end:
//! - `POST /initialize` arms idle detection and starts CPU capture
//! - every request feeds the idle detector
//! - once traffic stops, the run's profile is registered as a new session on
//!   the profile server and the optional log pipelines are stopped
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example demo-server
//!
//! # In another terminal: start a run and generate load
//! curl -X POST http://localhost:3000/initialize
//! hey -n 5000 -c 20 -m POST -H "Content-Type: application/json" \
//!     -d '{"name":"a","email":"a@example.com"}' http://localhost:3000/users
//!
//! # A few seconds after the load stops:
//! open http://localhost:8080/flamegraph     # redirects to the latest run
//! ```
//!
//! With nginx and MySQL on the same host, add
//! `--access-log-host 127.0.0.1:3000 --slow-query-host 127.0.0.1:3000 --mysql-client "sudo mysql"`
//! (the analysis endpoints are mounted on this server).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use clap::Parser;
use log::{error, info};
use serde::{Deserialize, Serialize};

use benchscope::cli::CredentialArgs;
use benchscope::detection::{track_requests, FinishNotifier, NotifierConfig};
use benchscope::pipelines::{
    analysis_router, disable_slow_query_log, AccessLogConfig, AccessLogProfiler, AnalyzerConfig,
    MysqlCli, SlowQueryLogConfig, SlowQueryLogProfiler,
};
use benchscope::profiling::Profiler;

const ROUTES: &[&str] = &["/initialize", "/users", "/users/:id"];

#[derive(Parser)]
#[command(name = "demo-server", about = "Demo API profiled with benchscope")]
struct DemoArgs {
    /// Application port
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Profile browser port
    #[arg(long, default_value = "8080")]
    profile_port: u16,

    /// Where CPU profiles are written [default: temp dir]
    #[arg(long, value_name = "DIR")]
    profile_dir: Option<PathBuf>,

    /// Seconds without requests after which a run is finished
    #[arg(long, default_value = "3")]
    idle_secs: u64,

    /// Enable the access-log pipeline, analyzed by the endpoint at HOST:PORT
    #[arg(long, value_name = "HOST:PORT")]
    access_log_host: Option<String>,

    /// Enable the slow-query-log pipeline, analyzed by the endpoint at HOST:PORT
    #[arg(long, value_name = "HOST:PORT", requires = "mysql_client")]
    slow_query_host: Option<String>,

    /// mysql client invocation used to reconfigure the slow query log
    #[arg(long, value_name = "COMMAND")]
    mysql_client: Option<String>,

    #[command(flatten)]
    credentials: CredentialArgs,
}

#[derive(Deserialize, Serialize)]
struct User {
    name: String,
    email: String,
}

type SharedProfiler = Arc<Mutex<Profiler>>;

async fn initialize(
    Extension(notifier): Extension<FinishNotifier>,
    Extension(profiler): Extension<SharedProfiler>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    notifier.arm();
    let started = tokio::task::spawn_blocking(move || {
        profiler.lock().unwrap_or_else(std::sync::PoisonError::into_inner).start()
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match started {
        Ok(artifact) => info!("profiling run into {}", artifact.display()),
        Err(e) => {
            error!("{e}");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    }
    Ok(Json(serde_json::json!({})))
}

// Some CPU work so the flame graph has something to show
async fn create_user(Json(user): Json<User>) -> (StatusCode, Json<User>) {
    let mut digest = user.email.clone();
    for _ in 0..2_000 {
        digest = digest.chars().rev().collect();
    }
    (StatusCode::CREATED, Json(User {
        name: user.name,
        email: digest,
    }))
}

async fn get_user(Path(id): Path<u64>) -> Json<User> {
    Json(User {
        name: format!("user{id}"),
        email: format!("user{id}@example.com"),
    })
}

fn build_profiler(args: &DemoArgs) -> Result<Profiler> {
    let mut profiler = Profiler::new(args.profile_dir.clone().unwrap_or_default());
    let credentials = args.credentials.credentials();

    if let Some(host) = &args.slow_query_host {
        let client = MysqlCli::new(args.mysql_client.clone().unwrap_or_default());
        profiler.add_profiler(SlowQueryLogProfiler::new(
            SlowQueryLogConfig {
                host_addr: host.clone(),
                credentials: credentials.clone(),
            },
            client,
        ));
    } else if let Some(client) = &args.mysql_client {
        disable_slow_query_log(&MysqlCli::new(client.clone()))
            .context("failed to disable slow_query_log")?;
    }

    if let Some(host) = &args.access_log_host {
        profiler.add_profiler(AccessLogProfiler::new(AccessLogConfig {
            host_addr: host.clone(),
            routes: ROUTES.iter().map(ToString::to_string).collect(),
            credentials,
            ..AccessLogConfig::default()
        }));
    }
    Ok(profiler)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = DemoArgs::parse();

    let profiler = Arc::new(Mutex::new(build_profiler(&args)?));
    let sessions = profiler
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .session_server();

    let on_finished = {
        let profiler = Arc::clone(&profiler);
        move || {
            println!("benchmark finished");
            let mut profiler = profiler.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Err(e) = profiler.stop() {
                error!("{e}");
            }
        }
    };
    let config = NotifierConfig {
        idle_threshold: Duration::from_secs(args.idle_secs),
        ..NotifierConfig::default()
    };
    let notifier = FinishNotifier::spawn(config, on_finished).context("failed to spawn notifier")?;

    let profile_addr = SocketAddr::from(([0, 0, 0, 0], args.profile_port));
    tokio::spawn(async move {
        if let Err(e) = sessions.serve(profile_addr).await {
            error!("profile server stopped: {e}");
        }
    });

    let app = Router::new()
        .route("/initialize", post(initialize))
        .route("/users", post(create_user))
        .route("/users/:id", get(get_user))
        .merge(analysis_router(AnalyzerConfig::default()))
        .layer(Extension(Arc::clone(&profiler)))
        .layer(Extension(notifier.clone()))
        .layer(axum::middleware::from_fn_with_state(notifier, track_requests));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to listen on port {}", args.port))?;
    println!("Demo server listening on http://localhost:{}", args.port);
    println!("Profiles browsable on http://localhost:{}", args.profile_port);
    println!();
    println!("Start a run with:");
    println!("  curl -X POST http://localhost:{}/initialize", args.port);
    axum::serve(listener, app).await?;
    Ok(())
}
