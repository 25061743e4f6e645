//! Structured error types for benchscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the session lifecycle coordinator.
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("A profiling session is already running")]
    AlreadyRunning,

    #[error("No profiling session is running")]
    NotRunning,

    #[error("Failed to create directory {path}: {source}")]
    BaseDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CPU sampler error: {0}")]
    Sampler(#[from] pprof::Error),

    #[error("Failed to write profile {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start {name}: {source}")]
    SubProfilerStart {
        name: String,
        #[source]
        source: PipelineError,
    },
}

/// Errors raised by sub-profiler pipelines and the analysis endpoints.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to find {0} filename")]
    MissingFileName(&'static str),

    #[error("invalid run stamp {0:?}, expected YYYY_MM_DD_HH_MM_SS")]
    InvalidRunStamp(String),

    #[error("{0} was stopped before it was started")]
    NotStarted(String),

    #[error("failed to exec `{command}`: {output}")]
    CommandFailed { command: String, output: String },

    #[error("failed to spawn `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to post {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("{url} answered {status}: {body}")]
    Remote {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to upload {path}: {reason}")]
    Upload { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the multi-session serving subsystem.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to read profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to render view: {0}")]
    Render(String),

    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
