//! # Session Lifecycle Coordinator
//!
//! Composes CPU capture and any number of [`SubProfiler`]s into one
//! start/stop pair per benchmark run.
//!
//! ## Start: fail-fast
//!
//! ```text
//! create base dir → start CPU sampler → sub[0].start() → sub[1].start() → ...
//!                                              │ error
//!                                              ▼
//!                              discard sampler, return error
//! ```
//!
//! A sub-profiler that fails to start aborts the run: later sub-profilers are
//! not started and the CPU sampler is dropped without writing an artifact, so
//! the next `start()` begins from a clean state. Sub-profilers that already
//! started are not stopped, since their `stop()` publishes reports.
//!
//! ## Stop: best effort
//!
//! ```text
//! finish CPU sampler → write artifact → register session (if serving)
//!                    → sub[0].stop() → sub[1].stop() → ...
//! ```
//!
//! Every sub-profiler gets its `stop()` call even if the artifact or an
//! earlier sub-profiler failed; failures are logged. Sub-profilers run
//! sequentially, so one hanging external tool delays the ones after it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};

use super::{CpuCapture, SubProfiler};
use crate::domain::{ProfilerError, RunStamp};
use crate::serving::{SessionServer, PROFILE_EXTENSION};

/// Sampling frequency in Hz. 99 rather than 100 avoids lock-step with timers.
pub const DEFAULT_SAMPLING_FREQUENCY: i32 = 99;

/// Coordinates one benchmark run's profilers.
pub struct Profiler {
    base_dir: PathBuf,
    frequency: i32,
    capture: Option<CpuCapture>,
    sub_profilers: Vec<Box<dyn SubProfiler>>,
    sessions: Arc<SessionServer>,
}

impl Profiler {
    /// Create a coordinator writing artifacts to `base_dir` (the OS temp dir
    /// if empty).
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let mut base_dir = base_dir.into();
        if base_dir.as_os_str().is_empty() {
            base_dir = std::env::temp_dir();
        }
        Self {
            sessions: Arc::new(SessionServer::new(base_dir.clone())),
            base_dir,
            frequency: DEFAULT_SAMPLING_FREQUENCY,
            capture: None,
            sub_profilers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sampling_frequency(mut self, frequency: i32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Register a sub-profiler. Sub-profilers start and stop in registration order.
    pub fn add_profiler(&mut self, profiler: impl SubProfiler + 'static) {
        self.sub_profilers.push(Box::new(profiler));
    }

    /// Serving subsystem over this coordinator's base directory.
    ///
    /// Once [`SessionServer::serve`] is running, every stopped run is
    /// registered as a new session.
    #[must_use]
    pub fn session_server(&self) -> Arc<SessionServer> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.capture.is_some()
    }

    /// Begin a run. Returns the artifact path the CPU profile will be written to.
    ///
    /// # Errors
    /// Returns an error if a run is already active, the base directory can't
    /// be created, the sampler can't start, or any sub-profiler fails to start.
    pub fn start(&mut self) -> Result<PathBuf, ProfilerError> {
        if self.capture.is_some() {
            return Err(ProfilerError::AlreadyRunning);
        }
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|source| ProfilerError::BaseDir {
                path: self.base_dir.clone(),
                source,
            })?;

        let artifact = artifact_path(&self.base_dir, &RunStamp::now());
        let capture = CpuCapture::start(artifact.clone(), self.frequency)?;

        for sub in &mut self.sub_profilers {
            if let Err(source) = sub.start() {
                warn!("{} failed to start, discarding CPU capture", sub.name());
                drop(capture);
                return Err(ProfilerError::SubProfilerStart {
                    name: sub.name().to_string(),
                    source,
                });
            }
        }

        self.capture = Some(capture);
        Ok(artifact)
    }

    /// End the active run. Returns the written artifact path.
    ///
    /// # Errors
    /// Returns [`ProfilerError::NotRunning`] without touching sub-profilers if
    /// no run is active; otherwise returns the artifact error, if any, after
    /// all sub-profilers were stopped.
    pub fn stop(&mut self) -> Result<PathBuf, ProfilerError> {
        let capture = self.capture.take().ok_or(ProfilerError::NotRunning)?;

        let artifact = capture.finish();
        match &artifact {
            Ok(path) if self.sessions.is_serving() => {
                if let Err(e) = self.sessions.register_session(path) {
                    error!("failed to add profile result: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => error!("failed to write CPU profile: {e}"),
        }

        for (idx, sub) in self.sub_profilers.iter_mut().enumerate() {
            if let Err(e) = sub.stop() {
                error!("failed to stop profiler{idx} ({}): {e}", sub.name());
            }
        }

        if let Ok(path) = &artifact {
            info!("benchmark profile ready: {}", path.display());
        }
        artifact
    }
}

/// `pprof_{stamp}.pprof`, suffixed `_1`, `_2`, ... when runs within the same
/// second already wrote artifacts.
fn artifact_path(base_dir: &Path, stamp: &RunStamp) -> PathBuf {
    let mut candidate = base_dir.join(format!("pprof_{stamp}.{PROFILE_EXTENSION}"));
    let mut suffix = 1;
    while candidate.exists() {
        candidate = base_dir.join(format!("pprof_{stamp}_{suffix}.{PROFILE_EXTENSION}"));
        suffix += 1;
    }
    candidate
}
