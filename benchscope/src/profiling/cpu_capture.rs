//! CPU sampling via pprof-rs
//!
//! Samples every thread of the process with `SIGPROF` at a fixed frequency and
//! writes the result as a pprof protobuf when the capture finishes. Only one
//! capture may be active per process.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use pprof::protos::Message;
use pprof::{ProfilerGuard, ProfilerGuardBuilder};

use crate::domain::ProfilerError;

// Skip frames inside the sampler's own signal handling and libc
const BLOCKLIST: &[&str] = &["libc", "libgcc", "pthread", "vdso"];

/// An in-progress CPU capture bound to its artifact path.
pub struct CpuCapture {
    guard: ProfilerGuard<'static>,
    artifact: PathBuf,
}

impl CpuCapture {
    /// Start sampling at `frequency` Hz. Nothing is written until [`CpuCapture::finish`].
    ///
    /// # Errors
    /// Returns an error if the sampler can't be installed (e.g. another
    /// capture is already running in this process).
    pub fn start(artifact: PathBuf, frequency: i32) -> Result<Self, ProfilerError> {
        let guard = ProfilerGuardBuilder::default()
            .frequency(frequency)
            .blocklist(BLOCKLIST)
            .build()?;
        info!("start pprof: report to {}", artifact.display());
        Ok(Self { guard, artifact })
    }

    #[must_use]
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Stop sampling and write the artifact. An existing file at the artifact
    /// path is never overwritten.
    ///
    /// # Errors
    /// Returns an error if the report can't be built or the file can't be
    /// created (including when it already exists).
    pub fn finish(self) -> Result<PathBuf, ProfilerError> {
        let report = self.guard.report().build()?;
        let profile = report.pprof()?;
        drop(self.guard);

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.artifact)
            .and_then(|mut file| file.write_all(&profile.encode_to_vec()))
            .map_err(|source| ProfilerError::ArtifactWrite {
                path: self.artifact.clone(),
                source,
            })?;
        info!("stop pprof: wrote {}", self.artifact.display());
        Ok(self.artifact)
    }
}
