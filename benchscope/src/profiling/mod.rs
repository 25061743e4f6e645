//! Profiling core modules
//!
//! This module contains the session lifecycle for one benchmark run:
//! - CPU sampling into a pprof artifact
//! - The pluggable sub-profiler capability
//! - The coordinator composing both into start/stop

pub mod coordinator;
pub mod cpu_capture;
pub mod sub_profiler;

// Re-export common types
pub use coordinator::{Profiler, DEFAULT_SAMPLING_FREQUENCY};
pub use cpu_capture::CpuCapture;
pub use sub_profiler::SubProfiler;
