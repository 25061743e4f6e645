//! Pluggable capture/analyze/publish pipelines tied to one external data source.

use crate::domain::PipelineError;

/// A pipeline started and stopped together with the CPU profile.
///
/// `start` prepares the data source so only this run's traffic is captured
/// (log rotation, database reconfiguration). `stop` analyzes and publishes
/// what was captured. Implementations own their per-run state such as rotated
/// file names.
pub trait SubProfiler: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// # Errors
    /// Returns an error if the data source could not be prepared.
    fn start(&mut self) -> Result<(), PipelineError>;

    /// # Errors
    /// Returns an error if analysis or publishing failed.
    fn stop(&mut self) -> Result<(), PipelineError>;
}
