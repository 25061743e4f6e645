//! # benchscope - Benchmark-Session Profiler
//!
//! benchscope attaches to a request-serving process, notices when a load-test
//! run has gone idle, and captures a CPU profile plus auxiliary log analyses
//! for exactly that run. Every captured run stays browsable over HTTP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Application (axum)                          │
//! │   POST /initialize ──▶ notifier.arm() + profiler.start()        │
//! │   every request    ──▶ track_requests middleware                │
//! └───────────────┬─────────────────────────────────────────────────┘
//!                 │ last-request timestamp
//!                 ▼
//! ┌──────────────────────────┐  idle > threshold  ┌────────────────────────┐
//! │  FinishNotifier (thread) │───────────────────▶│ Profiler.stop()        │
//! └──────────────────────────┘                    │  ├─ CPU artifact       │
//!                                                 │  ├─ register session ──┼──▶ SessionServer
//!                                                 │  └─ sub-profilers ─────┼──▶ analysis endpoints
//!                                                 └────────────────────────┘      (alp, kataribe,
//!                                                                                 pt-query-digest,
//!                                                                                 gist + webhook)
//! ```
//!
//! ## Module Structure
//!
//! - [`detection`]: idle-detection state machine and request-tracking middleware
//! - [`profiling`]: session lifecycle coordinator, CPU capture, [`profiling::SubProfiler`]
//! - [`serving`]: multi-session route table with redirect-to-latest
//! - [`analysis`]: flat/cumulative hotspot aggregation for the `/top` view
//! - [`pipelines`]: access-log and slow-query-log sub-profilers and their endpoints
//! - [`publish`]: gist upload and Discord webhook
//! - [`preflight`]: external tool checks
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: core domain types (`SessionIndex`, `RunStamp`) and errors
//!
//! ## Typical Usage
//!
//! ```bash
//! # Browse every saved run
//! benchscope serve --dir /tmp --port 8080
//!
//! # On the nginx / MySQL host
//! benchscope agent --port 8081 --strict
//! ```

pub mod analysis;
pub mod cli;
pub mod client;
pub mod detection;
pub mod domain;
pub mod pipelines;
pub mod preflight;
pub mod profiling;
pub mod publish;
pub mod serving;
