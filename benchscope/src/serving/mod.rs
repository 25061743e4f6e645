//! Multi-session profile serving
//!
//! Turns any number of captured CPU-profile artifacts into one browsable
//! HTTP namespace:
//! - [`profile_data`]: artifact decoding (plain or gzip pprof protobuf)
//! - [`viewer`]: per-profile views (index, top, flamegraph, folded, raw)
//! - [`sessions`]: route table, session indices, redirect-to-latest, server

pub mod profile_data;
pub mod sessions;
pub mod viewer;

pub use profile_data::{ProfileData, StackSample};
pub use sessions::{Resolution, RouteTable, SessionServer, PROFILE_EXTENSION};
pub use viewer::{ProfileViewer, ViewHandler, ViewResponse, VIEW_ROUTES};
