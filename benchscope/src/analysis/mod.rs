//! Analysis logic for profiling data
//!
//! This module contains pure business logic for analyzing decoded profiles,
//! separated from the HTTP presentation layer.

pub mod hotspot_analyzer;

pub use hotspot_analyzer::{analyze_hotspots, render_top_table, FunctionHotspot};
