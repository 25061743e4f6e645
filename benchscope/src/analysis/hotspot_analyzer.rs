//! Hotspot analysis for profiling data.
//!
//! This module aggregates sampled stacks by function name to produce the
//! pprof-style "top" view: functions ranked by the time spent in their own
//! code (flat) and including their callees (cumulative).
//!
//! ## Data Flow
//!
//! ```text
//! ProfileData.samples
//!     │
//!     └──► analyze_hotspots()  ← flat + cum per function, sorted
//!              │
//!              └──► render_top_table()  ← /top view
//! ```
//!
//! # Performance
//!
//! - `analyze_hotspots()`: O(samples × depth) plus O(n log n) sorting over
//!   unique functions

// Percentage calculations intentionally convert i64 to f64
#![allow(clippy::cast_precision_loss)]

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::serving::ProfileData;

/// A function hotspot with aggregated statistics.
///
/// ```text
///       flat  flat%        cum   cum%  name
///          3  75.00%         3  75.00%  parse
///          1  25.00%         4 100.00%  handler
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionHotspot {
    /// Fully qualified function name (e.g., "myapp::db::query").
    pub name: String,

    /// Value of samples where this function is the leaf frame.
    pub flat: i64,

    /// Value of samples where this function appears anywhere in the stack.
    /// Recursive frames are counted once per sample.
    pub cum: i64,

    /// `flat` as a percentage of the profile total (0.0 - 100.0).
    pub flat_percentage: f64,

    /// `cum` as a percentage of the profile total (0.0 - 100.0).
    pub cum_percentage: f64,
}

/// Analyze a decoded profile to identify function hotspots.
///
/// Sorted by flat value (descending), then cumulative value, then name so the
/// output is stable across requests.
#[must_use]
pub fn analyze_hotspots(data: &ProfileData) -> Vec<FunctionHotspot> {
    let mut totals: HashMap<&str, (i64, i64)> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for sample in &data.samples {
        if let Some(leaf) = sample.frames.last() {
            totals.entry(leaf.as_str()).or_default().0 += sample.value;
        }
        seen.clear();
        for frame in &sample.frames {
            if seen.insert(frame.as_str()) {
                totals.entry(frame.as_str()).or_default().1 += sample.value;
            }
        }
    }

    let total = data.total();
    let percentage =
        |value: i64| if total > 0 { (value as f64 / total as f64) * 100.0 } else { 0.0 };

    let mut hotspots: Vec<FunctionHotspot> = totals
        .into_iter()
        .map(|(name, (flat, cum))| FunctionHotspot {
            name: name.to_string(),
            flat,
            cum,
            flat_percentage: percentage(flat),
            cum_percentage: percentage(cum),
        })
        .collect();

    hotspots.sort_unstable_by(|a, b| {
        b.flat.cmp(&a.flat).then_with(|| b.cum.cmp(&a.cum)).then_with(|| a.name.cmp(&b.name))
    });
    hotspots
}

/// Render hotspots as the plain-text `/top` table.
#[must_use]
pub fn render_top_table(data: &ProfileData, hotspots: &[FunctionHotspot]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Showing {} functions, total {} ({})",
        hotspots.len(),
        data.total(),
        data.sample_types.first().map_or("samples", String::as_str)
    );
    let _ = writeln!(out, "{:>10} {:>7} {:>10} {:>7}  name", "flat", "flat%", "cum", "cum%");
    for h in hotspots {
        let _ = writeln!(
            out,
            "{:>10} {:>6.2}% {:>10} {:>6.2}%  {}",
            h.flat, h.flat_percentage, h.cum, h.cum_percentage, h.name
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serving::profile_data::StackSample;
    use std::sync::Arc;

    fn create_test_data() -> ProfileData {
        let stack = |frames: &[&str], value| StackSample {
            frames: frames.iter().map(ToString::to_string).collect(),
            value,
        };
        ProfileData {
            sample_types: vec!["samples/count".to_string()],
            duration_nanos: 0,
            samples: vec![
                stack(&["main", "handler", "parse"], 3),
                stack(&["main", "handler"], 1),
                stack(&["main", "recurse", "recurse"], 2),
            ],
            raw: Arc::new(Vec::new()),
        }
    }

    #[test]
    fn test_flat_is_sorted_descending() {
        let hotspots = analyze_hotspots(&create_test_data());

        assert_eq!(hotspots[0].name, "parse");
        assert_eq!(hotspots[0].flat, 3);
        assert_eq!(hotspots[1].name, "recurse");
        assert_eq!(hotspots[1].flat, 2);
    }

    #[test]
    fn test_cumulative_counts_each_sample_once() {
        let hotspots = analyze_hotspots(&create_test_data());
        let find = |name: &str| hotspots.iter().find(|h| h.name == name).expect("hotspot");

        assert_eq!(find("main").cum, 6);
        assert_eq!(find("main").flat, 0);
        assert_eq!(find("handler").cum, 4);
        // recurse appears twice in one stack but counts once
        assert_eq!(find("recurse").cum, 2);
    }

    #[test]
    fn test_percentages() {
        let hotspots = analyze_hotspots(&create_test_data());
        assert!((hotspots[0].flat_percentage - 50.0).abs() < 0.01); // 3/6
        let main = hotspots.iter().find(|h| h.name == "main").expect("main");
        assert!((main.cum_percentage - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_render_top_table_lists_functions() {
        let data = create_test_data();
        let table = render_top_table(&data, &analyze_hotspots(&data));
        assert!(table.starts_with("Showing 4 functions, total 6 (samples/count)"));
        assert!(table.contains("parse"));
    }
}
