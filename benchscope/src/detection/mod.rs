//! Benchmark-finish detection
//!
//! A benchmark run is considered finished when no request has arrived for a
//! configured idle threshold after the run was armed:
//! - [`FinishNotifier`]: arm signal, last-request timestamp, polling thread
//! - [`track_requests`]: axum middleware feeding the timestamp

pub mod middleware;
pub mod notifier;

pub use middleware::track_requests;
pub use notifier::{FinishNotifier, NotifierConfig};
