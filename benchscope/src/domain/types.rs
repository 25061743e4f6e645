//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep session indices and run stamps from being
//! mixed up with arbitrary integers and strings in routing and file naming.

use std::fmt;

use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Index of a registered profiling session (0, 1, 2, ...).
///
/// Assigned by the serving subsystem in registration order and never reused
/// within a process lifetime. Routes for a session live under `/{index}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionIndex(pub usize);

impl SessionIndex {
    /// Route prefix for this session, without trailing slash (e.g. `/3`).
    #[must_use]
    pub fn prefix(self) -> String {
        format!("/{}", self.0)
    }
}

impl fmt::Display for SessionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock stamp of a benchmark run, formatted `YYYY_MM_DD_HH_MM_SS`.
///
/// Used to name the CPU-profile artifact, rotated access logs, slow-query
/// log files and generated reports, so artifacts of different runs sort
/// chronologically by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunStamp(String);

impl RunStamp {
    /// Stamp for the current local time (UTC if the local offset is unknown).
    #[must_use]
    pub fn now() -> Self {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self::from_datetime(now)
    }

    #[must_use]
    pub fn from_datetime(datetime: OffsetDateTime) -> Self {
        let format = format_description!("[year]_[month]_[day]_[hour]_[minute]_[second]");
        let stamp = datetime
            .format(&format)
            .unwrap_or_else(|_| datetime.unix_timestamp().to_string());
        Self(stamp)
    }

    /// Accept only a well-formed `YYYY_MM_DD_HH_MM_SS` stamp naming a real
    /// date and time. Stamps arriving over the wire end up in file names and
    /// shell commands, so anything else is rejected.
    #[must_use]
    pub fn parse(stamp: &str) -> Option<Self> {
        let format = format_description!("[year]_[month]_[day]_[hour]_[minute]_[second]");
        let parsed = PrimitiveDateTime::parse(stamp, &format).ok()?;
        let canonical = Self::from_datetime(parsed.assume_utc());
        (canonical.0 == stamp).then_some(canonical)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_run_stamp_format() {
        let stamp = RunStamp::from_datetime(datetime!(2024-03-07 09:05:01 UTC));
        assert_eq!(stamp.as_str(), "2024_03_07_09_05_01");
    }

    #[test]
    fn test_run_stamps_sort_chronologically() {
        let earlier = RunStamp::from_datetime(datetime!(2024-03-07 09:05:01 UTC));
        let later = RunStamp::from_datetime(datetime!(2024-11-01 00:00:00 UTC));
        assert!(earlier < later);
    }

    #[test]
    fn test_parse_accepts_well_formed_stamp() {
        let stamp = RunStamp::parse("2024_03_07_09_05_01").expect("stamp");
        assert_eq!(stamp, RunStamp::from_datetime(datetime!(2024-03-07 09:05:01 UTC)));
    }

    #[test]
    fn test_parse_rejects_malformed_stamps() {
        let cases = [
            "",
            "x; touch /tmp/marker",
            "2024_03_07_09_05_01; rm -rf /",
            "../../etc/passwd",
            "2024_13_07_09_05_01",
            "2024_3_7_9_5_1",
            "+2024_03_07_09_05_01",
            "2024-03-07 09:05:01",
        ];
        for case in cases {
            assert!(RunStamp::parse(case).is_none(), "{case:?} should be rejected");
        }
    }

    #[test]
    fn test_session_prefix() {
        assert_eq!(SessionIndex(0).prefix(), "/0");
        assert_eq!(SessionIndex(12).to_string(), "12");
    }
}
