//! LTSV → `with_time` access-log transform.
//!
//! Input lines use nginx's `ltsv` log format:
//!
//! ```text
//! time:$time_local\thost:$remote_addr\treq:$request\tstatus:$status\tmethod:$request_method
//! \turi:$request_uri\tsize:$body_bytes_sent\treferer:$http_referer\tua:$http_user_agent
//! \treqtime:$request_time\tcache:...\truntime:...\tapptime:$upstream_response_time
//! ```
//!
//! Output lines use the `with_time` format (combined log + request time):
//!
//! ```text
//! $remote_addr - $remote_user [$time_local] "$request" $status $body_bytes_sent
//!     "$http_referer" "$http_user_agent" $request_time
//! ```
//!
//! Fields are taken by position. A field without a `label:` separator is
//! used as-is and a missing field renders as `-`, so malformed lines never
//! abort the transform.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const TIME: usize = 0;
const HOST: usize = 1;
const REQUEST: usize = 2;
const STATUS: usize = 3;
const SIZE: usize = 6;
const REFERER: usize = 7;
const USER_AGENT: usize = 8;
const REQUEST_TIME: usize = 9;

const MISSING: &str = "-";

/// Value part of an LTSV `label:value` field, or the field itself without a label.
fn field_value(field: &str) -> &str {
    field.split_once(':').map_or(field, |(_, value)| value)
}

/// Convert one LTSV line. Empty input yields an empty string.
#[must_use]
pub fn ltsv_to_with_time(line: &str) -> String {
    if line.is_empty() {
        return String::new();
    }
    let fields: Vec<&str> = line.split('\t').collect();
    let get = |idx: usize| fields.get(idx).map_or(MISSING, |f| field_value(f));

    format!(
        "{} - {} [{}] \"{}\" {} {} \"{}\" \"{}\" {}",
        get(HOST),
        MISSING,
        get(TIME),
        get(REQUEST),
        get(STATUS),
        get(SIZE),
        get(REFERER),
        get(USER_AGENT),
        get(REQUEST_TIME),
    )
}

/// Convert an LTSV log file, skipping blank lines. Returns the number of lines written.
///
/// # Errors
/// Returns an error if the input can't be read or the output can't be written.
pub fn convert_file(input: &Path, output: &Path) -> std::io::Result<usize> {
    log::info!("{} -> {}", input.display(), output.display());
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);

    let mut written = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            continue;
        }
        writeln!(writer, "{}", ltsv_to_with_time(line))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "time:08/Mar/2024:10:00:00 +0900\thost:192.168.0.1\t\
req:GET /users/1 HTTP/1.1\t\
status:200\tmethod:GET\turi:/users/1\tsize:512\treferer:-\tua:bench/1.0\treqtime:0.012\t\
cache:-\truntime:-\tapptime:0.010";

    #[test]
    fn test_full_line() {
        assert_eq!(
            ltsv_to_with_time(LINE),
            "192.168.0.1 - - [08/Mar/2024:10:00:00 +0900] \"GET /users/1 HTTP/1.1\" \
             200 512 \"-\" \"bench/1.0\" 0.012"
        );
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(ltsv_to_with_time(""), "");
    }

    #[test]
    fn test_value_keeps_later_colons() {
        assert_eq!(field_value("time:10:00:00"), "10:00:00");
    }

    #[test]
    fn test_missing_separator_keeps_field() {
        assert_eq!(field_value("garbage"), "garbage");
        assert_eq!(ltsv_to_with_time("garbage"), "- - - [garbage] \"-\" - - \"-\" \"-\" -");
    }

    #[test]
    fn test_short_line_does_not_panic() {
        let converted = ltsv_to_with_time("time:t\thost:h\treq:r");
        assert_eq!(converted, "h - - [t] \"r\" - - \"-\" \"-\" -");
    }

    #[test]
    fn test_convert_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("access.log");
        let output = dir.path().join("access.log.kataribe");
        std::fs::write(&input, format!("{LINE}\n\n{LINE}\n")).expect("write");

        assert_eq!(convert_file(&input, &output).expect("convert"), 2);
        let converted = std::fs::read_to_string(&output).expect("read");
        assert_eq!(converted.lines().count(), 2);
        assert!(converted.starts_with("192.168.0.1 - - ["));
    }

    #[test]
    fn test_convert_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("access.log");
        let output = dir.path().join("out.log");
        std::fs::write(&input, "").expect("write");

        assert_eq!(convert_file(&input, &output).expect("convert"), 0);
        assert_eq!(std::fs::read_to_string(&output).expect("read"), "");
    }
}
