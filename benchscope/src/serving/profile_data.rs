//! Decoded CPU-profile artifacts.
//!
//! Artifacts are pprof protobuf messages (`perftools.profiles.Profile`),
//! optionally gzip-compressed the way most pprof producers write them. The
//! decoded form keeps every sample as a root-to-leaf list of function names
//! plus its value, which is all the views need.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;
use pprof::protos::{Message, Profile};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const UNKNOWN_FUNCTION: &str = "<unknown>";

/// One sampled call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSample {
    /// Function names from the outermost caller down to the sampled leaf.
    pub frames: Vec<String>,
    /// Sample value for the selected sample type (sample count for CPU profiles).
    pub value: i64,
}

/// A decoded, validated profile ready to be browsed.
#[derive(Debug, Clone)]
pub struct ProfileData {
    /// Sample types as `type/unit` pairs, e.g. `samples/count`, `cpu/nanoseconds`.
    pub sample_types: Vec<String>,
    pub duration_nanos: i64,
    pub samples: Vec<StackSample>,
    /// The artifact exactly as it was read from disk.
    pub raw: Arc<Vec<u8>>,
}

impl ProfileData {
    /// Decode an artifact's bytes.
    ///
    /// # Errors
    /// Returns a human-readable reason if the bytes are empty, not a pprof
    /// message, or reference strings/locations/functions that don't exist.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, String> {
        if bytes.is_empty() {
            return Err("empty input file".to_string());
        }

        let decoded = if bytes.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::new();
            GzDecoder::new(bytes.as_slice())
                .read_to_end(&mut inflated)
                .map_err(|e| format!("invalid gzip stream: {e}"))?;
            Profile::decode(inflated.as_slice())
        } else {
            Profile::decode(bytes.as_slice())
        };
        let profile = decoded.map_err(|e| format!("invalid pprof message: {e}"))?;

        let mut data = Self::from_profile(&profile)?;
        data.raw = Arc::new(bytes);
        Ok(data)
    }

    /// Build from an already decoded protobuf message.
    ///
    /// # Errors
    /// Returns a reason if the message's tables are inconsistent.
    pub fn from_profile(profile: &Profile) -> Result<Self, String> {
        let strings = &profile.string_table;
        let lookup = |idx: i64| -> Result<&str, String> {
            usize::try_from(idx)
                .ok()
                .and_then(|i| strings.get(i))
                .map(String::as_str)
                .ok_or_else(|| format!("string index {idx} out of range"))
        };

        let mut function_names: HashMap<u64, &str> = HashMap::new();
        for function in &profile.function {
            function_names.insert(function.id, lookup(function.name)?);
        }

        // Frames per location, caller first (pprof lists inlined callee first)
        let mut location_frames: HashMap<u64, Vec<String>> = HashMap::new();
        for location in &profile.location {
            let mut frames = Vec::with_capacity(location.line.len().max(1));
            for line in location.line.iter().rev() {
                let name = function_names
                    .get(&line.function_id)
                    .ok_or_else(|| format!("function id {} not found", line.function_id))?;
                frames.push(sanitize_frame(name));
            }
            if frames.is_empty() {
                frames.push(format!("{UNKNOWN_FUNCTION} 0x{:x}", location.address));
            }
            location_frames.insert(location.id, frames);
        }

        let mut samples = Vec::with_capacity(profile.sample.len());
        for sample in &profile.sample {
            let mut frames = Vec::new();
            // location_id[0] is the leaf
            for id in sample.location_id.iter().rev() {
                let located = location_frames
                    .get(id)
                    .ok_or_else(|| format!("location id {id} not found"))?;
                frames.extend(located.iter().cloned());
            }
            let value = sample.value.first().copied().unwrap_or(0);
            samples.push(StackSample { frames, value });
        }

        let mut sample_types = Vec::with_capacity(profile.sample_type.len());
        for value_type in &profile.sample_type {
            sample_types.push(format!("{}/{}", lookup(value_type.ty)?, lookup(value_type.unit)?));
        }

        Ok(Self {
            sample_types,
            duration_nanos: profile.duration_nanos,
            samples,
            raw: Arc::new(Vec::new()),
        })
    }

    /// Sum of all sample values.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.samples.iter().map(|s| s.value).sum()
    }

    /// Folded-stack lines (`root;child;leaf value`), merged and sorted.
    #[must_use]
    pub fn folded_lines(&self) -> Vec<String> {
        let mut merged: HashMap<String, i64> = HashMap::new();
        for sample in &self.samples {
            if sample.frames.is_empty() || sample.value <= 0 {
                continue;
            }
            *merged.entry(sample.frames.join(";")).or_insert(0) += sample.value;
        }
        let mut lines: Vec<String> =
            merged.into_iter().map(|(stack, value)| format!("{stack} {value}")).collect();
        lines.sort_unstable();
        lines
    }
}

/// `;` separates frames in folded stacks, so it can't appear inside one.
fn sanitize_frame(name: &str) -> String {
    if name.is_empty() {
        UNKNOWN_FUNCTION.to_string()
    } else {
        name.replace(';', ":")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pprof::protos::{Function, Line, Location, Sample, ValueType};
    use std::io::Write;

    /// Two stacks: main;handler;parse (3 samples) and main;handler (1 sample).
    pub(crate) fn sample_profile() -> Profile {
        let strings = ["", "samples", "count", "main", "handler", "parse"];
        let function = |id: u64, name: i64| Function {
            id,
            name,
            ..Default::default()
        };
        let location = |id: u64, function_id: u64| Location {
            id,
            line: vec![Line {
                function_id,
                line: 1,
                ..Default::default()
            }],
            ..Default::default()
        };
        Profile {
            sample_type: vec![ValueType { ty: 1, unit: 2 }],
            sample: vec![
                Sample {
                    location_id: vec![3, 2, 1],
                    value: vec![3],
                    ..Default::default()
                },
                Sample {
                    location_id: vec![2, 1],
                    value: vec![1],
                    ..Default::default()
                },
            ],
            location: vec![location(1, 1), location(2, 2), location(3, 3)],
            function: vec![function(1, 3), function(2, 4), function(3, 5)],
            string_table: strings.iter().map(ToString::to_string).collect(),
            duration_nanos: 2_000_000_000,
            ..Default::default()
        }
    }

    pub(crate) fn sample_profile_bytes() -> Vec<u8> {
        sample_profile().encode_to_vec()
    }

    #[test]
    fn test_decode_builds_root_to_leaf_stacks() {
        let data = ProfileData::decode(sample_profile_bytes()).expect("decode");
        assert_eq!(data.sample_types, vec!["samples/count"]);
        assert_eq!(data.samples[0].frames, vec!["main", "handler", "parse"]);
        assert_eq!(data.samples[0].value, 3);
        assert_eq!(data.total(), 4);
    }

    #[test]
    fn test_folded_lines() {
        let data = ProfileData::decode(sample_profile_bytes()).expect("decode");
        assert_eq!(data.folded_lines(), vec!["main;handler 1", "main;handler;parse 3"]);
    }

    #[test]
    fn test_decode_gzip_artifact() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&sample_profile_bytes()).expect("compress");
        let compressed = encoder.finish().expect("finish");

        let data = ProfileData::decode(compressed).expect("decode gzip");
        assert_eq!(data.total(), 4);
    }

    #[test]
    fn test_empty_artifact_is_rejected() {
        assert!(ProfileData::decode(Vec::new()).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        // Truncated varint key
        assert!(ProfileData::decode(vec![0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_dangling_location_is_rejected() {
        let mut profile = sample_profile();
        profile.sample[0].location_id.push(99);
        let err = ProfileData::from_profile(&profile).unwrap_err();
        assert!(err.contains("location id 99"));
    }

    #[test]
    fn test_inlined_frames_are_caller_first() {
        let mut profile = sample_profile();
        // Location 3 now holds parse inlined into handler
        profile.location[2].line =
            vec![
                Line {
                    function_id: 3,
                    line: 9,
                    ..Default::default()
                },
                Line {
                    function_id: 2,
                    line: 4,
                    ..Default::default()
                },
            ];
        profile.sample = vec![Sample {
            location_id: vec![3, 1],
            value: vec![1],
            ..Default::default()
        }];

        let data = ProfileData::from_profile(&profile).expect("decode");
        assert_eq!(data.samples[0].frames, vec!["main", "handler", "parse"]);
    }
}
