// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host payload normalization.
//
// Hosts have shipped three envelope shapes for the same fix:
//
//   flat            {"latitude": 37.77, "longitude": -122.41}
//   encoded         "{\"latitude\":37.77,\"longitude\":-122.41}"
//   nested          {"responseData": "{\"respData\":{\"latitude\":...}}"}
//
// Every command response and push delivery goes through `normalize`, which
// walks the envelope and up to two nesting levels and takes the first
// object carrying both coordinates. Nothing is guessed: a payload without
// usable coordinates is a `NormalizationFailure`.

use chrono::DateTime;
use hostlink_core::error::{FailureReason, NormalizationFailure};
use hostlink_core::LocationFix;
use serde_json::{Map, Value};

/// Field names probed for a nested envelope, in order.
pub const NESTED_FIELDS: [&str; 4] = ["data", "payload", "responseData", "respData"];

/// Levels below the outer envelope that are searched.
pub const MAX_NESTING: usize = 2;

const TIMESTAMP_FIELDS: [&str; 3] = ["timestampMillis", "timestamp", "time"];

/// Which attempt in the chain produced the fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// Plain object with the fields at the top.
    Flat,
    /// JSON string whose decoded object has the fields at the top.
    Encoded,
    /// Fields found `depth` levels below the envelope.
    Nested { depth: usize },
}

/// Collapse a raw host payload into a validated fix.
pub fn normalize(raw: &Value) -> Result<LocationFix, NormalizationFailure> {
    normalize_tagged(raw).map(|(fix, _)| fix)
}

/// Like [`normalize`], also reporting which envelope shape matched.
pub fn normalize_tagged(raw: &Value) -> Result<(LocationFix, EnvelopeShape), NormalizationFailure> {
    let root = decode_root(raw)?;

    for (candidate, depth) in candidates(&root) {
        let Some((latitude, longitude)) = coordinates(&candidate) else {
            continue;
        };
        let fix = LocationFix::new(latitude, longitude).map_err(|_| {
            fail(raw, FailureReason::OutOfRange {
                latitude,
                longitude,
            })
        })?;
        let fix = fix
            .with_accuracy(candidate.get("accuracy").and_then(as_number))
            .with_timestamp_millis(timestamp_millis(&candidate));

        let shape = match (depth, raw.is_string()) {
            (0, false) => EnvelopeShape::Flat,
            (0, true) => EnvelopeShape::Encoded,
            (depth, _) => EnvelopeShape::Nested { depth },
        };
        return Ok((fix, shape));
    }

    Err(fail(raw, FailureReason::NoCoordinates))
}

/// Normalize a bulk track response into fixes, in the order received.
///
/// Accepts a JSON array, a string encoding one, or an envelope whose nested
/// field holds one. A single bad entry rejects the whole track.
pub fn normalize_track(raw: &Value) -> Result<Vec<LocationFix>, NormalizationFailure> {
    let root = decode_root(raw)?;
    let entries = find_array(&root, 0).ok_or_else(|| fail(raw, FailureReason::NotATrack))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            normalize(entry).map_err(|failure| {
                fail(raw, FailureReason::TrackEntry {
                    index,
                    reason: Box::new(failure.reason),
                })
            })
        })
        .collect()
}

fn fail(raw: &Value, reason: FailureReason) -> NormalizationFailure {
    match raw {
        Value::String(s) => NormalizationFailure::new(reason, s),
        other => NormalizationFailure::new(reason, &other.to_string()),
    }
}

/// Turn the outer payload into a JSON value, decoding a string envelope.
fn decode_root(raw: &Value) -> Result<Value, NormalizationFailure> {
    match raw {
        Value::Null => Err(fail(raw, FailureReason::Empty)),
        Value::String(s) if s.trim().is_empty() => Err(fail(raw, FailureReason::Empty)),
        Value::String(s) => serde_json::from_str(s).map_err(|_| fail(raw, FailureReason::NotJson)),
        other => Ok(other.clone()),
    }
}

/// Decode a nested field: strings are parsed, objects and arrays taken as-is.
fn decode_nested(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Object(_) | Value::Array(_) => Some(value.clone()),
        _ => None,
    }
}

/// Candidate objects, breadth first: the envelope, then each nesting level.
fn candidates(root: &Value) -> Vec<(Map<String, Value>, usize)> {
    let mut found = Vec::new();
    let mut level: Vec<Value> = vec![root.clone()];

    for depth in 0..=MAX_NESTING {
        let mut next = Vec::new();
        for value in level {
            let Value::Object(map) = value else {
                continue;
            };
            if depth < MAX_NESTING {
                next.extend(
                    NESTED_FIELDS
                        .iter()
                        .filter_map(|field| map.get(*field))
                        .filter_map(decode_nested),
                );
            }
            found.push((map, depth));
        }
        level = next;
    }

    found
}

fn find_array(value: &Value, depth: usize) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::Object(map) if depth < MAX_NESTING => NESTED_FIELDS
            .iter()
            .filter_map(|field| map.get(*field))
            .filter_map(decode_nested)
            .find_map(|nested| find_array(&nested, depth + 1)),
        _ => None,
    }
}

fn coordinates(candidate: &Map<String, Value>) -> Option<(f64, f64)> {
    let latitude = candidate.get("latitude").and_then(as_number)?;
    let longitude = candidate.get("longitude").and_then(as_number)?;
    Some((latitude, longitude))
}

/// Numbers and numeric strings, finite only.
fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Integer millis, numeric strings, or RFC 3339 strings. Each timestamp
/// field is tried in turn; a value outside the `i64` range is unreadable.
fn timestamp_millis(candidate: &Map<String, Value>) -> Option<i64> {
    TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| candidate.get(*field))
        .find_map(parse_millis)
}

fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            if n.is_u64() {
                return None;
            }
            n.as_f64().and_then(float_millis)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            })
        }
        _ => None,
    }
}

/// Round to whole millis, refusing anything `i64` cannot hold.
fn float_millis(f: f64) -> Option<i64> {
    let rounded = f.round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    (rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64)
        .then_some(rounded as i64)
}
