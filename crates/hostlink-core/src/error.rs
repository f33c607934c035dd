// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Hostlink.

use thiserror::Error;

/// Longest raw payload excerpt kept on a `NormalizationFailure`.
pub const RAW_SAMPLE_LIMIT: usize = 256;

/// Why a host payload could not be turned into a location fix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    #[error("payload is empty")]
    Empty,

    #[error("payload string is not valid JSON")]
    NotJson,

    #[error("no candidate object carries numeric latitude and longitude")]
    NoCoordinates,

    #[error("coordinates out of range: latitude {latitude}, longitude {longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },

    #[error("payload is not a list of fixes")]
    NotATrack,

    #[error("track entry {index} rejected: {reason}")]
    TrackEntry {
        index: usize,
        reason: Box<FailureReason>,
    },
}

/// A host payload that could not be interpreted, with an excerpt of what
/// arrived for diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason} (raw: {raw_sample})")]
pub struct NormalizationFailure {
    pub reason: FailureReason,
    pub raw_sample: String,
}

impl NormalizationFailure {
    /// Build a failure, truncating the raw excerpt on a char boundary.
    pub fn new(reason: FailureReason, raw: &str) -> Self {
        let raw_sample = match raw.char_indices().nth(RAW_SAMPLE_LIMIT) {
            Some((cut, _)) => format!("{}…", &raw[..cut]),
            None => raw.to_string(),
        };
        Self { reason, raw_sample }
    }
}

/// Top-level error type for all Hostlink operations.
#[derive(Debug, Error)]
pub enum HostlinkError {
    // -- Bridge --
    #[error("bridge not initialized")]
    BridgeUnavailable,

    #[error("command `{command}` timed out after {timeout_ms} ms")]
    CommandTimedOut { command: String, timeout_ms: u64 },

    // -- Payloads --
    #[error("payload normalization failed: {0}")]
    Normalization(#[from] NormalizationFailure),

    #[error("coordinates out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinateRange { latitude: f64, longitude: f64 },

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HostlinkError>;
