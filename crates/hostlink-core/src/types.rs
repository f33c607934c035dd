// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Hostlink bridge gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{HostlinkError, Result};

/// Identifier matching a host response to the command that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of the host bridge handle as seen from the web view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeState {
    /// Nobody has checked for the handle yet.
    Uninitialized,
    /// Handle was absent on the first check; waiting for a ready signal.
    AwaitingReady,
    /// Handle is present and safe to call.
    Ready,
    /// No ready signal arrived within the grace period. Terminal.
    Unavailable,
}

impl BridgeState {
    /// Whether the detector has reached a final answer.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready | Self::Unavailable)
    }
}

/// A plain latitude/longitude pair handed to map and geocoding collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A single reported geographic position.
///
/// Construction goes through [`LocationFix::new`], which rejects non-finite
/// and out-of-range coordinates instead of clamping them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters, when the host reports it.
    pub accuracy: Option<f64>,
    /// Unix time in milliseconds, when the host reports it.
    pub timestamp_millis: Option<i64>,
}

impl LocationFix {
    /// Validate and build a fix with no accuracy or timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !in_range {
            return Err(HostlinkError::InvalidCoordinateRange {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy: None,
            timestamp_millis: None,
        })
    }

    pub fn with_accuracy(mut self, accuracy: Option<f64>) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_timestamp_millis(mut self, timestamp_millis: Option<i64>) -> Self {
        self.timestamp_millis = timestamp_millis;
        self
    }

    /// The bare coordinate pair, stripped of metadata.
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Timestamp as a UTC datetime, if present and representable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp_millis
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

/// Acknowledgment returned to the host for every push delivery.
///
/// The host may redeliver on `Rejected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Ack {
    Received { message: String },
    Rejected { reason: String },
}

impl Ack {
    pub fn received(message: impl Into<String>) -> Self {
        Self::Received {
            message: message.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_received(&self) -> bool {
        matches!(self, Self::Received { .. })
    }

    /// Wire form handed to the host's ack callback.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Received { message } => json!({ "status": "received", "message": message }),
            Self::Rejected { reason } => json!({ "status": "rejected", "reason": reason }),
        }
    }
}
