// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable status messages for bridge failures.
//
// Nothing in the gateway is fatal; every error ends up as a status line the
// presentation layer can show, plus a hint about what to do next.

use crate::error::{FailureReason, HostlinkError};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Slow host, dropped delivery — trying again may work.
    Transient,
    /// User must do something (grant permission, open inside the app).
    ActionRequired,
    /// Retrying will not help — bad data or misconfiguration.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as the status line).
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Whether repeating the same request may succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `HostlinkError` into a `HumanError`.
pub fn humanize_error(err: &HostlinkError) -> HumanError {
    match err {
        HostlinkError::BridgeUnavailable => HumanError {
            message: "Bridge not initialized.".into(),
            suggestion: "Open this page inside the app so it can reach your device.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        HostlinkError::CommandTimedOut { command, timeout_ms } => HumanError {
            message: "The device did not answer in time.".into(),
            suggestion: format!(
                "Try again in a moment. (Command: {command}, waited {} s)",
                timeout_ms / 1000
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        HostlinkError::Normalization(failure) => match &failure.reason {
            FailureReason::OutOfRange { .. } => HumanError {
                message: "The device reported an impossible location.".into(),
                suggestion: "Wait for a better GPS signal, then refresh.".into(),
                retriable: true,
                severity: Severity::Transient,
            },
            FailureReason::Empty => HumanError {
                message: "No location data received.".into(),
                suggestion: "Make sure location access is turned on for this app.".into(),
                retriable: true,
                severity: Severity::ActionRequired,
            },
            other => HumanError {
                message: "The device sent location data we couldn't read.".into(),
                suggestion: format!("Try refreshing. If this keeps happening, update the app. ({other})"),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        HostlinkError::InvalidCoordinateRange { .. } => HumanError {
            message: "The device reported an impossible location.".into(),
            suggestion: "Wait for a better GPS signal, then refresh.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        HostlinkError::Config(detail) => HumanError {
            message: "The bridge settings are invalid.".into(),
            suggestion: format!("Reset the settings to their defaults. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        HostlinkError::Io(io_err) => HumanError {
            message: "Settings could not be read or saved.".into(),
            suggestion: format!("Check that the app has storage access. ({io_err})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        HostlinkError::Serialization(detail) => HumanError {
            message: "The saved settings are damaged.".into(),
            suggestion: format!("Reset the settings to their defaults. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NormalizationFailure;

    #[test]
    fn unavailable_bridge_reads_like_original_status() {
        let human = humanize_error(&HostlinkError::BridgeUnavailable);
        assert_eq!(human.message, "Bridge not initialized.");
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn timeout_is_transient() {
        let err = HostlinkError::CommandTimedOut {
            command: "getLastLocation".into(),
            timeout_ms: 5000,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
        assert!(human.suggestion.contains("getLastLocation"));
    }

    #[test]
    fn out_of_range_payload_is_transient() {
        let failure = NormalizationFailure::new(
            FailureReason::OutOfRange {
                latitude: 137.0,
                longitude: 0.0,
            },
            "{}",
        );
        let human = humanize_error(&HostlinkError::Normalization(failure));
        assert_eq!(human.severity, Severity::Transient);
    }

    #[test]
    fn bad_config_is_permanent() {
        let human = humanize_error(&HostlinkError::Config("ready_poll_ms".into()));
        assert_eq!(human.severity, Severity::Permanent);
    }
}
