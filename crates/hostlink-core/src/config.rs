// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HostlinkError, Result};

/// Host handler names used by the location screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationNames {
    /// Push event carrying continuous location updates.
    pub update_event: String,
    /// Command that starts the host's location listener.
    pub start_command: String,
    /// Command that stops the host's location listener.
    pub stop_command: String,
    /// Command returning the last known single fix.
    pub last_location_command: String,
    /// Command returning the recorded track as a list of fixes.
    pub history_command: String,
}

impl Default for LocationNames {
    fn default() -> Self {
        Self {
            update_event: "locationCallBack".into(),
            start_command: "startLocationListener".into(),
            stop_command: "stopLocationListener".into(),
            last_location_command: "getLastLocation".into(),
            history_command: "getLocationHistory".into(),
        }
    }
}

/// Persistent gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// How long to wait for the bridge handle before giving up (default 3000).
    pub ready_grace_ms: u64,
    /// Interval between handle polls while awaiting readiness (default 50).
    pub ready_poll_ms: u64,
    /// Default budget for a correlated command (default 5000).
    pub command_timeout_ms: u64,
    pub location: LocationNames,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ready_grace_ms: 3000,
            ready_poll_ms: 50,
            command_timeout_ms: 5000,
            location: LocationNames::default(),
        }
    }
}

impl GatewayConfig {
    pub fn ready_grace(&self) -> Duration {
        Duration::from_millis(self.ready_grace_ms)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ready_poll_ms == 0 {
            return Err(HostlinkError::Config("ready_poll_ms must be positive".into()));
        }
        if self.command_timeout_ms == 0 {
            return Err(HostlinkError::Config(
                "command_timeout_ms must be positive".into(),
            ));
        }
        let names = &self.location;
        let all = [
            &names.update_event,
            &names.start_command,
            &names.stop_command,
            &names.last_location_command,
            &names.history_command,
        ];
        if all.iter().any(|n| n.trim().is_empty()) {
            return Err(HostlinkError::Config(
                "location handler names must not be empty".into(),
            ));
        }
        Ok(())
    }
}
