// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Location façade over the gateway.
//
// The location screens all do the same handful of things: follow the host's
// push updates, start/stop the host listener, ask for the last known fix,
// and load a recorded track. Each operation keeps the gateway status line
// current so the page can show what happened.

use hostlink_core::error::{HostlinkError, Result};
use hostlink_core::{Ack, LocationFix, LocationNames};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::gateway::BridgeGateway;
use crate::journey::JourneySnapshot;
use crate::normalize::{normalize, normalize_track};

/// Ack message sent back for every accepted push update.
pub const RECEIVED_MESSAGE: &str = "Location received successfully";

#[derive(Clone)]
pub struct LocationService {
    gateway: BridgeGateway,
    names: LocationNames,
}

impl LocationService {
    pub fn new(gateway: BridgeGateway) -> Self {
        let names = gateway.config().location.clone();
        Self { gateway, names }
    }

    pub fn names(&self) -> &LocationNames {
        &self.names
    }

    /// Append every pushed update to the journey.
    ///
    /// Payloads that do not normalize are acked as rejected and leave the
    /// journey untouched.
    #[instrument(skip(self), fields(event = %self.names.update_event))]
    pub async fn follow_updates(&self) -> Result<()> {
        let gateway = self.gateway.clone();
        let result = self
            .gateway
            .subscribe_to_events(&self.names.update_event, move |payload| {
                accept_update(&gateway, payload)
            })
            .await;
        if let Err(err) = &result {
            self.gateway.report_error(err);
        }
        result
    }

    /// Ask the host to start pushing updates.
    pub async fn start_listener(&self) -> Result<Value> {
        let name = self.names.start_command.clone();
        self.simple_command(&name, "Location listener started successfully!")
            .await
    }

    /// Ask the host to stop pushing updates.
    pub async fn stop_listener(&self) -> Result<Value> {
        let name = self.names.stop_command.clone();
        self.simple_command(&name, "Location listener stopped.").await
    }

    /// Fetch the host's last known fix and append it to the journey.
    #[instrument(skip(self))]
    pub async fn last_location(&self) -> Result<LocationFix> {
        let name = &self.names.last_location_command;
        let response = self.command(name).await?;
        match normalize(&response) {
            Ok(fix) => {
                self.gateway.append_fix(fix);
                self.gateway
                    .set_status("Last known location retrieved successfully!");
                Ok(fix)
            }
            Err(failure) => {
                warn!(reason = %failure.reason, raw = %failure.raw_sample, "last location unreadable");
                let err = HostlinkError::Normalization(failure);
                self.gateway.report_error(&err);
                Err(err)
            }
        }
    }

    /// Fetch the recorded track and replace the journey with it.
    #[instrument(skip(self))]
    pub async fn load_track(&self) -> Result<JourneySnapshot> {
        let name = &self.names.history_command;
        let response = self.command(name).await?;
        match normalize_track(&response) {
            Ok(fixes) => {
                let count = fixes.len();
                self.gateway.replace_journey(fixes);
                self.gateway
                    .set_status(format!("Loaded {count} recorded locations."));
                info!(count, "journey replaced from recorded track");
                Ok(self.gateway.journey_snapshot())
            }
            Err(failure) => {
                warn!(reason = %failure.reason, raw = %failure.raw_sample, "recorded track unreadable");
                let err = HostlinkError::Normalization(failure);
                self.gateway.report_error(&err);
                Err(err)
            }
        }
    }

    async fn simple_command(&self, name: &str, success: &str) -> Result<Value> {
        let response = self.command(name).await?;
        debug!(command = name, ?response, "host acknowledged command");
        self.gateway.set_status(success);
        Ok(response)
    }

    /// Send with the original screens' empty-string payload.
    async fn command(&self, name: &str) -> Result<Value> {
        let outcome = self
            .gateway
            .send_command(name, Value::String(String::new()), None)
            .await;
        outcome.into_result(name).inspect_err(|err| {
            self.gateway.report_error(err);
        })
    }
}

fn accept_update(gateway: &BridgeGateway, payload: &Value) -> Ack {
    match normalize(payload) {
        Ok(fix) => {
            gateway.append_fix(fix);
            gateway.set_status(format!(
                "Location updated: {:.5}, {:.5}",
                fix.latitude, fix.longitude
            ));
            Ack::received(RECEIVED_MESSAGE)
        }
        Err(failure) => {
            warn!(reason = %failure.reason, raw = %failure.raw_sample, "push update unreadable");
            let reason = failure.to_string();
            gateway.report_error(&HostlinkError::Normalization(failure));
            Ack::rejected(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_bridge::{BridgeSlot, StubBridge};
    use hostlink_core::GatewayConfig;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn ready(stub: Arc<StubBridge>) -> LocationService {
        let slot = Arc::new(BridgeSlot::with_bridge(stub));
        let gateway = BridgeGateway::new(slot, GatewayConfig::default()).unwrap();
        gateway.wait_until_ready().await;
        gateway.location()
    }

    #[tokio::test]
    async fn push_updates_grow_journey() {
        let stub = Arc::new(StubBridge::new());
        let location = ready(Arc::clone(&stub)).await;
        location.follow_updates().await.unwrap();

        let flat = json!({ "latitude": 0.0, "longitude": 0.0 });
        let encoded = json!("{\"latitude\":0.0,\"longitude\":1.0}");
        for payload in [flat, encoded] {
            let ack = stub.emit("locationCallBack", payload).unwrap();
            assert_eq!(ack["message"], RECEIVED_MESSAGE);
        }

        let gateway = &location.gateway;
        assert_eq!(gateway.journey_snapshot().len(), 2);
        assert!((gateway.total_distance_meters() - 111_195.0).abs() < 1_112.0);
        assert!(gateway.status().starts_with("Location updated"));
    }

    #[tokio::test]
    async fn bad_push_is_rejected_and_ignored() {
        let stub = Arc::new(StubBridge::new());
        let location = ready(Arc::clone(&stub)).await;
        location.follow_updates().await.unwrap();

        let ack = stub
            .emit("locationCallBack", json!({ "latitude": 137.7749, "longitude": 0.0 }))
            .unwrap();
        assert_eq!(ack["status"], "rejected");
        assert!(location.gateway.journey_snapshot().is_empty());
        assert_eq!(
            location.gateway.status(),
            "The device reported an impossible location."
        );
    }

    #[tokio::test]
    async fn start_and_stop_update_status() {
        let stub = Arc::new(StubBridge::new());
        let location = ready(Arc::clone(&stub)).await;

        location.start_listener().await.unwrap();
        assert_eq!(location.gateway.status(), "Location listener started successfully!");
        location.stop_listener().await.unwrap();
        assert_eq!(location.gateway.status(), "Location listener stopped.");
        assert_eq!(stub.calls()[0], ("startLocationListener".to_string(), json!("")));
    }

    #[tokio::test]
    async fn last_location_appends_fix() {
        let stub = Arc::new(StubBridge::new());
        let location = ready(stub).await;

        let fix = location.last_location().await.unwrap();
        assert_eq!((fix.latitude, fix.longitude), (37.7749, -122.4194));
        assert_eq!(fix.accuracy, Some(5.0));
        assert!(fix.timestamp_millis.is_some());
        assert_eq!(location.gateway.journey_snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_last_location_times_out() {
        let stub = Arc::new(StubBridge::new());
        stub.stay_silent("getLastLocation");
        let location = ready(stub).await;

        let err = location.last_location().await.unwrap_err();
        assert!(matches!(err, HostlinkError::CommandTimedOut { timeout_ms: 5000, .. }));
        assert_eq!(location.gateway.status(), "The device did not answer in time.");
        assert!(location.gateway.journey_snapshot().is_empty());
    }

    #[tokio::test]
    async fn unreadable_last_location_leaves_journey() {
        let stub = Arc::new(StubBridge::new());
        stub.respond_with("getLastLocation", json!({ "status": "no fix yet" }));
        let location = ready(stub).await;

        let err = location.last_location().await.unwrap_err();
        assert!(matches!(err, HostlinkError::Normalization(_)));
        assert!(location.gateway.journey_snapshot().is_empty());
    }

    #[tokio::test]
    async fn load_track_replaces_journey() {
        let stub = Arc::new(StubBridge::new());
        let history = json!([
            { "latitude": 0.0, "longitude": 0.0 },
            { "latitude": 0.0, "longitude": 1.0 },
        ])
        .to_string();
        stub.respond_with("getLocationHistory", json!({ "data": history }));
        let location = ready(stub).await;
        location.gateway.append_fix(LocationFix::new(50.0, 50.0).unwrap());

        let snapshot = location.load_track().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.first().unwrap().latitude, 0.0);
        assert_eq!(location.gateway.status(), "Loaded 2 recorded locations.");
    }

    #[tokio::test]
    async fn bad_track_keeps_old_journey() {
        let stub = Arc::new(StubBridge::new());
        stub.respond_with(
            "getLocationHistory",
            json!([{ "latitude": 0.0, "longitude": 0.0 }, { "oops": true }]),
        );
        let location = ready(stub).await;
        location.gateway.append_fix(LocationFix::new(50.0, 50.0).unwrap());

        assert!(location.load_track().await.is_err());
        let snapshot = location.gateway.journey_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.first().unwrap().latitude, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_bridge_reports_status() {
        let gateway =
            BridgeGateway::new(Arc::new(BridgeSlot::empty()), GatewayConfig::default()).unwrap();
        let location = gateway.location();

        let started = tokio::time::Instant::now();
        assert!(matches!(
            location.follow_updates().await,
            Err(HostlinkError::BridgeUnavailable)
        ));
        assert!(started.elapsed() >= Duration::from_millis(3000));
        assert!(matches!(
            location.start_listener().await,
            Err(HostlinkError::BridgeUnavailable)
        ));
        assert_eq!(gateway.status(), "Bridge not initialized.");
    }
}
