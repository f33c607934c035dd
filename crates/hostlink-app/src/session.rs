// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Simulated host session.
//
// Plays the native side against a real gateway: the host boots late and
// announces its bridge, a recorded track is loaded, a short walk is pushed
// in every envelope shape the native layers produce (plus one broken
// reading), and the listener is stopped again.

use std::sync::Arc;
use std::time::Duration;

use hostlink_bridge::{BridgeLocator, BridgeSlot, StubBridge};
use hostlink_core::error::Result;
use hostlink_core::{BridgeState, Coordinate, GatewayConfig};
use hostlink_gateway::BridgeGateway;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

/// How long the simulated host takes to announce its bridge.
pub const HOST_BOOT_DELAY: Duration = Duration::from_millis(150);

const PUSH_INTERVAL: Duration = Duration::from_millis(20);

/// Golden Gate Park, as the host remembers it.
const RECORDED_TRACK: [(f64, f64); 3] = [
    (37.7694, -122.4862),
    (37.7710, -122.4700),
    (37.7725, -122.4560),
];

/// Ferry Building up towards Coit Tower.
const LIVE_WALK: [(f64, f64); 4] = [
    (37.7955, -122.3937),
    (37.7989, -122.4003),
    (37.8024, -122.4058),
    (37.8024, -122.4058),
];

/// What the session ended up with.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub bridge_state: BridgeState,
    pub status: String,
    pub fixes: usize,
    pub distance_meters: f64,
    pub accepted_updates: usize,
    pub rejected_updates: usize,
    pub polyline: Vec<Coordinate>,
}

pub async fn run(config: GatewayConfig) -> Result<SessionReport> {
    run_with(config, HOST_BOOT_DELAY).await
}

pub async fn run_with(config: GatewayConfig, boot_delay: Duration) -> Result<SessionReport> {
    let names = config.location.clone();
    let slot = Arc::new(BridgeSlot::empty());
    let stub = Arc::new(StubBridge::new());
    stub.respond_with(&names.history_command, recorded_track());

    let locator: Arc<dyn BridgeLocator> = Arc::clone(&slot) as Arc<dyn BridgeLocator>;
    let gateway = BridgeGateway::new(locator, config)?;

    let host = {
        let slot = Arc::clone(&slot);
        let stub = Arc::clone(&stub);
        tokio::spawn(async move {
            tokio::time::sleep(boot_delay).await;
            info!("host bridge announced");
            slot.announce_ready(stub);
        })
    };

    let state = gateway.wait_until_ready().await;
    if state != BridgeState::Ready {
        host.abort();
        warn!(?state, "host never came up");
        return Ok(report(&gateway, state, 0, 0));
    }

    let location = gateway.location();
    location.load_track().await?;
    location.follow_updates().await?;
    location.start_listener().await?;

    let mut accepted = 0;
    let mut rejected = 0;
    for payload in live_walk() {
        let received = stub
            .emit(&names.update_event, payload)
            .is_some_and(|ack| ack["status"] == "received");
        if received {
            accepted += 1;
        } else {
            rejected += 1;
        }
        tokio::time::sleep(PUSH_INTERVAL).await;
    }

    location.last_location().await?;
    location.stop_listener().await?;

    let report = report(&gateway, state, accepted, rejected);
    gateway.teardown();
    host.await.ok();
    info!(
        fixes = report.fixes,
        distance_m = report.distance_meters,
        rejected = report.rejected_updates,
        "session finished"
    );
    Ok(report)
}

fn report(
    gateway: &BridgeGateway,
    bridge_state: BridgeState,
    accepted_updates: usize,
    rejected_updates: usize,
) -> SessionReport {
    let snapshot = gateway.journey_snapshot();
    SessionReport {
        bridge_state,
        status: gateway.status(),
        fixes: snapshot.len(),
        distance_meters: snapshot.distance_meters(),
        accepted_updates,
        rejected_updates,
        polyline: snapshot.polyline(),
    }
}

/// The recorded track, string-encoded inside a `data` envelope.
fn recorded_track() -> Value {
    let entries: Vec<Value> = RECORDED_TRACK
        .iter()
        .map(|&(latitude, longitude)| json!({ "latitude": latitude, "longitude": longitude }))
        .collect();
    json!({ "data": Value::Array(entries).to_string() })
}

/// Live pushes cycling through flat, encoded and nested envelopes, with an
/// impossible reading slipped in before the last one.
fn live_walk() -> Vec<Value> {
    let now = chrono::Utc::now().timestamp_millis();
    let mut pushes: Vec<Value> = LIVE_WALK
        .iter()
        .enumerate()
        .map(|(i, &(latitude, longitude))| {
            let fix = json!({
                "latitude": latitude,
                "longitude": longitude,
                "accuracy": 8,
                "timestamp": now + i as i64 * 1000,
            });
            match i % 3 {
                0 => fix,
                1 => Value::String(fix.to_string()),
                _ => {
                    let inner = json!({ "respData": fix }).to_string();
                    json!({ "responseData": inner })
                }
            }
        })
        .collect();
    let last = pushes.len() - 1;
    pushes.insert(last, json!({ "latitude": 237.0, "longitude": 0.0 }));
    pushes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn full_session_builds_journey() {
        let report = run(GatewayConfig::default()).await.unwrap();

        assert_eq!(report.bridge_state, BridgeState::Ready);
        assert_eq!(report.accepted_updates, LIVE_WALK.len());
        assert_eq!(report.rejected_updates, 1);
        // Recorded track, live walk, then the last known fix.
        assert_eq!(report.fixes, RECORDED_TRACK.len() + LIVE_WALK.len() + 1);
        assert_eq!(report.polyline.len(), report.fixes);
        assert_eq!(report.polyline[0].latitude, 37.7694);
        assert!(report.distance_meters > 1_000.0);
        assert_eq!(report.status, "Location listener stopped.");
    }

    #[tokio::test(start_paused = true)]
    async fn late_host_leaves_gateway_unavailable() {
        let report = run_with(GatewayConfig::default(), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(report.bridge_state, BridgeState::Unavailable);
        assert_eq!(report.fixes, 0);
        assert_eq!(report.status, "Bridge not initialized.");
    }

    #[test]
    fn live_walk_has_one_bad_reading() {
        let pushes = live_walk();
        assert_eq!(pushes.len(), LIVE_WALK.len() + 1);
        assert!(pushes[1].is_string());
        assert!(pushes[2]["responseData"].is_string());
        assert_eq!(pushes[3]["latitude"], 237.0);
    }
}
