// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Composition root — wires readiness, commands, events, and the journey
// together and exposes the API presentation code calls.
//
// All fields are Arc-wrapped so the gateway can be cloned into push handlers
// and async blocks freely. Locks are never held across an await or a host
// call.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostlink_bridge::BridgeLocator;
use hostlink_core::error::{HostlinkError, Result};
use hostlink_core::human_errors::humanize_error;
use hostlink_core::{Ack, BridgeState, GatewayConfig, LocationFix};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::command::{CommandChannel, CommandOutcome};
use crate::events::EventSubscription;
use crate::journey::{JourneyAggregator, JourneySnapshot};
use crate::location::LocationService;
use crate::readiness::ReadinessDetector;

/// Status shown before anything has happened.
pub const IDLE_STATUS: &str = "Idle";

#[derive(Clone)]
pub struct BridgeGateway {
    config: Arc<GatewayConfig>,
    readiness: Arc<ReadinessDetector>,
    commands: Arc<CommandChannel>,
    events: Arc<EventSubscription>,
    journey: Arc<Mutex<JourneyAggregator>>,
    status: Arc<Mutex<String>>,
}

impl BridgeGateway {
    /// Build a gateway over `locator`. Does not touch the host yet.
    pub fn new(locator: Arc<dyn BridgeLocator>, config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let readiness = Arc::new(ReadinessDetector::new(locator, &config));
        let commands = Arc::new(CommandChannel::new(
            Arc::clone(&readiness),
            config.command_timeout(),
        ));
        let events = Arc::new(EventSubscription::new(Arc::clone(&readiness)));

        Ok(Self {
            config: Arc::new(config),
            readiness,
            commands,
            events,
            journey: Arc::new(Mutex::new(JourneyAggregator::new())),
            status: Arc::new(Mutex::new(IDLE_STATUS.to_string())),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    // -- Readiness -----------------------------------------------------------

    /// Wait for the bridge. `Unavailable` is reported through `status()`.
    #[instrument(skip(self))]
    pub async fn wait_until_ready(&self) -> BridgeState {
        let state = self.readiness.wait_until_ready().await;
        if state == BridgeState::Unavailable {
            self.report_error(&HostlinkError::BridgeUnavailable);
        }
        state
    }

    pub fn bridge_state(&self) -> BridgeState {
        self.readiness.state()
    }

    // -- Commands ------------------------------------------------------------

    /// Send a correlated command. Uses the configured timeout when `None`.
    pub async fn send_command(
        &self,
        name: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> CommandOutcome {
        self.commands.send(name, payload, timeout).await
    }

    /// Send a command without waiting for its answer.
    pub fn fire_command(&self, name: &str, payload: Value) -> Result<()> {
        self.commands.fire(name, payload)
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.pending_count()
    }

    // -- Events --------------------------------------------------------------

    /// Subscribe once the bridge is ready, replacing any earlier handler.
    #[instrument(skip(self, handler))]
    pub async fn subscribe_to_events<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&Value) -> Ack + Send + Sync + 'static,
    {
        if self.wait_until_ready().await != BridgeState::Ready {
            return Err(HostlinkError::BridgeUnavailable);
        }
        self.events.subscribe(name, handler)
    }

    pub fn unsubscribe(&self, name: &str) -> bool {
        self.events.unsubscribe(name)
    }

    pub fn subscribed_events(&self) -> Vec<String> {
        self.events.subscribed_events()
    }

    // -- Journey -------------------------------------------------------------

    pub fn journey_snapshot(&self) -> JourneySnapshot {
        self.journey
            .lock()
            .map(|mut j| j.current_journey())
            .unwrap_or_default()
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.journey
            .lock()
            .map(|j| j.total_distance_meters())
            .unwrap_or(0.0)
    }

    pub fn append_fix(&self, fix: LocationFix) {
        if let Ok(mut journey) = self.journey.lock() {
            journey.append_fix(fix);
        }
    }

    pub fn replace_journey(&self, fixes: Vec<LocationFix>) {
        if let Ok(mut journey) = self.journey.lock() {
            journey.replace_journey(fixes);
        }
    }

    // -- Status --------------------------------------------------------------

    /// Last user-facing status line.
    pub fn status(&self) -> String {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| IDLE_STATUS.to_string())
    }

    pub fn set_status(&self, message: impl Into<String>) {
        if let Ok(mut status) = self.status.lock() {
            *status = message.into();
        }
    }

    /// Log `err` and turn it into the status line.
    pub fn report_error(&self, err: &HostlinkError) {
        let human = humanize_error(err);
        warn!(error = %err, retriable = human.retriable, "{}", human.message);
        self.set_status(human.message);
    }

    // -- Facades and lifecycle -----------------------------------------------

    /// Location commands and updates using the configured host names.
    pub fn location(&self) -> LocationService {
        LocationService::new(self.clone())
    }

    /// Release every pending command and local handler. Commands and
    /// subscriptions after this resolve as `BridgeUnavailable`.
    pub fn teardown(&self) {
        let dropped = self.commands.shutdown();
        self.events.clear();
        info!(dropped, "gateway torn down");
    }
}
