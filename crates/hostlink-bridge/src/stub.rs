// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub host for desktop/CI builds where no native shell injects a bridge.
//
// Answers `getLastLocation` with a fixed San Francisco fix and the listener
// commands with a short string. Unknown commands are logged and never
// answered, which is what a real host does for a handler it lacks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::traits::{AckCallback, HostBridge, PushHandler, ResponseCallback};

/// How the stub answers a given command.
#[derive(Debug, Clone)]
pub enum StubResponse {
    /// Run the callback immediately with this value.
    Reply(Value),
    /// Never run the callback.
    Silent,
    /// Keep the callback until [`StubBridge::release`] is called.
    Hold,
}

/// In-process host that records calls and lets tests push events.
pub struct StubBridge {
    responses: Mutex<HashMap<String, StubResponse>>,
    handlers: Mutex<HashMap<String, PushHandler>>,
    held: Mutex<HashMap<String, Vec<ResponseCallback>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl Default for StubBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl StubBridge {
    /// A stub preloaded with the location commands.
    pub fn new() -> Self {
        let stub = Self::bare();
        stub.respond_with("getLastLocation", Self::sample_fix());
        stub.respond_with("startLocationListener", json!("listener started"));
        stub.respond_with("stopLocationListener", json!("listener stopped"));
        stub
    }

    /// A stub that answers nothing until configured.
    pub fn bare() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The flat fix the stub reports for `getLastLocation`.
    pub fn sample_fix() -> Value {
        json!({
            "latitude": 37.7749,
            "longitude": -122.4194,
            "accuracy": 5,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn respond_with(&self, name: &str, value: Value) {
        self.set_response(name, StubResponse::Reply(value));
    }

    pub fn stay_silent(&self, name: &str) {
        self.set_response(name, StubResponse::Silent);
    }

    pub fn hold(&self, name: &str) {
        self.set_response(name, StubResponse::Hold);
    }

    fn set_response(&self, name: &str, response: StubResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(name.to_string(), response);
        }
    }

    /// Run every held callback for `name` with `value`. Returns how many ran.
    pub fn release(&self, name: &str, value: Value) -> usize {
        let callbacks = self
            .held
            .lock()
            .ok()
            .and_then(|mut held| held.remove(name))
            .unwrap_or_default();
        let count = callbacks.len();
        for callback in callbacks {
            callback(value.clone());
        }
        count
    }

    /// Deliver a push event the way the host would.
    ///
    /// Returns the ack the page sent back, or `None` if no handler is
    /// registered or the handler never acked.
    pub fn emit(&self, event: &str, payload: Value) -> Option<Value> {
        let handler = self.handlers.lock().ok()?.get(event).cloned();
        let Some(handler) = handler else {
            warn!(event, "push event has no registered handler");
            return None;
        };

        let slot: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        let ack: AckCallback = Box::new(move |value| {
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(value);
            }
        });
        handler(payload, ack);

        slot.lock().ok().and_then(|mut s| s.take())
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.handlers
            .lock()
            .map(|h| h.contains_key(event))
            .unwrap_or(false)
    }

    /// Every `(command, payload)` the page sent, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.iter().filter(|(n, _)| n == name).count())
            .unwrap_or(0)
    }
}

impl HostBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn call_handler(&self, name: &str, data: Value, callback: ResponseCallback) {
        debug!(command = name, "stub host received command");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((name.to_string(), data));
        }

        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(name).cloned());

        match response {
            Some(StubResponse::Reply(value)) => callback(value),
            Some(StubResponse::Hold) => {
                if let Ok(mut held) = self.held.lock() {
                    held.entry(name.to_string()).or_default().push(callback);
                }
            }
            Some(StubResponse::Silent) => {}
            None => warn!(command = name, "stub host has no handler for command"),
        }
    }

    fn register_handler(&self, name: &str, handler: PushHandler) {
        debug!(event = name, "stub host registered push handler");
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.insert(name.to_string(), handler);
        }
    }
}
