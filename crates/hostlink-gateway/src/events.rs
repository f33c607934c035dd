// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Push-event subscriptions.
//
// The host keeps one handler slot per event name. We install a trampoline
// that looks up the current local handler on every delivery, so
// re-subscribing replaces the handler and every delivery is acked exactly
// once, even when nobody is listening any more.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use hostlink_bridge::PushHandler;
use hostlink_core::Ack;
use hostlink_core::error::{HostlinkError, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::readiness::ReadinessDetector;

/// Local handler for a push event. Its return value is sent back to the host.
pub type EventHandler = Arc<dyn Fn(&Value) -> Ack + Send + Sync + 'static>;

pub struct EventSubscription {
    readiness: Arc<ReadinessDetector>,
    handlers: Arc<Mutex<HashMap<String, EventHandler>>>,
    closed: AtomicBool,
}

impl EventSubscription {
    pub fn new(readiness: Arc<ReadinessDetector>) -> Self {
        Self {
            readiness,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Register `handler` for `event`, replacing any previous handler.
    pub fn subscribe<F>(&self, event: &str, handler: F) -> Result<()>
    where
        F: Fn(&Value) -> Ack + Send + Sync + 'static,
    {
        let bridge = self.readiness.bridge().ok_or(HostlinkError::BridgeUnavailable)?;

        let replaced = {
            let mut handlers = self
                .handlers
                .lock()
                .map_err(|_| HostlinkError::BridgeUnavailable)?;
            if self.closed.load(Ordering::SeqCst) {
                warn!(event, "subscription refused, events closed");
                return Err(HostlinkError::BridgeUnavailable);
            }
            handlers.insert(event.to_string(), Arc::new(handler)).is_some()
        };

        bridge.register_handler(event, self.trampoline(event));
        info!(event, replaced, "subscribed to host event");
        Ok(())
    }

    /// Forget the local handler. Later deliveries are acked as rejected.
    pub fn unsubscribe(&self, event: &str) -> bool {
        let removed = self
            .handlers
            .lock()
            .map(|mut h| h.remove(event).is_some())
            .unwrap_or(false);
        if removed {
            info!(event, "unsubscribed from host event");
        }
        removed
    }

    pub fn subscribed_events(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .lock()
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Drop every local handler and refuse new subscriptions.
    pub fn clear(&self) {
        match self.handlers.lock() {
            Ok(mut handlers) => {
                self.closed.store(true, Ordering::SeqCst);
                handlers.clear();
            }
            Err(_) => self.closed.store(true, Ordering::SeqCst),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn trampoline(&self, event: &str) -> PushHandler {
        let handlers = Arc::clone(&self.handlers);
        let event = event.to_string();
        Arc::new(move |payload, ack| {
            // Clone out of the lock so the handler may itself subscribe.
            let handler = handlers.lock().ok().and_then(|h| h.get(&event).cloned());
            let reply = match handler {
                Some(handler) => handler(&payload),
                None => {
                    warn!(event = %event, "delivery for event with no subscriber");
                    Ack::rejected(format!("no subscriber for {event}"))
                }
            };
            debug!(event = %event, received = reply.is_received(), "acknowledging host event");
            ack(reply.to_value());
        })
    }
}
