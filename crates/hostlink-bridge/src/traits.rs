// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait definitions for the native host bridge.
//
// Callbacks cross the boundary as boxed closures. The host may run them on
// whatever thread delivers its messages, so everything here is Send + Sync.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

/// One-shot callback carrying the host's response to a command.
pub type ResponseCallback = Box<dyn FnOnce(Value) + Send + 'static>;

/// One-shot callback the push handler uses to acknowledge a delivery.
pub type AckCallback = Box<dyn FnOnce(Value) + Send + 'static>;

/// Handler the host invokes for every delivery of a push event.
pub type PushHandler = Arc<dyn Fn(Value, AckCallback) + Send + Sync + 'static>;

/// The injected host handle.
pub trait HostBridge: Send + Sync {
    /// Human-readable host name (e.g. "Android WebView", "Desktop (stub)").
    fn platform_name(&self) -> &str;

    /// Invoke a named host command.
    ///
    /// The host runs `callback` at most once and may never run it at all.
    fn call_handler(&self, name: &str, data: Value, callback: ResponseCallback);

    /// Install the handler for a named push event, replacing any previous one.
    fn register_handler(&self, name: &str, handler: PushHandler);
}

/// Where the gateway looks for the host handle.
pub trait BridgeLocator: Send + Sync {
    /// Poll for the handle. `None` while the host has not injected it.
    fn locate(&self) -> Option<Arc<dyn HostBridge>>;

    /// Out-of-band ready notification, flipped to `true` when the host
    /// announces the bridge. Locators without one return `None`.
    fn ready_signal(&self) -> Option<watch::Receiver<bool>> {
        None
    }
}
