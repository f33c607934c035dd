// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The slot the host injects its bridge handle into.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::traits::{BridgeLocator, HostBridge};

/// Holder for the host bridge handle plus its ready notification.
///
/// The host either drops the handle in silently (`install`, visible only to
/// polling) or installs it and fires the ready notification
/// (`announce_ready`).
pub struct BridgeSlot {
    handle: Mutex<Option<Arc<dyn HostBridge>>>,
    ready_tx: watch::Sender<bool>,
}

impl Default for BridgeSlot {
    fn default() -> Self {
        Self::empty()
    }
}

impl BridgeSlot {
    /// A slot with no handle yet.
    pub fn empty() -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            handle: Mutex::new(None),
            ready_tx,
        }
    }

    /// A slot whose handle is present from the start.
    pub fn with_bridge(bridge: Arc<dyn HostBridge>) -> Self {
        let slot = Self::empty();
        slot.install(bridge);
        slot
    }

    /// Put the handle in place without notifying anyone.
    pub fn install(&self, bridge: Arc<dyn HostBridge>) {
        debug!(platform = bridge.platform_name(), "bridge handle installed");
        if let Ok(mut handle) = self.handle.lock() {
            *handle = Some(bridge);
        }
    }

    /// Install the handle and fire the ready notification.
    pub fn announce_ready(&self, bridge: Arc<dyn HostBridge>) {
        info!(platform = bridge.platform_name(), "bridge ready announced");
        self.install(bridge);
        self.ready_tx.send_replace(true);
    }

    /// Fire the ready notification without touching the handle.
    pub fn notify_ready(&self) {
        self.ready_tx.send_replace(true);
    }

    pub fn is_installed(&self) -> bool {
        self.handle.lock().map(|h| h.is_some()).unwrap_or(false)
    }
}

impl BridgeLocator for BridgeSlot {
    fn locate(&self) -> Option<Arc<dyn HostBridge>> {
        self.handle.lock().ok().and_then(|h| h.clone())
    }

    fn ready_signal(&self) -> Option<watch::Receiver<bool>> {
        Some(self.ready_tx.subscribe())
    }
}
