// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge readiness detection.
//
// The host either injects its handle before the page runs, or injects it
// later and fires a ready notification. We poll for the handle and listen
// for the notification at the same time; whichever wins first decides. If
// neither shows up within the grace period the bridge is Unavailable for
// good. The grace period runs from the very first check, even if the
// waiter that started detection is cancelled and a later one resumes it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostlink_bridge::{BridgeLocator, HostBridge};
use hostlink_core::{BridgeState, GatewayConfig};
use tokio::sync::{OnceCell, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Which source woke the wait loop.
enum Wake {
    Deadline,
    Poll,
    Notified,
}

/// Decides, once, whether the host bridge can be used.
pub struct ReadinessDetector {
    locator: Arc<dyn BridgeLocator>,
    grace: Duration,
    poll: Duration,
    state: Mutex<BridgeState>,
    first_check: Mutex<Option<Instant>>,
    outcome: OnceCell<Option<Arc<dyn HostBridge>>>,
}

impl ReadinessDetector {
    pub fn new(locator: Arc<dyn BridgeLocator>, config: &GatewayConfig) -> Self {
        Self::with_timing(locator, config.ready_grace(), config.ready_poll())
    }

    pub fn with_timing(locator: Arc<dyn BridgeLocator>, grace: Duration, poll: Duration) -> Self {
        Self {
            locator,
            grace,
            poll: poll.max(Duration::from_millis(1)),
            state: Mutex::new(BridgeState::Uninitialized),
            first_check: Mutex::new(None),
            outcome: OnceCell::new(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(BridgeState::Unavailable)
    }

    /// The host handle, only once the detector has settled on `Ready`.
    pub fn bridge(&self) -> Option<Arc<dyn HostBridge>> {
        self.outcome.get().and_then(|bridge| bridge.clone())
    }

    /// Resolve to `Ready` or `Unavailable`.
    ///
    /// Detection runs once; concurrent and later callers all observe the
    /// same answer.
    pub async fn wait_until_ready(&self) -> BridgeState {
        let outcome = self.outcome.get_or_init(|| self.detect()).await;
        if outcome.is_some() {
            BridgeState::Ready
        } else {
            BridgeState::Unavailable
        }
    }

    async fn detect(&self) -> Option<Arc<dyn HostBridge>> {
        let first_check = self.first_check_at();
        if let Some(bridge) = self.locator.locate() {
            info!(platform = bridge.platform_name(), "bridge present at first check");
            self.set_state(BridgeState::Ready);
            return Some(bridge);
        }

        self.set_state(BridgeState::AwaitingReady);
        debug!(
            grace_ms = self.grace.as_millis() as u64,
            poll_ms = self.poll.as_millis() as u64,
            "bridge absent, awaiting ready signal"
        );

        let mut signal = self.locator.ready_signal();
        let deadline = tokio::time::sleep_until(first_check + self.grace);
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval(self.poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                _ = &mut deadline => Wake::Deadline,
                _ = poll.tick() => Wake::Poll,
                _ = next_ready(&mut signal) => Wake::Notified,
            };

            match wake {
                Wake::Deadline => {
                    warn!(
                        grace_ms = self.grace.as_millis() as u64,
                        "no bridge within grace period"
                    );
                    self.set_state(BridgeState::Unavailable);
                    return None;
                }
                Wake::Poll => {
                    if let Some(bridge) = self.locator.locate() {
                        info!(platform = bridge.platform_name(), "bridge appeared on poll");
                        self.set_state(BridgeState::Ready);
                        return Some(bridge);
                    }
                }
                Wake::Notified => {
                    // One notification is all the host sends; keep polling
                    // if the handle is not in place yet.
                    signal = None;
                    if let Some(bridge) = self.locator.locate() {
                        info!(platform = bridge.platform_name(), "bridge ready notification");
                        self.set_state(BridgeState::Ready);
                        return Some(bridge);
                    }
                    debug!("ready notification fired before handle was installed");
                }
            }
        }
    }

    /// When detection first looked for the handle. Fixed on the first call.
    fn first_check_at(&self) -> Instant {
        self.first_check
            .lock()
            .map(|mut at| *at.get_or_insert_with(Instant::now))
            .unwrap_or_else(|_| Instant::now())
    }

    fn set_state(&self, next: BridgeState) {
        if let Ok(mut state) = self.state.lock() {
            debug!(from = ?*state, to = ?next, "bridge state transition");
            *state = next;
        }
    }
}

/// Resolve when the ready notification is (or already was) raised. Never
/// resolves without a live notification source.
async fn next_ready(signal: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = signal.as_mut() {
        if rx.wait_for(|ready| *ready).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_bridge::{BridgeSlot, StubBridge};

    const GRACE: Duration = Duration::from_millis(3000);
    const POLL: Duration = Duration::from_millis(50);

    fn detector(slot: &Arc<BridgeSlot>) -> ReadinessDetector {
        ReadinessDetector::with_timing(Arc::clone(slot) as Arc<dyn BridgeLocator>, GRACE, POLL)
    }

    #[tokio::test(start_paused = true)]
    async fn present_handle_is_ready_without_waiting() {
        let slot = Arc::new(BridgeSlot::with_bridge(Arc::new(StubBridge::new())));
        let detector = detector(&slot);
        assert_eq!(detector.state(), BridgeState::Uninitialized);

        let start = Instant::now();
        assert_eq!(detector.wait_until_ready().await, BridgeState::Ready);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(detector.bridge().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_handle_is_unavailable_after_grace() {
        let slot = Arc::new(BridgeSlot::empty());
        let detector = detector(&slot);

        let start = Instant::now();
        assert_eq!(detector.wait_until_ready().await, BridgeState::Unavailable);
        let waited = start.elapsed();
        assert!(waited >= GRACE, "resolved early after {waited:?}");
        assert!(waited < GRACE + POLL);
        assert_eq!(detector.state(), BridgeState::Unavailable);
        assert!(detector.bridge().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_keeps_original_deadline() {
        let slot = Arc::new(BridgeSlot::empty());
        let detector = detector(&slot);

        let start = Instant::now();
        let first =
            tokio::time::timeout(Duration::from_millis(1000), detector.wait_until_ready()).await;
        assert!(first.is_err());
        assert_eq!(detector.state(), BridgeState::AwaitingReady);

        assert_eq!(detector.wait_until_ready().await, BridgeState::Unavailable);
        let waited = start.elapsed();
        assert!(waited >= GRACE, "resolved early after {waited:?}");
        assert!(waited < GRACE + POLL, "grace restarted, resolved after {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_is_terminal() {
        let slot = Arc::new(BridgeSlot::empty());
        let detector = detector(&slot);
        assert_eq!(detector.wait_until_ready().await, BridgeState::Unavailable);

        slot.announce_ready(Arc::new(StubBridge::new()));
        assert_eq!(detector.wait_until_ready().await, BridgeState::Unavailable);
        assert!(detector.bridge().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn notification_wins_before_next_poll() {
        let slot = Arc::new(BridgeSlot::empty());
        let detector = Arc::new(ReadinessDetector::with_timing(
            Arc::clone(&slot) as Arc<dyn BridgeLocator>,
            GRACE,
            Duration::from_secs(60),
        ));

        let waiter = {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move { detector.wait_until_ready().await })
        };
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(detector.state(), BridgeState::AwaitingReady);

        let start = Instant::now();
        slot.announce_ready(Arc::new(StubBridge::new()));
        assert_eq!(waiter.await.unwrap(), BridgeState::Ready);
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_install_found_by_polling() {
        let slot = Arc::new(BridgeSlot::empty());
        let detector = Arc::new(detector(&slot));

        let waiter = {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move { detector.wait_until_ready().await })
        };
        tokio::time::sleep(Duration::from_millis(1000)).await;
        slot.install(Arc::new(StubBridge::new()));

        let start = Instant::now();
        assert_eq!(waiter.await.unwrap(), BridgeState::Ready);
        assert!(start.elapsed() <= POLL);
    }

    #[tokio::test(start_paused = true)]
    async fn early_notification_without_handle_falls_back_to_polling() {
        let slot = Arc::new(BridgeSlot::empty());
        slot.notify_ready();
        let detector = Arc::new(detector(&slot));

        let waiter = {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move { detector.wait_until_ready().await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        slot.install(Arc::new(StubBridge::new()));
        assert_eq!(waiter.await.unwrap(), BridgeState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_share_outcome() {
        let slot = Arc::new(BridgeSlot::empty());
        let detector = Arc::new(detector(&slot));

        let a = {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move { detector.wait_until_ready().await })
        };
        let b = {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move { detector.wait_until_ready().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        slot.announce_ready(Arc::new(StubBridge::new()));

        assert_eq!(a.await.unwrap(), BridgeState::Ready);
        assert_eq!(b.await.unwrap(), BridgeState::Ready);
    }
}
