// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Correlated request/response commands over the host bridge.
//
// Each `send` registers a pending entry keyed by a fresh correlation id and
// hands the host a one-shot callback bound to that id. The entry leaves the
// pending set exactly once: on response, on timeout, on teardown, or when
// the caller drops the future. Responses for ids no longer pending are
// logged and discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostlink_bridge::ResponseCallback;
use hostlink_core::CorrelationId;
use hostlink_core::error::{HostlinkError, Result};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::readiness::ReadinessDetector;

/// How a command ended. Failures are values, not errors, so callers can
/// render a status line without unwinding.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The host answered.
    Ok(Value),
    /// The host did not answer within the budget.
    TimedOut { timeout_ms: u64 },
    /// The bridge is not ready, or the gateway was torn down mid-flight.
    BridgeUnavailable,
}

impl CommandOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Convert into the crate-wide `Result`, naming the command on timeout.
    pub fn into_result(self, command: &str) -> Result<Value> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::TimedOut { timeout_ms } => Err(HostlinkError::CommandTimedOut {
                command: command.to_string(),
                timeout_ms,
            }),
            Self::BridgeUnavailable => Err(HostlinkError::BridgeUnavailable),
        }
    }
}

/// A command waiting on its host response.
struct PendingCommand {
    command_name: String,
    issued_at: Instant,
    timeout: Duration,
    resolve: oneshot::Sender<Value>,
}

type PendingSet = Arc<Mutex<HashMap<CorrelationId, PendingCommand>>>;

/// Removes the pending entry if the `send` future is dropped early.
struct PendingGuard {
    pending: PendingSet,
    id: CorrelationId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(cmd) = pending.remove(&self.id) {
                debug!(
                    correlation_id = %self.id,
                    command = %cmd.command_name,
                    "caller abandoned pending command"
                );
            }
        }
    }
}

/// Sends named commands to the host and resolves one correlated response.
pub struct CommandChannel {
    readiness: Arc<ReadinessDetector>,
    pending: PendingSet,
    default_timeout: Duration,
    closed: AtomicBool,
}

impl CommandChannel {
    pub fn new(readiness: Arc<ReadinessDetector>, default_timeout: Duration) -> Self {
        Self {
            readiness,
            pending: Arc::new(Mutex::new(HashMap::new())),
            default_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Send `name` with `payload` and wait for the host's answer.
    ///
    /// Returns `BridgeUnavailable` at once, without contacting the host, if
    /// readiness has not settled on `Ready` or the channel has been shut
    /// down. No retries are attempted.
    #[instrument(skip(self, payload), fields(command = name))]
    pub async fn send(&self, name: &str, payload: Value, timeout: Option<Duration>) -> CommandOutcome {
        let Some(bridge) = self.readiness.bridge() else {
            warn!("command refused, bridge not ready");
            return CommandOutcome::BridgeUnavailable;
        };
        let timeout = timeout.unwrap_or(self.default_timeout);

        let Some((id, rx)) = self.register(name, timeout) else {
            warn!("command refused, channel shut down");
            return CommandOutcome::BridgeUnavailable;
        };
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            id,
        };

        debug!(correlation_id = %id, timeout_ms = timeout.as_millis() as u64, "sending command");
        bridge.call_handler(name, payload, self.response_callback(id));

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => {
                debug!(correlation_id = %id, "command resolved");
                CommandOutcome::Ok(value)
            }
            Ok(Err(_)) => {
                info!(correlation_id = %id, "command dropped during teardown");
                CommandOutcome::BridgeUnavailable
            }
            Err(_) => {
                let expired = self.pending.lock().ok().and_then(|mut p| p.remove(&id));
                if let Some(cmd) = expired {
                    warn!(
                        correlation_id = %id,
                        elapsed_ms = cmd.issued_at.elapsed().as_millis() as u64,
                        budget_ms = cmd.timeout.as_millis() as u64,
                        "command timed out"
                    );
                }
                CommandOutcome::TimedOut {
                    timeout_ms: timeout.as_millis() as u64,
                }
            }
        }
    }

    /// Send without waiting. Whatever the host answers is only logged.
    pub fn fire(&self, name: &str, payload: Value) -> Result<()> {
        if self.is_closed() {
            return Err(HostlinkError::BridgeUnavailable);
        }
        let bridge = self.readiness.bridge().ok_or(HostlinkError::BridgeUnavailable)?;
        let command = name.to_string();
        debug!(command = name, "firing command");
        bridge.call_handler(
            name,
            payload,
            Box::new(move |response| {
                debug!(command = %command, ?response, "fire-and-forget command answered");
            }),
        );
        Ok(())
    }

    /// Drop every pending command and refuse new ones. Waiters observe
    /// `BridgeUnavailable`.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<PendingCommand> = self
            .pending
            .lock()
            .map(|mut p| {
                self.closed.store(true, Ordering::SeqCst);
                p.drain().map(|(_, cmd)| cmd).collect()
            })
            .unwrap_or_else(|_| {
                self.closed.store(true, Ordering::SeqCst);
                Vec::new()
            });
        if !drained.is_empty() {
            info!(count = drained.len(), "discarding pending commands on teardown");
        }
        drained.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn register(&self, name: &str, timeout: Duration) -> Option<(CorrelationId, oneshot::Receiver<Value>)> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().ok()?;
        // Checked under the lock so a concurrent shutdown cannot miss the entry.
        if self.is_closed() {
            return None;
        }
        let mut id = CorrelationId::new();
        while pending.contains_key(&id) {
            id = CorrelationId::new();
        }
        pending.insert(
            id,
            PendingCommand {
                command_name: name.to_string(),
                issued_at: Instant::now(),
                timeout,
                resolve: tx,
            },
        );
        Some((id, rx))
    }

    fn response_callback(&self, id: CorrelationId) -> ResponseCallback {
        let pending = Arc::clone(&self.pending);
        Box::new(move |response| {
            let entry = pending.lock().ok().and_then(|mut p| p.remove(&id));
            match entry {
                Some(cmd) => {
                    if cmd.resolve.send(response).is_err() {
                        debug!(correlation_id = %id, "response arrived after waiter left");
                    }
                }
                None => warn!(
                    correlation_id = %id,
                    "late host response discarded"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_bridge::{BridgeLocator, BridgeSlot, StubBridge};
    use serde_json::json;

    async fn ready_channel(stub: Arc<StubBridge>, timeout: Duration) -> CommandChannel {
        let slot = Arc::new(BridgeSlot::with_bridge(stub));
        let readiness = Arc::new(ReadinessDetector::with_timing(
            slot as Arc<dyn BridgeLocator>,
            Duration::from_secs(3),
            Duration::from_millis(50),
        ));
        readiness.wait_until_ready().await;
        CommandChannel::new(readiness, timeout)
    }

    #[tokio::test(start_paused = true)]
    async fn answered_command_resolves() {
        let stub = Arc::new(StubBridge::new());
        let channel = ready_channel(Arc::clone(&stub), Duration::from_secs(5)).await;

        let outcome = channel.send("getLastLocation", json!(""), None).await;
        match outcome {
            CommandOutcome::Ok(value) => assert_eq!(value["longitude"], -122.4194),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(channel.pending_count(), 0);
        assert_eq!(stub.calls()[0].1, json!(""));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_host_times_out_exactly() {
        let stub = Arc::new(StubBridge::bare());
        stub.stay_silent("scanBle");
        let channel = ready_channel(stub, Duration::from_secs(5)).await;

        let start = Instant::now();
        let outcome = channel.send("scanBle", Value::Null, None).await;
        assert_eq!(outcome, CommandOutcome::TimedOut { timeout_ms: 5000 });
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_timeout_overrides_default() {
        let stub = Arc::new(StubBridge::bare());
        stub.stay_silent("slow");
        let channel = ready_channel(stub, Duration::from_secs(5)).await;

        let start = Instant::now();
        let outcome = channel
            .send("slow", Value::Null, Some(Duration::from_millis(750)))
            .await;
        assert!(matches!(outcome, CommandOutcome::TimedOut { timeout_ms: 750 }));
        assert_eq!(start.elapsed(), Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_is_discarded() {
        let stub = Arc::new(StubBridge::bare());
        stub.hold("slow");
        let channel = ready_channel(Arc::clone(&stub), Duration::from_millis(100)).await;

        let outcome = channel.send("slow", Value::Null, None).await;
        assert!(matches!(outcome, CommandOutcome::TimedOut { .. }));
        assert_eq!(stub.release("slow", json!("too late")), 1);
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn held_response_resolves_before_timeout() {
        let stub = Arc::new(StubBridge::bare());
        stub.hold("slow");
        let channel = Arc::new(ready_channel(Arc::clone(&stub), Duration::from_secs(5)).await);

        let task = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.send("slow", Value::Null, None).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(channel.pending_count(), 1);
        stub.release("slow", json!({ "ok": true }));

        assert_eq!(task.await.unwrap(), CommandOutcome::Ok(json!({ "ok": true })));
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_never_contacts_host() {
        let stub = Arc::new(StubBridge::new());
        let slot = Arc::new(BridgeSlot::with_bridge(Arc::clone(&stub) as _));
        let readiness = Arc::new(ReadinessDetector::with_timing(
            slot as Arc<dyn BridgeLocator>,
            Duration::from_secs(3),
            Duration::from_millis(50),
        ));
        let channel = CommandChannel::new(readiness, Duration::from_secs(5));

        let outcome = channel.send("getLastLocation", Value::Null, None).await;
        assert_eq!(outcome, CommandOutcome::BridgeUnavailable);
        assert!(stub.calls().is_empty());
        assert!(channel.fire("startLocationListener", Value::Null).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_waiters() {
        let stub = Arc::new(StubBridge::bare());
        stub.hold("slow");
        let channel = Arc::new(ready_channel(stub, Duration::from_secs(5)).await);

        let task = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.send("slow", Value::Null, None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(channel.shutdown(), 1);
        assert_eq!(task.await.unwrap(), CommandOutcome::BridgeUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_send_leaves_no_entry() {
        let stub = Arc::new(StubBridge::bare());
        stub.stay_silent("slow");
        let channel = Arc::new(ready_channel(stub, Duration::from_secs(5)).await);

        let task = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.send("slow", Value::Null, None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(channel.pending_count(), 1);
        task.abort();
        let _ = task.await;
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_does_not_register() {
        let stub = Arc::new(StubBridge::new());
        let channel = ready_channel(Arc::clone(&stub), Duration::from_secs(5)).await;
        channel.fire("startLocationListener", json!("")).unwrap();
        assert_eq!(channel.pending_count(), 0);
        assert_eq!(stub.call_count("startLocationListener"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shut_down_channel_refuses_new_commands() {
        let stub = Arc::new(StubBridge::new());
        let channel = ready_channel(Arc::clone(&stub), Duration::from_millis(100)).await;
        assert_eq!(channel.shutdown(), 0);
        assert!(channel.is_closed());

        let outcome = channel.send("getLastLocation", json!(""), None).await;
        assert_eq!(outcome, CommandOutcome::BridgeUnavailable);
        assert!(matches!(
            channel.fire("startLocationListener", json!("")),
            Err(HostlinkError::BridgeUnavailable)
        ));
        assert!(stub.calls().is_empty());
        assert_eq!(channel.pending_count(), 0);
    }

    #[test]
    fn outcome_into_result_names_command() {
        let err = CommandOutcome::TimedOut { timeout_ms: 5000 }
            .into_result("getLastLocation")
            .unwrap_err();
        assert!(err.to_string().contains("getLastLocation"));
        assert!(matches!(
            CommandOutcome::BridgeUnavailable.into_result("x"),
            Err(HostlinkError::BridgeUnavailable)
        ));
    }
}
