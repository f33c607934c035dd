// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Hostlink — host bridge abstractions.
//!
//! The native side exposes a single call entry point, a per-event handler
//! slot, and a readiness signal. This crate models those as traits so the
//! gateway never reads a process-wide global directly, and ships a stub
//! host for desktop/CI builds where no native shell is present.

pub mod slot;
pub mod stub;
pub mod traits;

pub use slot::BridgeSlot;
pub use stub::{StubBridge, StubResponse};
pub use traits::{AckCallback, BridgeLocator, HostBridge, PushHandler, ResponseCallback};
