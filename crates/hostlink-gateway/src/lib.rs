// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hostlink Gateway — readiness detection, correlated commands, push-event
// subscriptions, payload normalization, and journey tracking over an
// injected host bridge.

pub mod command;
pub mod events;
pub mod gateway;
pub mod journey;
pub mod location;
pub mod normalize;
pub mod readiness;

pub use command::{CommandChannel, CommandOutcome};
pub use events::EventSubscription;
pub use gateway::BridgeGateway;
pub use journey::{JourneyAggregator, JourneySnapshot, haversine_meters};
pub use location::LocationService;
pub use normalize::{EnvelopeShape, normalize, normalize_track};
pub use readiness::ReadinessDetector;
