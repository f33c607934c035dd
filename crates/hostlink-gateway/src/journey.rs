// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Journey aggregation: an ordered, append/replace-only track of fixes with
// great-circle distance maintained alongside.

use std::sync::Arc;

use hostlink_core::{Coordinate, LocationFix};
use tracing::debug;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates, in meters.
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c * 1000.0
}

/// Sum of consecutive segment lengths along `fixes`.
pub fn path_distance_meters(fixes: &[LocationFix]) -> f64 {
    fixes
        .windows(2)
        .map(|w| haversine_meters(w[0].coordinate(), w[1].coordinate()))
        .sum()
}

/// Read-only view of the journey at one point in time.
///
/// Cheap to clone; unaffected by later appends or replacements.
#[derive(Debug, Clone)]
pub struct JourneySnapshot {
    fixes: Arc<[LocationFix]>,
    distance_meters: f64,
}

impl Default for JourneySnapshot {
    fn default() -> Self {
        Self {
            fixes: Arc::from(Vec::new()),
            distance_meters: 0.0,
        }
    }
}

impl JourneySnapshot {
    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn as_slice(&self) -> &[LocationFix] {
        &self.fixes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LocationFix> {
        self.fixes.iter()
    }

    pub fn first(&self) -> Option<&LocationFix> {
        self.fixes.first()
    }

    pub fn last(&self) -> Option<&LocationFix> {
        self.fixes.last()
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    /// Plain coordinate pairs, in order, for map collaborators.
    pub fn polyline(&self) -> Vec<Coordinate> {
        self.fixes.iter().map(LocationFix::coordinate).collect()
    }
}

impl<'a> IntoIterator for &'a JourneySnapshot {
    type Item = &'a LocationFix;
    type IntoIter = std::slice::Iter<'a, LocationFix>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owner of the live journey.
#[derive(Debug, Default)]
pub struct JourneyAggregator {
    fixes: Vec<LocationFix>,
    distance_meters: f64,
    snapshot: Option<JourneySnapshot>,
}

impl JourneyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fix in arrival order.
    pub fn append_fix(&mut self, fix: LocationFix) {
        if let Some(last) = self.fixes.last() {
            self.distance_meters += haversine_meters(last.coordinate(), fix.coordinate());
        }
        self.fixes.push(fix);
        self.snapshot = None;
        debug!(
            len = self.fixes.len(),
            distance_m = self.distance_meters,
            "fix appended to journey"
        );
    }

    /// Replace the whole journey at once.
    pub fn replace_journey(&mut self, fixes: impl IntoIterator<Item = LocationFix>) {
        let fixes: Vec<LocationFix> = fixes.into_iter().collect();
        self.distance_meters = path_distance_meters(&fixes);
        self.fixes = fixes;
        self.snapshot = None;
        debug!(
            len = self.fixes.len(),
            distance_m = self.distance_meters,
            "journey replaced"
        );
    }

    /// Snapshot of the journey as it stands. Rebuilt only after a change.
    pub fn current_journey(&mut self) -> JourneySnapshot {
        self.snapshot
            .get_or_insert_with(|| JourneySnapshot {
                fixes: Arc::from(self.fixes.as_slice()),
                distance_meters: self.distance_meters,
            })
            .clone()
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}
