//! Route geometry as an ordered list of coordinates.
//!
//! Points are `(longitude, latitude)`, the reverse of the `(lat, lon)` order
//! used by the graph and the haversine helpers. Serialized as a bare array of
//! `[lon, lat]` pairs.

use serde::{Deserialize, Serialize};

/// Ordered route coordinates, `(lon, lat)` each.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    /// Creates a polyline from `(lon, lat)` points.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Straight two-point segment between two `(lat, lon)` positions.
    pub fn straight(from: (f64, f64), to: (f64, f64)) -> Self {
        Self::new(vec![(from.1, from.0), (to.1, to.0)])
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<(f64, f64)> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        self.points.last().copied()
    }

    pub(crate) fn push_front(&mut self, point: (f64, f64)) {
        self.points.insert(0, point);
    }

    pub(crate) fn push(&mut self, point: (f64, f64)) {
        self.points.push(point);
    }

    /// Appends every point of `other`, keeping duplicates at the seam.
    pub fn extend(&mut self, other: Polyline) {
        self.points.extend(other.points);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}
