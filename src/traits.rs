//! Seams between the dispatch core and its collaborators.
//!
//! The scheduler only talks to bins, facilities, vehicles and routing through
//! these traits; the JSON-backed stores in [`crate::store`] are one
//! implementation, hosts may plug in their own.

use crate::error::StoreError;
use crate::model::{Bin, BinId, Facility, Vehicle};
use crate::routing::RouteLeg;

/// Point-to-point routing between `(lat, lon)` positions.
pub trait RouteProvider {
    /// An empty leg means no route exists.
    fn route(&self, from: (f64, f64), to: (f64, f64)) -> RouteLeg;
}

/// Ordered, writable bin collection.
pub trait BinRepository {
    fn bins(&self) -> &[Bin];

    /// Re-reads the backing store so out-of-band edits become visible.
    fn reload(&mut self);

    /// Sets one bin's fill level (clamped to its capacity) and persists.
    /// Returns `false` when no bin has that id.
    fn set_fill_level(&mut self, id: BinId, level: f64) -> Result<bool, StoreError>;

    /// Replaces the whole collection and persists.
    fn replace_all(&mut self, bins: Vec<Bin>) -> Result<(), StoreError>;
}

/// Ordered, read-only facility collection.
pub trait FacilityCatalog {
    fn facilities(&self) -> &[Facility];

    /// Facilities accepting `bin_type`, in catalog order.
    fn accepting<'a>(&'a self, bin_type: &'a str) -> impl Iterator<Item = &'a Facility> + 'a {
        self.facilities().iter().filter(move |f| f.accepts(bin_type))
    }
}

/// The fleet, in stable order.
pub trait VehicleRepository {
    fn vehicles(&self) -> &[Vehicle];

    fn vehicles_mut(&mut self) -> &mut [Vehicle];

    /// Replaces the whole fleet without persisting.
    fn replace_all(&mut self, vehicles: Vec<Vehicle>);

    /// Persists the current fleet.
    fn save(&self) -> Result<(), StoreError>;
}
