//! Greedy vehicle → bin → facility dispatch.
//!
//! One pass walks the fleet in order. Each vehicle claims the nearest bin that
//! still has waste in it, drives it to the nearest facility accepting that
//! bin's type and returns to where it started. The whole fleet and bin state
//! is snapshotted into the `dispatch` history first so the pass can be undone.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::haversine::squared_distance;
use crate::history::{DispatchAction, DispatchSnapshot, HistoryCategory, HistoryManager};
use crate::model::{Bin, BinId, Facility, FacilityId, VehicleId};
use crate::polyline::Polyline;
use crate::routing::RouteLeg;
use crate::traits::{BinRepository, FacilityCatalog, RouteProvider, VehicleRepository};

/// One vehicle's work for a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub vehicle_id: VehicleId,
    pub bin_id: BinId,
    pub facility_id: Option<FacilityId>,
    pub dist_to_bin: f64,
    pub dist_to_facility: f64,
    pub dist_return: f64,
}

impl Assignment {
    /// Meters added to the vehicle's running total.
    pub fn distance(&self) -> f64 {
        self.dist_to_bin + self.dist_to_facility + self.dist_return
    }
}

/// Outcome of [`dispatch_all`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub assignments: Vec<Assignment>,
    /// Vehicles left without a bin, in fleet order.
    pub idle: Vec<VehicleId>,
}

impl DispatchSummary {
    pub fn claimed_bins(&self) -> Vec<BinId> {
        self.assignments.iter().map(|a| a.bin_id).collect()
    }

    pub fn total_distance(&self) -> f64 {
        self.assignments.iter().map(Assignment::distance).sum()
    }
}

/// Outcome of [`undo_dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UndoOutcome {
    Restored { vehicles: usize, bins: usize },
    NothingToUndo,
}

/// Runs one dispatch pass over the whole fleet.
///
/// Bins are reloaded from their store first. Every claimed bin is emptied and
/// persisted as soon as it is claimed; the fleet is persisted once at the end.
pub fn dispatch_all<P, B, F, V>(
    router: &P,
    history: &mut HistoryManager,
    bins: &mut B,
    facilities: &F,
    vehicles: &mut V,
) -> Result<DispatchSummary, StoreError>
where
    P: RouteProvider,
    B: BinRepository,
    F: FacilityCatalog,
    V: VehicleRepository,
{
    bins.reload();

    history.push(DispatchAction::DispatchAll(DispatchSnapshot {
        vehicles: vehicles.vehicles().to_vec(),
        bins: bins.bins().to_vec(),
    }))?;

    let mut candidates: Vec<Bin> = bins
        .bins()
        .iter()
        .filter(|b| b.fill_level > 0.0)
        .cloned()
        .collect();
    let mut summary = DispatchSummary::default();

    for vehicle in vehicles.vehicles_mut() {
        // Positions are never moved during a pass.
        let origin = vehicle.position();

        let Some(pos) = closest(&candidates, origin, Bin::position) else {
            vehicle.clear_assignment();
            summary.idle.push(vehicle.id);
            continue;
        };
        let bin = candidates.remove(pos);

        let matching: Vec<&Facility> = facilities.accepting(&bin.bin_type).collect();
        let facility = closest(&matching, bin.position(), |f| f.position()).map(|i| matching[i]);

        let to_bin = route_leg(router, origin, bin.position());
        let mut route = to_bin.path;
        let (dist_to_facility, dist_return) = match facility {
            Some(facility) => {
                let to_facility = route_leg(router, bin.position(), facility.position());
                let back = route_leg(router, facility.position(), origin);
                route.extend(to_facility.path);
                route.extend(back.path);
                (to_facility.distance_m, back.distance_m)
            }
            None => (0.0, 0.0),
        };

        let assignment = Assignment {
            vehicle_id: vehicle.id,
            bin_id: bin.id,
            facility_id: facility.map(|f| f.id),
            dist_to_bin: to_bin.distance_m,
            dist_to_facility,
            dist_return,
        };

        vehicle.target_bin = Some(bin.id);
        vehicle.target_facility = assignment.facility_id;
        vehicle.current_route = route;
        vehicle.dist_to_bin = assignment.dist_to_bin;
        vehicle.dist_to_facility = assignment.dist_to_facility;
        vehicle.dist_return = assignment.dist_return;
        vehicle.total_distance += assignment.distance();

        bins.set_fill_level(bin.id, 0.0)?;

        debug!(
            vehicle = %vehicle.id,
            bin = %bin.id,
            facility = ?assignment.facility_id,
            meters = assignment.distance(),
            "vehicle dispatched"
        );
        summary.assignments.push(assignment);
    }

    vehicles.save()?;

    info!(
        assigned = summary.assignments.len(),
        idle = summary.idle.len(),
        meters = summary.total_distance(),
        "dispatch pass complete"
    );

    Ok(summary)
}

/// Restores fleet and bins to the state before the most recent pass.
///
/// The snapshot is only popped once both collections are persisted; on a
/// failed save it stays on the stack and the undo can be retried.
pub fn undo_dispatch<B, V>(
    history: &mut HistoryManager,
    bins: &mut B,
    vehicles: &mut V,
) -> Result<UndoOutcome, StoreError>
where
    B: BinRepository,
    V: VehicleRepository,
{
    let Some((action, recorded_at)) = history.peek_action::<DispatchAction>() else {
        info!("nothing to undo");
        return Ok(UndoOutcome::NothingToUndo);
    };

    let DispatchAction::DispatchAll(snapshot) = action;
    let outcome = UndoOutcome::Restored {
        vehicles: snapshot.vehicles.len(),
        bins: snapshot.bins.len(),
    };

    let current = vehicles.vehicles().to_vec();
    vehicles.replace_all(snapshot.vehicles);
    if let Err(err) = vehicles.save() {
        vehicles.replace_all(current);
        warn!(error = %err, "undo failed saving vehicles, snapshot kept");
        return Err(err);
    }
    bins.replace_all(snapshot.bins)?;

    history.pop(HistoryCategory::Dispatch)?;
    info!(%recorded_at, "dispatch undone");
    Ok(outcome)
}

/// Routes a leg; a missing route becomes a zero-length straight segment.
fn route_leg<P: RouteProvider>(router: &P, from: (f64, f64), to: (f64, f64)) -> RouteLeg {
    let leg = router.route(from, to);
    if leg.is_empty() {
        debug!(?from, ?to, "no lattice route, using straight segment");
        return RouteLeg {
            path: Polyline::straight(from, to),
            distance_m: 0.0,
        };
    }
    leg
}

/// Index of the item nearest to `target` by squared coordinate distance.
/// Earlier items win ties.
fn closest<T>(items: &[T], target: (f64, f64), position: impl Fn(&T) -> (f64, f64)) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, item) in items.iter().enumerate() {
        let dist = squared_distance(position(item), target);
        if best.is_none_or(|(_, best_dist)| dist < best_dist) {
            best = Some((idx, dist));
        }
    }
    best.map(|(idx, _)| idx)
}
