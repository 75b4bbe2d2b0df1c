//! Application context.
//!
//! A [`Session`] owns the routing lattice, the history and every store for as
//! long as the host keeps it, and lends them to the scheduler per call.

use tracing::info;

use crate::config::SessionConfig;
use crate::error::{GraphError, StoreError};
use crate::history::HistoryManager;
use crate::routing::{RouteEngine, RouteLeg};
use crate::scheduler::{self, DispatchSummary, UndoOutcome};
use crate::store::{BinStore, BinUndo, FacilityStore, JsonStore, VehicleStore};

#[derive(Debug)]
pub struct Session {
    router: RouteEngine,
    history: HistoryManager,
    bins: BinStore,
    facilities: FacilityStore,
    vehicles: VehicleStore,
}

impl Session {
    /// Builds the lattice and loads every store under `config.data_dir`.
    pub fn open(config: &SessionConfig) -> Result<Self, GraphError> {
        let router = RouteEngine::from_config(&config.grid)?;
        let session = Self {
            router,
            history: HistoryManager::open(JsonStore::file(config.history_path())),
            bins: BinStore::open(JsonStore::file(config.bins_path())),
            facilities: FacilityStore::open(&JsonStore::file(config.facilities_path())),
            vehicles: VehicleStore::open(
                JsonStore::file(config.vehicles_seed_path()),
                JsonStore::file(config.vehicles_live_path()),
            ),
        };

        info!(
            data_dir = %config.data_dir.display(),
            nodes = session.router.graph().node_count(),
            bins = session.bins.len(),
            "session opened"
        );
        Ok(session)
    }

    /// Assembles a session from already constructed parts.
    pub fn from_parts(
        router: RouteEngine,
        history: HistoryManager,
        bins: BinStore,
        facilities: FacilityStore,
        vehicles: VehicleStore,
    ) -> Self {
        Self {
            router,
            history,
            bins,
            facilities,
            vehicles,
        }
    }

    pub fn dispatch(&mut self) -> Result<DispatchSummary, StoreError> {
        scheduler::dispatch_all(
            &self.router,
            &mut self.history,
            &mut self.bins,
            &self.facilities,
            &mut self.vehicles,
        )
    }

    pub fn undo_dispatch(&mut self) -> Result<UndoOutcome, StoreError> {
        scheduler::undo_dispatch(&mut self.history, &mut self.bins, &mut self.vehicles)
    }

    /// Sends the fleet back to its seed state. History is left alone.
    pub fn reset_fleet(&mut self) -> Result<(), StoreError> {
        self.vehicles.reset()?;
        info!("fleet reset to seed");
        Ok(())
    }

    pub fn undo_bin(&mut self) -> Result<BinUndo, StoreError> {
        self.bins.undo_last(&mut self.history)
    }

    /// Route between two `(lat, lon)` points.
    pub fn route(&self, from: (f64, f64), to: (f64, f64)) -> RouteLeg {
        self.router.get_route(from.0, from.1, to.0, to.1)
    }

    pub fn router(&self) -> &RouteEngine {
        &self.router
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn bins(&self) -> &BinStore {
        &self.bins
    }

    /// Bins together with the history their edits are recorded in.
    pub fn bins_mut(&mut self) -> (&mut BinStore, &mut HistoryManager) {
        (&mut self.bins, &mut self.history)
    }

    pub fn facilities(&self) -> &FacilityStore {
        &self.facilities
    }

    pub fn vehicles(&self) -> &VehicleStore {
        &self.vehicles
    }
}
