//! JSON-file backed collections.
//!
//! Reads are forgiving: a missing, empty or malformed file loads as an empty
//! collection and is only logged. Writes replace the whole file (through a
//! temporary file and a rename) and report failures to the caller.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::history::{BinAction, BinLevelChange, HistoryCategory, HistoryManager};
use crate::model::{Bin, BinId, Facility, Vehicle};
use crate::traits::{BinRepository, FacilityCatalog, VehicleRepository};

/// Location of one JSON document, or nowhere for in-memory use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonStore {
    path: Option<PathBuf>,
}

impl JsonStore {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Never reads anything, saves are no-ops.
    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Parsed contents, or `None` when the file is absent, blank or invalid.
    pub fn load<T: DeserializeOwned>(&self) -> Option<T> {
        let path = self.path.as_ref()?;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "store not readable, starting empty");
                return None;
            }
        };
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "store is malformed, starting empty");
                None
            }
        }
    }

    pub fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Ordered bin collection.
#[derive(Debug, Clone)]
pub struct BinStore {
    bins: Vec<Bin>,
    store: JsonStore,
}

/// What [`BinStore::undo_last`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum BinUndo {
    /// An added bin was taken out again.
    Removed(BinId),
    /// A fill level update was reverted.
    Restored { id: BinId, fill_level: f64 },
    /// A removed bin was put back.
    Reinstated(BinId),
    /// The undone action referred to a bin that no longer exists.
    Missing(BinId),
    NothingToUndo,
}

impl BinStore {
    pub fn open(store: JsonStore) -> Self {
        let bins = Self::read(&store);
        Self { bins, store }
    }

    pub fn in_memory(bins: Vec<Bin>) -> Self {
        Self {
            bins: bins.into_iter().map(clamped).collect(),
            store: JsonStore::ephemeral(),
        }
    }

    fn read(store: &JsonStore) -> Vec<Bin> {
        store
            .load::<Vec<Bin>>()
            .unwrap_or_default()
            .into_iter()
            .map(clamped)
            .collect()
    }

    pub fn get(&self, id: BinId) -> Option<&Bin> {
        self.bins.iter().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.store.save(&self.bins)
    }

    fn next_id(&self) -> BinId {
        BinId(self.bins.iter().map(|b| b.id.0).max().unwrap_or(0) + 1)
    }

    /// Creates a bin with the next free id and records `add_bin`.
    pub fn add_bin(
        &mut self,
        history: &mut HistoryManager,
        location: &str,
        x: f64,
        y: f64,
        fill_level: f64,
        bin_type: &str,
    ) -> Result<Bin, StoreError> {
        let bin = Bin::new(self.next_id(), location, x, y, fill_level, bin_type);
        self.bins.push(bin.clone());
        self.save()?;
        history.push(BinAction::AddBin(bin.clone()))?;
        Ok(bin)
    }

    /// Sets a fill level (clamped) and records `update_bin`.
    pub fn update_bin(
        &mut self,
        history: &mut HistoryManager,
        id: BinId,
        fill_level: f64,
    ) -> Result<bool, StoreError> {
        let Some(bin) = self.bins.iter_mut().find(|b| b.id == id) else {
            return Ok(false);
        };
        let old_level = bin.fill_level;
        bin.set_fill_level(fill_level);
        let new_level = bin.fill_level;
        self.save()?;
        history.push(BinAction::UpdateBin(BinLevelChange {
            id,
            old_level,
            new_level,
        }))?;
        Ok(true)
    }

    /// Removes a bin and records `remove_bin` with its full record.
    pub fn remove_bin(
        &mut self,
        history: &mut HistoryManager,
        id: BinId,
    ) -> Result<Option<Bin>, StoreError> {
        let Some(pos) = self.bins.iter().position(|b| b.id == id) else {
            return Ok(None);
        };
        let removed = self.bins.remove(pos);
        self.save()?;
        history.push(BinAction::RemoveBin(removed.clone()))?;
        Ok(Some(removed))
    }

    /// Inverts the most recent `bin` history action.
    ///
    /// The action is popped only after the inverted collection is saved; a
    /// failed save leaves both the bins and the history as they were.
    pub fn undo_last(&mut self, history: &mut HistoryManager) -> Result<BinUndo, StoreError> {
        let Some((action, _)) = history.peek_action::<BinAction>() else {
            return Ok(BinUndo::NothingToUndo);
        };

        let previous = self.bins.clone();
        let outcome = match action {
            BinAction::AddBin(bin) => match self.bins.iter().position(|b| b.id == bin.id) {
                Some(pos) => {
                    self.bins.remove(pos);
                    BinUndo::Removed(bin.id)
                }
                None => BinUndo::Missing(bin.id),
            },
            BinAction::UpdateBin(change) => match self.bins.iter_mut().find(|b| b.id == change.id) {
                Some(bin) => {
                    bin.set_fill_level(change.old_level);
                    BinUndo::Restored {
                        id: change.id,
                        fill_level: bin.fill_level,
                    }
                }
                None => BinUndo::Missing(change.id),
            },
            BinAction::RemoveBin(bin) => {
                let id = bin.id;
                self.bins.push(clamped(bin));
                BinUndo::Reinstated(id)
            }
        };

        if let Err(err) = self.save() {
            self.bins = previous;
            warn!(error = %err, "bin undo failed, history kept");
            return Err(err);
        }
        history.pop(HistoryCategory::Bin)?;
        Ok(outcome)
    }
}

fn clamped(mut bin: Bin) -> Bin {
    bin.set_fill_level(bin.fill_level);
    bin
}

impl BinRepository for BinStore {
    fn bins(&self) -> &[Bin] {
        &self.bins
    }

    fn reload(&mut self) {
        if self.store.path().is_some() {
            self.bins = Self::read(&self.store);
        }
    }

    fn set_fill_level(&mut self, id: BinId, level: f64) -> Result<bool, StoreError> {
        let Some(bin) = self.bins.iter_mut().find(|b| b.id == id) else {
            return Ok(false);
        };
        bin.set_fill_level(level);
        self.save()?;
        Ok(true)
    }

    fn replace_all(&mut self, bins: Vec<Bin>) -> Result<(), StoreError> {
        self.bins = bins.into_iter().map(clamped).collect();
        self.save()
    }
}

/// Facilities, loaded once.
#[derive(Debug, Clone, Default)]
pub struct FacilityStore {
    facilities: Vec<Facility>,
}

impl FacilityStore {
    pub fn open(store: &JsonStore) -> Self {
        Self {
            facilities: store.load().unwrap_or_default(),
        }
    }

    pub fn in_memory(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }
}

impl FacilityCatalog for FacilityStore {
    fn facilities(&self) -> &[Facility] {
        &self.facilities
    }
}

/// The fleet: live state file with a seed file to fall back on.
#[derive(Debug, Clone)]
pub struct VehicleStore {
    vehicles: Vec<Vehicle>,
    seed: JsonStore,
    live: JsonStore,
}

impl VehicleStore {
    /// Loads the live state when it parses, the seed otherwise.
    pub fn open(seed: JsonStore, live: JsonStore) -> Self {
        let vehicles = match live.load::<Vec<Vehicle>>() {
            Some(vehicles) => vehicles,
            None => Self::read_seed(&seed),
        };
        Self {
            vehicles,
            seed,
            live,
        }
    }

    pub fn in_memory(vehicles: Vec<Vehicle>) -> Self {
        Self {
            vehicles,
            seed: JsonStore::ephemeral(),
            live: JsonStore::ephemeral(),
        }
    }

    fn read_seed(seed: &JsonStore) -> Vec<Vehicle> {
        // Only id and position are taken from the seed.
        seed.load::<Vec<Vehicle>>()
            .unwrap_or_default()
            .into_iter()
            .map(|v| Vehicle::new(v.id, v.x, v.y))
            .collect()
    }

    /// Puts every vehicle back to its seed record and saves.
    ///
    /// Without a seed file, vehicles keep their id and position and lose
    /// everything else.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.vehicles = if self.seed.path().is_some() {
            Self::read_seed(&self.seed)
        } else {
            self.vehicles
                .iter()
                .map(|v| Vehicle::new(v.id, v.x, v.y))
                .collect()
        };
        self.save()
    }
}

impl VehicleRepository for VehicleStore {
    fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    fn vehicles_mut(&mut self) -> &mut [Vehicle] {
        &mut self.vehicles
    }

    fn replace_all(&mut self, vehicles: Vec<Vehicle>) {
        self.vehicles = vehicles;
    }

    fn save(&self) -> Result<(), StoreError> {
        self.live.save(&self.vehicles)
    }
}
