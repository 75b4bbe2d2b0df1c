//! Session configuration.

use std::path::PathBuf;

use crate::graph::GridConfig;

pub const BINS_FILE: &str = "bins.json";
pub const FACILITIES_FILE: &str = "facilities.json";
pub const VEHICLES_SEED_FILE: &str = "vehicles.json";
pub const VEHICLES_LIVE_FILE: &str = "actual_vehicles.json";
pub const HISTORY_FILE: &str = "history.json";

/// Where state lives and which lattice to route over.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Directory holding every JSON store.
    pub data_dir: PathBuf,
    pub grid: GridConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            grid: GridConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    pub fn bins_path(&self) -> PathBuf {
        self.data_dir.join(BINS_FILE)
    }

    pub fn facilities_path(&self) -> PathBuf {
        self.data_dir.join(FACILITIES_FILE)
    }

    /// Initial fleet, read-only.
    pub fn vehicles_seed_path(&self) -> PathBuf {
        self.data_dir.join(VEHICLES_SEED_FILE)
    }

    /// Fleet state after dispatching.
    pub fn vehicles_live_path(&self) -> PathBuf {
        self.data_dir.join(VEHICLES_LIVE_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }
}
