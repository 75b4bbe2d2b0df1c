//! Test fixtures for greenbin-dispatch.
//!
//! Provides:
//! - a small routing lattice over north Dubai
//! - builders for bins, facilities and vehicles
//! - throwaway data directories

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use greenbin_dispatch::graph::{BoundingBox, GridConfig};
use greenbin_dispatch::model::{Bin, BinId, Facility, FacilityId, Vehicle, VehicleId};
use greenbin_dispatch::routing::RouteEngine;

/// Roughly 11 km x 10 km, 23 x 21 nodes.
pub fn small_grid() -> GridConfig {
    GridConfig::new(BoundingBox::new(25.0, 25.1, 55.0, 55.1), 0.5)
}

pub fn engine() -> RouteEngine {
    RouteEngine::from_config(&small_grid()).expect("valid grid")
}

pub fn bin(id: u32, x: f64, y: f64, fill_level: f64, bin_type: &str) -> Bin {
    Bin::new(BinId(id), format!("Bin {}", id), x, y, fill_level, bin_type)
}

pub fn facility(id: u32, x: f64, y: f64, kind: &str) -> Facility {
    Facility::new(FacilityId(id), format!("Facility {}", id), x, y, kind)
}

pub fn vehicle(id: u32, x: f64, y: f64) -> Vehicle {
    Vehicle::new(VehicleId(id), x, y)
}

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// A fresh directory under the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(label: &str) -> Self {
        let n = NEXT_DIR.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "greenbin-{}-{}-{}",
            label,
            std::process::id(),
            n
        ));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) {
        let raw = serde_json::to_string_pretty(value).expect("serialize fixture");
        std::fs::write(self.join(name), raw).expect("write fixture");
    }

    pub fn write_raw(&self, name: &str, raw: &str) {
        std::fs::write(self.join(name), raw).expect("write fixture");
    }

    pub fn read_json(&self, name: &str) -> serde_json::Value {
        let raw = std::fs::read_to_string(self.join(name)).expect("read store");
        serde_json::from_str(&raw).expect("valid json")
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
