//! Bins, facilities, vehicles and service requests.
//!
//! Records refer to each other by id only; resolving an id goes through the
//! owning collection. All positions are `x` = latitude, `y` = longitude.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::polyline::Polyline;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Bin identifier.
    BinId
);
id_type!(
    /// Facility identifier.
    FacilityId
);
id_type!(
    /// Vehicle identifier.
    VehicleId
);
id_type!(
    /// Service request identifier.
    RequestId
);

const DEFAULT_CAPACITY: f64 = 100.0;

fn default_capacity() -> f64 {
    DEFAULT_CAPACITY
}

fn default_bin_type() -> String {
    "household".to_string()
}

fn default_operational_status() -> String {
    "operational".to_string()
}

fn default_true() -> bool {
    true
}

/// A waste bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub id: BinId,
    pub location: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub fill_level: f64,
    #[serde(default = "default_capacity")]
    pub capacity: f64,
    #[serde(default = "default_bin_type")]
    pub bin_type: String,
}

impl Bin {
    pub fn new(
        id: BinId,
        location: impl Into<String>,
        x: f64,
        y: f64,
        fill_level: f64,
        bin_type: impl Into<String>,
    ) -> Self {
        let mut bin = Self {
            id,
            location: location.into(),
            x,
            y,
            fill_level: 0.0,
            capacity: DEFAULT_CAPACITY,
            bin_type: bin_type.into(),
        };
        bin.set_fill_level(fill_level);
        bin
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity.max(0.0);
        self.set_fill_level(self.fill_level);
        self
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Sets the fill level, clamped to `[0, capacity]`.
    pub fn set_fill_level(&mut self, level: f64) {
        self.fill_level = clamp_level(level, self.capacity);
    }

    /// Adds `amount` (may be negative), clamped to `[0, capacity]`.
    pub fn update_fill(&mut self, amount: f64) {
        self.set_fill_level(self.fill_level + amount);
    }

    pub fn is_empty(&self) -> bool {
        self.fill_level <= 0.0
    }
}

fn clamp_level(level: f64, capacity: f64) -> f64 {
    if level.is_nan() {
        return 0.0;
    }
    level.clamp(0.0, capacity.max(0.0))
}

/// A disposal or processing facility. Read-only to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Accepted bin type.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub capacity: f64,
    #[serde(default)]
    pub efficiency: f64,
    #[serde(default = "default_operational_status")]
    pub operational_status: String,
    #[serde(default)]
    pub processing_cost: f64,
}

impl Facility {
    pub fn new(id: FacilityId, name: impl Into<String>, x: f64, y: f64, kind: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: String::new(),
            x,
            y,
            kind: kind.into(),
            capacity: 0.0,
            efficiency: 0.0,
            operational_status: default_operational_status(),
            processing_cost: 0.0,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn accepts(&self, bin_type: &str) -> bool {
        self.kind == bin_type
    }
}

/// A reference stored either as a bare id or as an embedded record with `id`.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdOrRecord<I> {
    Id(I),
    Record { id: I },
}

/// Reads an optional reference written as `null`, an id, or a full record
/// (older vehicle files embed the whole bin or facility).
fn id_or_record<'de, D, I>(deserializer: D) -> Result<Option<I>, D::Error>
where
    D: Deserializer<'de>,
    I: Deserialize<'de>,
{
    let reference = Option::<IdOrRecord<I>>::deserialize(deserializer)?;
    Ok(reference.map(|r| match r {
        IdOrRecord::Id(id) | IdOrRecord::Record { id } => id,
    }))
}

/// A collection vehicle and its current dispatch state.
///
/// Seed files only carry `id`, `x` and `y`; everything else defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_capacity")]
    pub capacity: f64,
    #[serde(default)]
    pub load: f64,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default, deserialize_with = "id_or_record")]
    pub target_bin: Option<BinId>,
    #[serde(default, deserialize_with = "id_or_record")]
    pub target_facility: Option<FacilityId>,
    #[serde(default)]
    pub current_route: Polyline,
    #[serde(default)]
    pub dist_to_bin: f64,
    #[serde(default)]
    pub dist_to_facility: f64,
    #[serde(default)]
    pub dist_return: f64,
    /// Meters driven across all passes since the last reset.
    #[serde(default)]
    pub total_distance: f64,
}

impl Vehicle {
    pub fn new(id: VehicleId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            capacity: DEFAULT_CAPACITY,
            load: 0.0,
            available: true,
            target_bin: None,
            target_facility: None,
            current_route: Polyline::default(),
            dist_to_bin: 0.0,
            dist_to_facility: 0.0,
            dist_return: 0.0,
            total_distance: 0.0,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// No bin, no facility, no route. Distances are left as they were.
    pub fn clear_assignment(&mut self) {
        self.target_bin = None;
        self.target_facility = None;
        self.current_route.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.target_bin.is_none()
    }
}

/// Lifecycle of a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Processed,
    Cancelled,
}

/// A citizen request against a bin, as recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub user: String,
    pub bin_id: BinId,
    pub request_type: String,
    pub status: RequestStatus,
    pub time: NaiveDateTime,
}
