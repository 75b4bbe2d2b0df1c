//! Error types.

use std::fmt;
use std::io;

/// Failure to write durable state.
///
/// Reads never produce this: a store that cannot be read is treated as empty.
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Serialize(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "storage I/O error: {}", err),
            StoreError::Serialize(err) => write!(f, "storage serialization error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Serialize(err) => Some(err),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialize(err)
    }
}

/// Invalid lattice parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Step must be a positive, finite number of kilometers.
    InvalidStep(f64),
    /// Bounds must be finite with `min <= max` on both axes.
    InvalidBounds {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    },
    /// The lattice would hold more nodes than allowed.
    TooManyNodes { estimated: usize, limit: usize },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidStep(step) => write!(f, "invalid grid step: {} km", step),
            GraphError::InvalidBounds {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            } => write!(
                f,
                "invalid bounding box: lat [{}, {}], lon [{}, {}]",
                min_lat, max_lat, min_lon, max_lon
            ),
            GraphError::TooManyNodes { estimated, limit } => write!(
                f,
                "grid too dense: about {} nodes, limit is {}",
                estimated, limit
            ),
        }
    }
}

impl std::error::Error for GraphError {}
