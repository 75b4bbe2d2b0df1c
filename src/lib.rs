//! greenbin-dispatch core
//!
//! Lattice routing, greedy waste-collection dispatch and undoable history.

pub mod config;
pub mod error;
pub mod graph;
pub mod haversine;
pub mod history;
pub mod model;
pub mod polyline;
pub mod routing;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod traits;
