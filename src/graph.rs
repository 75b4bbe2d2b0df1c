//! Lattice routing graph over a bounding box.
//!
//! Nodes are laid out row by row (latitude) and column by column (longitude),
//! identified as `"{row}_{col}"`. Each new node links back to the neighbours
//! that already exist (left, bottom and the two bottom diagonals), so the
//! finished graph is 8-connected while each adjacency list keeps the order in
//! which its edges were discovered.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;
use crate::haversine::haversine_m;

/// Kilometers per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.0;

/// Largest lattice [`GridConfig::validate`] accepts.
pub const MAX_GRID_NODES: usize = 4_000_000;

/// Geographic bounds of the lattice, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn mid_lat(&self) -> f64 {
        (self.min_lat + self.max_lat) / 2.0
    }
}

/// Lattice construction parameters. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub bbox: BoundingBox,
    /// Approximate spacing between neighbouring nodes in kilometers.
    pub step_km: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            bbox: BoundingBox::new(25.0, 25.4, 55.0, 55.5),
            step_km: 0.5,
        }
    }
}

impl GridConfig {
    pub fn new(bbox: BoundingBox, step_km: f64) -> Self {
        Self { bbox, step_km }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.step_km.is_finite() || self.step_km <= 0.0 {
            return Err(GraphError::InvalidStep(self.step_km));
        }

        let b = &self.bbox;
        let finite = [b.min_lat, b.max_lat, b.min_lon, b.max_lon]
            .iter()
            .all(|v| v.is_finite());
        let on_globe = b.min_lat >= -90.0 && b.max_lat <= 90.0;
        if !finite || !on_globe || b.min_lat > b.max_lat || b.min_lon > b.max_lon {
            return Err(GraphError::InvalidBounds {
                min_lat: b.min_lat,
                max_lat: b.max_lat,
                min_lon: b.min_lon,
                max_lon: b.max_lon,
            });
        }

        // The step has to move every coordinate it is added to, or the axis
        // never reaches its upper bound.
        let (lat_step, lon_step) = (self.lat_step(), self.lon_step());
        let advances = |min: f64, max: f64, step: f64| {
            step.is_finite() && step > 0.0 && min + step > min && max + step > max
        };
        if !advances(b.min_lat, b.max_lat, lat_step) || !advances(b.min_lon, b.max_lon, lon_step) {
            return Err(GraphError::InvalidStep(self.step_km));
        }

        let rows = axis_len(b.min_lat, b.max_lat, lat_step);
        let cols = axis_len(b.min_lon, b.max_lon, lon_step);
        let nodes = rows * cols;
        if nodes > MAX_GRID_NODES as f64 {
            return Err(GraphError::TooManyNodes {
                estimated: nodes as usize,
                limit: MAX_GRID_NODES,
            });
        }

        Ok(())
    }

    /// Latitude degrees per step.
    pub fn lat_step(&self) -> f64 {
        self.step_km / KM_PER_DEGREE
    }

    /// Longitude degrees per step, widened by the mid-latitude so east-west
    /// spacing stays close to `step_km`.
    pub fn lon_step(&self) -> f64 {
        self.step_km / (KM_PER_DEGREE * self.bbox.mid_lat().to_radians().cos())
    }
}

/// A lattice point. Immutable once the graph is built.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoNode {
    id: String,
    lat: f64,
    lon: f64,
}

impl GeoNode {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// `(lat, lon)` as stored.
    pub fn position(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Undirected weighted graph with nodes kept in creation order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<GeoNode>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its creation index.
    ///
    /// Re-adding an existing id leaves the graph untouched and returns the
    /// existing index.
    pub fn add_node(&mut self, id: impl Into<String>, lat: f64, lon: f64) -> usize {
        let id = id.into();
        if let Some(&existing) = self.index.get(&id) {
            return existing;
        }

        let idx = self.nodes.len();
        self.index.insert(id.clone(), idx);
        self.nodes.push(GeoNode { id, lat, lon });
        self.adjacency.push(Vec::new());
        idx
    }

    /// Stores `weight` in both directions. An existing edge keeps its place in
    /// each adjacency list and only has its weight replaced.
    pub fn add_edge(&mut self, u: usize, v: usize, weight: f64) {
        Self::upsert(&mut self.adjacency[u], v, weight);
        Self::upsert(&mut self.adjacency[v], u, weight);
    }

    fn upsert(list: &mut Vec<(usize, f64)>, target: usize, weight: f64) {
        match list.iter_mut().find(|(n, _)| *n == target) {
            Some(entry) => entry.1 = weight,
            None => list.push((target, weight)),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> &[GeoNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&GeoNode> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Neighbour ids and edge weights, in discovery order. Empty for an
    /// unknown id.
    pub fn neighbors(&self, id: &str) -> Vec<(&str, f64)> {
        match self.index_of(id) {
            Some(idx) => self.adjacency[idx]
                .iter()
                .map(|&(n, w)| (self.nodes[n].id.as_str(), w))
                .collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn node_at(&self, idx: usize) -> &GeoNode {
        &self.nodes[idx]
    }

    pub(crate) fn adjacent(&self, idx: usize) -> &[(usize, f64)] {
        &self.adjacency[idx]
    }
}

/// Builds the lattice for `config`.
pub fn build_grid(config: &GridConfig) -> Result<Graph, GraphError> {
    config.validate()?;

    let lats = axis_values(config.bbox.min_lat, config.bbox.max_lat, config.lat_step());
    let lons = axis_values(config.bbox.min_lon, config.bbox.max_lon, config.lon_step());
    let cols = lons.len();

    let mut graph = Graph::new();
    for (row, &lat) in lats.iter().enumerate() {
        for (col, &lon) in lons.iter().enumerate() {
            let idx = graph.add_node(node_id(row, col), lat, lon);
            // Row-major creation: (row, col) lives at row * cols + col.
            let link = |graph: &mut Graph, r: usize, c: usize| {
                let dist = haversine_m((lat, lon), (lats[r], lons[c]));
                graph.add_edge(idx, r * cols + c, dist);
            };

            if col > 0 {
                link(&mut graph, row, col - 1);
            }
            if row > 0 {
                link(&mut graph, row - 1, col);
            }
            if row > 0 && col > 0 {
                link(&mut graph, row - 1, col - 1);
            }
            if row > 0 && col + 1 < cols {
                link(&mut graph, row - 1, col + 1);
            }
        }
    }

    debug!(
        rows = lats.len(),
        cols,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built routing lattice"
    );

    Ok(graph)
}

/// Lattice node id for a row/column pair.
pub fn node_id(row: usize, col: usize) -> String {
    format!("{}_{}", row, col)
}

/// `min, min + step, min + 2*step, ...` while `<= max`, accumulated by
/// repeated addition.
fn axis_values(min: f64, max: f64, step: f64) -> Vec<f64> {
    let mut values = Vec::new();
    let mut current = min;
    while current <= max {
        values.push(current);
        let next = current + step;
        if next <= current {
            break;
        }
        current = next;
    }
    values
}

/// Approximate number of values [`axis_values`] yields.
fn axis_len(min: f64, max: f64, step: f64) -> f64 {
    ((max - min) / step).floor() + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> Graph {
        // 3 rows x 3 cols: step of 0.5 km over ~1 km in both directions.
        let bbox = BoundingBox::new(25.0, 25.0 + 1.0 / 111.0 + 1e-9, 55.0, 55.0105);
        build_grid(&GridConfig::new(bbox, 0.5)).expect("valid config")
    }

    #[test]
    fn test_dubai_fixture_counts() {
        let graph = build_grid(&GridConfig::default()).unwrap();
        assert_eq!(graph.node_count(), 89 * 101);
        assert_eq!(graph.edge_count(), 35_388);
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build_grid(&GridConfig::default()).unwrap();
        let b = build_grid(&GridConfig::default()).unwrap();
        assert_eq!(a.nodes(), b.nodes());
        for node in a.nodes().iter().step_by(97) {
            assert_eq!(a.neighbors(node.id()), b.neighbors(node.id()));
        }
    }

    #[test]
    fn test_small_grid_shape() {
        let graph = small_grid();
        assert_eq!(graph.node_count(), 9);
        // 6 horizontal + 6 vertical + 8 diagonal
        assert_eq!(graph.edge_count(), 20);
        assert_eq!(graph.nodes()[0].id(), "0_0");
        assert_eq!(graph.nodes()[4].id(), "1_1");
    }

    #[test]
    fn test_adjacency_follows_construction_order() {
        let graph = small_grid();
        let ids: Vec<&str> = graph.neighbors("1_1").into_iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec!["1_0", "0_1", "0_0", "0_2", "1_2", "2_0", "2_1", "2_2"]
        );

        let corner: Vec<&str> = graph.neighbors("0_0").into_iter().map(|(id, _)| id).collect();
        assert_eq!(corner, vec!["0_1", "1_0", "1_1"]);
    }

    #[test]
    fn test_edges_are_symmetric() {
        let graph = small_grid();
        for node in graph.nodes() {
            for (neighbor, weight) in graph.neighbors(node.id()) {
                let back = graph
                    .neighbors(neighbor)
                    .into_iter()
                    .find(|(id, _)| *id == node.id())
                    .map(|(_, w)| w);
                assert_eq!(back, Some(weight));
            }
        }
    }

    #[test]
    fn test_edge_weights_are_haversine() {
        let graph = small_grid();
        let a = graph.node("0_0").unwrap().position();
        let b = graph.node("1_1").unwrap().position();
        let weight = graph
            .neighbors("0_0")
            .into_iter()
            .find(|(id, _)| *id == "1_1")
            .map(|(_, w)| w)
            .unwrap();
        assert_eq!(weight, haversine_m(a, b));
        assert!((weight - 707.0).abs() < 10.0, "diagonal ~707m, got {}", weight);
    }

    #[test]
    fn test_degenerate_box_is_single_node() {
        let bbox = BoundingBox::new(25.0, 25.0, 55.0, 55.0);
        let graph = build_grid(&GridConfig::new(bbox, 0.5)).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_rejects_bad_step() {
        let config = GridConfig::new(BoundingBox::new(25.0, 25.4, 55.0, 55.5), 0.0);
        assert_eq!(build_grid(&config).unwrap_err(), GraphError::InvalidStep(0.0));

        let config = GridConfig::new(BoundingBox::new(25.0, 25.4, 55.0, 55.5), f64::NAN);
        assert!(matches!(build_grid(&config), Err(GraphError::InvalidStep(_))));
    }

    #[test]
    fn test_rejects_inverted_box() {
        let config = GridConfig::new(BoundingBox::new(25.4, 25.0, 55.0, 55.5), 0.5);
        assert!(matches!(
            build_grid(&config),
            Err(GraphError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_step_below_float_resolution() {
        let config = GridConfig::new(BoundingBox::new(25.0, 25.4, 55.0, 55.5), 1e-15);
        assert_eq!(config.bbox.min_lat + config.lat_step(), config.bbox.min_lat);
        assert_eq!(config.validate(), Err(GraphError::InvalidStep(1e-15)));
        assert!(build_grid(&config).is_err());
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let config = GridConfig::new(BoundingBox::new(25.0, 25.4, 55.0, 55.5), 1e-5);
        assert!(matches!(
            config.validate(),
            Err(GraphError::TooManyNodes { limit: MAX_GRID_NODES, .. })
        ));
    }

    #[test]
    fn test_rejects_latitude_off_the_globe() {
        let config = GridConfig::new(BoundingBox::new(89.0, 91.0, 55.0, 55.5), 50.0);
        assert!(matches!(
            config.validate(),
            Err(GraphError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_axis_values_stop_when_step_vanishes() {
        assert_eq!(axis_values(25.0, 25.4, 1e-18), vec![25.0]);
        assert_eq!(axis_values(0.0, 1.0, 0.5), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut graph = Graph::new();
        let a = graph.add_node("a", 1.0, 2.0);
        let again = graph.add_node("a", 9.0, 9.0);
        assert_eq!(a, again);
        assert_eq!(graph.node("a").unwrap().position(), (1.0, 2.0));
    }

    #[test]
    fn test_add_edge_replaces_weight_in_place() {
        let mut graph = Graph::new();
        let a = graph.add_node("a", 0.0, 0.0);
        let b = graph.add_node("b", 0.0, 1.0);
        let c = graph.add_node("c", 1.0, 0.0);
        graph.add_edge(a, b, 5.0);
        graph.add_edge(a, c, 7.0);
        graph.add_edge(b, a, 3.0);
        assert_eq!(graph.neighbors("a"), vec![("b", 3.0), ("c", 7.0)]);
        assert_eq!(graph.edge_count(), 2);
    }
}
