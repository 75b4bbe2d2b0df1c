//! Nearest-node snapping and shortest paths over the lattice.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use tracing::trace;

use crate::error::GraphError;
use crate::graph::{build_grid, GeoNode, Graph, GridConfig};
use crate::haversine::haversine_m;
use crate::polyline::Polyline;
use crate::traits::RouteProvider;

/// A routed path and its length in meters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteLeg {
    pub path: Polyline,
    pub distance_m: f64,
}

impl RouteLeg {
    /// The "no path" result: no coordinates, zero distance.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Closest node to `(lat, lon)` by haversine distance.
///
/// Linear scan in creation order; on a tie the earlier node wins. `None` only
/// when the graph has no nodes.
pub fn nearest_node(graph: &Graph, lat: f64, lon: f64) -> Option<&GeoNode> {
    let mut best: Option<(&GeoNode, f64)> = None;
    for node in graph.nodes() {
        let dist = haversine_m((lat, lon), node.position());
        if best.is_none_or(|(_, best_dist)| dist < best_dist) {
            best = Some((node, dist));
        }
    }
    best.map(|(node, _)| node)
}

/// Dijkstra from `start` to `end`.
///
/// The path is returned as `(lon, lat)` points from start to end. Unknown ids
/// and unreachable targets yield [`RouteLeg::empty`].
pub fn shortest_path(graph: &Graph, start: &str, end: &str) -> RouteLeg {
    let (Some(source), Some(target)) = (graph.index_of(start), graph.index_of(end)) else {
        return RouteLeg::empty();
    };

    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut done = vec![false; n];
    let mut heap = BinaryHeap::new();

    dist[source] = 0.0;
    heap.push(Reverse((OrderedFloat(0.0), source)));

    while let Some(Reverse((OrderedFloat(current_dist), current))) = heap.pop() {
        if done[current] {
            continue;
        }
        done[current] = true;

        if current == target {
            break;
        }

        for &(neighbor, weight) in graph.adjacent(current) {
            let candidate = current_dist + weight;
            if candidate < dist[neighbor] {
                dist[neighbor] = candidate;
                prev[neighbor] = Some(current);
                heap.push(Reverse((OrderedFloat(candidate), neighbor)));
            }
        }
    }

    if !dist[target].is_finite() {
        trace!(start, end, "no path between nodes");
        return RouteLeg::empty();
    }

    let mut points = Vec::new();
    let mut cursor = Some(target);
    while let Some(idx) = cursor {
        let node = graph.node_at(idx);
        points.push((node.lon(), node.lat()));
        cursor = prev[idx];
    }
    points.reverse();

    RouteLeg {
        path: Polyline::new(points),
        distance_m: dist[target],
    }
}

/// Owns the lattice and answers point-to-point route queries over it.
#[derive(Debug, Clone)]
pub struct RouteEngine {
    graph: Graph,
}

impl RouteEngine {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Builds the lattice described by `config`.
    pub fn from_config(config: &GridConfig) -> Result<Self, GraphError> {
        Ok(Self::new(build_grid(config)?))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Route between two arbitrary `(lat, lon)` points.
    ///
    /// Both endpoints are snapped to their nearest nodes; the exact query
    /// points are then added at either end of the lattice path. The distance
    /// covers only the lattice part, not the snap offsets at each end.
    pub fn get_route(&self, start_lat: f64, start_lon: f64, end_lat: f64, end_lon: f64) -> RouteLeg {
        let (Some(start), Some(end)) = (
            nearest_node(&self.graph, start_lat, start_lon),
            nearest_node(&self.graph, end_lat, end_lon),
        ) else {
            return RouteLeg::empty();
        };

        let mut leg = shortest_path(&self.graph, start.id(), end.id());
        if !leg.is_empty() {
            leg.path.push_front((start_lon, start_lat));
            leg.path.push((end_lon, end_lat));
        }
        leg
    }
}

impl RouteProvider for RouteEngine {
    fn route(&self, from: (f64, f64), to: (f64, f64)) -> RouteLeg {
        self.get_route(from.0, from.1, to.0, to.1)
    }
}
