//! Out-and-back route search
//!
//! For one turnaround candidate: shortest path out, shortest path back,
//! concatenated into a closed walk and validated against the tolerance
//! window around the requested distance. First candidate to fit wins; the
//! searcher makes no attempt to get closest to the target.

use petgraph::algo::astar;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::core::geo::{haversine_distance, Coordinate};
use crate::core::graph::RoutableGraph;

/// Accepted routes must lie within ±30% of the requested distance
pub const TOLERANCE_FRACTION: f64 = 0.3;

/// A closed walk through the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Visited node ids; first equals last
    pub nodes: Vec<i64>,
    /// Exact sum of traversed edge weights, meters
    pub total_length_m: f64,
    /// Node positions, captured while the graph is still alive
    pub geometry: Vec<Coordinate>,
}

impl Route {
    pub fn is_closed(&self) -> bool {
        self.nodes.len() >= 2 && self.nodes.first() == self.nodes.last()
    }
}

/// Result of evaluating a single turnaround candidate
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Accepted(Route),
    /// Both paths exist but the loop length misses the window
    OutOfTolerance { length_m: f64 },
    /// No path to the candidate or back from it
    NoPath,
}

/// Lower and upper bound of the acceptance window for a requested distance
pub fn tolerance_window(desired_distance_m: f64) -> (f64, f64) {
    (
        (1.0 - TOLERANCE_FRACTION) * desired_distance_m,
        (1.0 + TOLERANCE_FRACTION) * desired_distance_m,
    )
}

/// Shortest-path search over one graph snapshot
pub struct RouteSearcher<'g> {
    graph: &'g RoutableGraph,
    desired_distance_m: f64,
}

impl<'g> RouteSearcher<'g> {
    pub fn new(graph: &'g RoutableGraph, desired_distance_m: f64) -> Self {
        Self {
            graph,
            desired_distance_m,
        }
    }

    /// Evaluate one candidate: out-and-back closed walk through it.
    ///
    /// The duplicated junction node at the turnaround is dropped when the
    /// two paths are joined, so the candidate appears exactly once.
    pub fn evaluate(&self, start_node: i64, candidate: i64) -> CandidateOutcome {
        let Some((out_length, out_path)) = self.shortest_path(start_node, candidate) else {
            return CandidateOutcome::NoPath;
        };
        let Some((back_length, back_path)) = self.shortest_path(candidate, start_node) else {
            return CandidateOutcome::NoPath;
        };

        let total_length_m = out_length + back_length;
        let (low, high) = tolerance_window(self.desired_distance_m);
        if total_length_m < low || total_length_m > high {
            return CandidateOutcome::OutOfTolerance {
                length_m: total_length_m,
            };
        }

        let mut nodes: Vec<i64> = Vec::with_capacity(out_path.len() + back_path.len() - 1);
        nodes.extend(out_path.iter().filter_map(|&idx| self.node_id(idx)));
        nodes.extend(back_path.iter().skip(1).filter_map(|&idx| self.node_id(idx)));

        let geometry: Vec<Coordinate> = nodes
            .iter()
            .filter_map(|&id| self.graph.coordinate(id))
            .collect();

        CandidateOutcome::Accepted(Route {
            nodes,
            total_length_m,
            geometry,
        })
    }

    fn node_id(&self, idx: NodeIndex) -> Option<i64> {
        self.graph.graph.node_weight(idx).copied()
    }

    /// A* by edge-length weight with the straight-line distance heuristic.
    /// Edge lengths are never shorter than the straight line between their
    /// endpoints, so the heuristic stays admissible.
    fn shortest_path(&self, from: i64, to: i64) -> Option<(f64, Vec<NodeIndex>)> {
        let &from_idx = self.graph.node_map.get(&from)?;
        let &to_idx = self.graph.node_map.get(&to)?;
        let goal = *self.graph.coords.get(&to)?;

        let heuristic = |idx: NodeIndex| -> f64 {
            if let Some(&osm_id) = self.graph.graph.node_weight(idx) {
                if let Some(&coord) = self.graph.coords.get(&osm_id) {
                    return haversine_distance(coord.0, coord.1, goal.0, goal.1);
                }
            }
            0.0
        };

        astar(
            &self.graph.graph,
            from_idx,
            |idx| idx == to_idx,
            |e| *e.weight(),
            heuristic,
        )
    }
}
