//! Routable graph built from OpenStreetMap data
//!
//! A [`RoutableGraph`] is the in-memory street network one planning attempt
//! searches over: a directed petgraph keyed by OSM node id with edge lengths
//! in meters, a coordinate table, and an R-tree for nearest-node lookups.
//! Exactly one instance is alive per planning call; the expansion controller
//! drops it before fetching the next one.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use rstar::{primitives::GeomWithData, RTree};

use crate::core::geo::{haversine_distance, Coordinate};

/// Travel mode the graph is built for. Determines which ways are routable
/// and whether one-way restrictions apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    Bike,
    Walk,
}

impl TravelMode {
    /// Strict name lookup, case-insensitive
    pub fn from_name(name: &str) -> Option<TravelMode> {
        match name.trim().to_lowercase().as_str() {
            "bike" | "cycling" => Some(TravelMode::Bike),
            "walk" | "foot" => Some(TravelMode::Walk),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Bike => "bike",
            TravelMode::Walk => "walk",
        }
    }

    /// Highway-tag regex for the Overpass query
    pub fn highway_filter(&self) -> &'static str {
        match self {
            TravelMode::Bike => {
                "^(primary|secondary|tertiary|unclassified|residential|living_street|service|cycleway|track)$"
            }
            TravelMode::Walk => {
                "^(secondary|tertiary|unclassified|residential|living_street|service|pedestrian|footway|path|steps|track)$"
            }
        }
    }

    /// One-way restrictions only bind riders; pedestrians ignore them
    pub fn honors_oneway(&self) -> bool {
        matches!(self, TravelMode::Bike)
    }
}

impl std::fmt::Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OSM way relevant for routing
#[derive(Debug, Clone)]
pub struct OsmWay {
    pub nodes: Vec<i64>,
    pub oneway: bool,
}

/// Parsed OSM extract before graph construction
#[derive(Debug, Default)]
pub struct OsmNetwork {
    pub nodes: HashMap<i64, (f64, f64)>,
    pub ways: Vec<OsmWay>,
}

/// Opaque handle dropped together with the graph it is attached to.
/// Instrumented providers use it to observe how many of their graphs are
/// still alive (the planner holds at most one at a time).
pub type ReleaseGuard = Box<dyn Send>;

/// Street network for one planning attempt
pub struct RoutableGraph {
    pub(crate) graph: DiGraph<i64, f64>,
    pub(crate) node_map: HashMap<i64, NodeIndex>,
    pub(crate) coords: HashMap<i64, (f64, f64)>,
    pub(crate) spatial_index: RTree<GeomWithData<[f64; 2], i64>>,
    release_guard: Option<ReleaseGuard>,
}

impl RoutableGraph {
    /// Build a graph from a parsed OSM network.
    ///
    /// Only nodes referenced by at least one way end up in the graph. Nodes
    /// are inserted in ascending id order so candidate sampling is
    /// reproducible for a fixed seed regardless of parse order.
    pub fn from_network(network: &OsmNetwork, mode: TravelMode) -> Self {
        let mut used_nodes: HashMap<i64, (f64, f64)> = HashMap::new();
        for way in &network.ways {
            for node_id in &way.nodes {
                if let Some(&coord) = network.nodes.get(node_id) {
                    used_nodes.insert(*node_id, coord);
                }
            }
        }

        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        let mut sorted_ids: Vec<i64> = used_nodes.keys().copied().collect();
        sorted_ids.sort_unstable();
        for osm_id in &sorted_ids {
            let idx = graph.add_node(*osm_id);
            node_map.insert(*osm_id, idx);
        }

        for way in &network.ways {
            for window in way.nodes.windows(2) {
                let (node_a, node_b) = (window[0], window[1]);

                if let (Some(&idx_a), Some(&idx_b), Some(&coord_a), Some(&coord_b)) = (
                    node_map.get(&node_a),
                    node_map.get(&node_b),
                    used_nodes.get(&node_a),
                    used_nodes.get(&node_b),
                ) {
                    let length = haversine_distance(coord_a.0, coord_a.1, coord_b.0, coord_b.1);
                    graph.add_edge(idx_a, idx_b, length);

                    if !(mode.honors_oneway() && way.oneway) {
                        graph.add_edge(idx_b, idx_a, length);
                    }
                }
            }
        }

        let points: Vec<GeomWithData<[f64; 2], i64>> = used_nodes
            .iter()
            .map(|(id, coord)| GeomWithData::new([coord.1, coord.0], *id)) // [lon, lat]
            .collect();
        let spatial_index = RTree::bulk_load(points);

        RoutableGraph {
            graph,
            node_map,
            coords: used_nodes,
            spatial_index,
            release_guard: None,
        }
    }

    /// Build a graph from explicit nodes and weighted directed edges.
    ///
    /// Intended for alternative providers and tests, where edge lengths are
    /// declared rather than derived from geometry. Nodes are inserted in the
    /// order given.
    pub fn from_parts(nodes: &[(i64, f64, f64)], edges: &[(i64, i64, f64)]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let mut coords = HashMap::new();

        for &(id, lat, lon) in nodes {
            let idx = graph.add_node(id);
            node_map.insert(id, idx);
            coords.insert(id, (lat, lon));
        }

        for &(from, to, length) in edges {
            if let (Some(&idx_a), Some(&idx_b)) = (node_map.get(&from), node_map.get(&to)) {
                graph.add_edge(idx_a, idx_b, length);
            }
        }

        let points: Vec<GeomWithData<[f64; 2], i64>> = coords
            .iter()
            .map(|(id, coord)| GeomWithData::new([coord.1, coord.0], *id))
            .collect();
        let spatial_index = RTree::bulk_load(points);

        RoutableGraph {
            graph,
            node_map,
            coords,
            spatial_index,
            release_guard: None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.graph.node_weights().copied()
    }

    /// Nearest graph node to a position, via the R-tree
    pub fn nearest_node(&self, target: Coordinate) -> Option<i64> {
        self.spatial_index
            .nearest_neighbor(&[target.lon, target.lat])
            .map(|point| point.data)
    }

    pub fn coordinate(&self, node_id: i64) -> Option<Coordinate> {
        self.coords
            .get(&node_id)
            .map(|&(lat, lon)| Coordinate::new(lat, lon))
    }

    /// Attach a handle that is dropped together with this graph
    pub fn attach_release_guard(&mut self, guard: ReleaseGuard) {
        self.release_guard = Some(guard);
    }
}

impl std::fmt::Debug for RoutableGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutableGraph")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("guarded", &self.release_guard.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_network() -> OsmNetwork {
        let mut nodes = HashMap::new();
        nodes.insert(1, (45.0, 7.5));
        nodes.insert(2, (45.001, 7.5));
        nodes.insert(3, (45.002, 7.5));
        // Node 9 exists but no way references it
        nodes.insert(9, (44.0, 7.0));

        OsmNetwork {
            nodes,
            ways: vec![OsmWay {
                nodes: vec![1, 2, 3],
                oneway: true,
            }],
        }
    }

    #[test]
    fn test_from_network_skips_unreferenced_nodes() {
        let graph = RoutableGraph::from_network(&sample_network(), TravelMode::Bike);
        assert_eq!(graph.node_count(), 3);
        assert!(graph.coordinate(9).is_none());
    }

    #[test]
    fn test_oneway_respected_for_bike() {
        let graph = RoutableGraph::from_network(&sample_network(), TravelMode::Bike);
        // 1->2->3 only
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_oneway_ignored_for_walk() {
        let graph = RoutableGraph::from_network(&sample_network(), TravelMode::Walk);
        // Both directions for each segment
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_node_ids_sorted_regardless_of_map_order() {
        let graph = RoutableGraph::from_network(&sample_network(), TravelMode::Bike);
        let ids: Vec<i64> = graph.node_ids().collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_nearest_node() {
        let graph = RoutableGraph::from_network(&sample_network(), TravelMode::Bike);
        assert_eq!(graph.nearest_node(Coordinate::new(45.0001, 7.5)), Some(1));
        assert_eq!(graph.nearest_node(Coordinate::new(45.0021, 7.5)), Some(3));
    }

    #[test]
    fn test_from_parts_directed_edges() {
        let graph = RoutableGraph::from_parts(
            &[(10, 45.0, 7.5), (20, 45.001, 7.5)],
            &[(10, 20, 1_000.0)],
        );
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.coordinate(10), Some(Coordinate::new(45.0, 7.5)));
    }

    #[test]
    fn test_travel_mode_names() {
        assert_eq!(TravelMode::from_name("Bike"), Some(TravelMode::Bike));
        assert_eq!(TravelMode::from_name("foot"), Some(TravelMode::Walk));
        assert_eq!(TravelMode::from_name("car"), None);
    }
}
