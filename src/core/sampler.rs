//! Turnaround candidate sampling
//!
//! Draws candidate nodes uniformly at random, without replacement, from all
//! graph nodes except the start node. The random source is injected as an
//! explicit seed so search outcomes are reproducible.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::graph::RoutableGraph;

/// Default number of candidates tried per fetched graph
pub const DEFAULT_CANDIDATES: usize = 20;

/// Seedable sampler of turnaround candidates
pub struct CandidateSampler {
    rng: StdRng,
}

impl CandidateSampler {
    /// `seed: None` seeds from OS entropy; a fixed seed gives a fixed
    /// candidate order for identical graphs.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Draw up to `limit` distinct candidates from `graph`, excluding
    /// `start_node`. Returns fewer when the graph is small; an empty vec when
    /// the start node is the only node.
    pub fn draw(&mut self, graph: &RoutableGraph, start_node: i64, limit: usize) -> Vec<i64> {
        let pool: Vec<i64> = graph.node_ids().filter(|&id| id != start_node).collect();
        if pool.is_empty() || limit == 0 {
            return Vec::new();
        }

        let count = limit.min(pool.len());
        rand::seq::index::sample(&mut self.rng, pool.len(), count)
            .iter()
            .map(|i| pool[i])
            .collect()
    }
}
