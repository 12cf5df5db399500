//! Expansion controller and planning orchestration
//!
//! The controller owns the retry/backoff loop around graph acquisition:
//! fetch a graph for the current radius, sample turnaround candidates,
//! search them in order, and either finish or adjust the radius and try
//! again. Two bounds hold throughout: the iteration counter never exceeds
//! [`MAX_ITERATIONS`], and at most one graph snapshot is alive at any time;
//! each graph is dropped before the next fetch starts.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::core::error::{Error, Result};
use crate::core::geo::Coordinate;
use crate::core::geocode::Geocoder;
use crate::core::graph::{RoutableGraph, TravelMode};
use crate::core::profile::{profile_for, DifficultyProfile, TrainingLevel};
use crate::core::provider::GraphProvider;
use crate::core::sampler::{CandidateSampler, DEFAULT_CANDIDATES};
use crate::core::search::{CandidateOutcome, Route, RouteSearcher};
use crate::core::track;

/// Upper bound on radius adjustments per planning call
pub const MAX_ITERATIONS: u32 = 5;

/// The first fetch never exceeds this radius, whatever the requested distance
pub const INITIAL_RADIUS_CAP_M: f64 = 5_000.0;

/// Fraction of the requested distance used for the initial radius
const INITIAL_RADIUS_FRACTION: f64 = 0.3;

/// Fraction of the requested distance the radius may grow to
const MAX_RADIUS_FRACTION: f64 = 0.8;

/// Per-iteration radius reduction after a failed fetch
const SHRINK_FACTOR: f64 = 0.8;

/// Immutable description of one planning run
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub start: Coordinate,
    pub desired_distance_m: f64,
    pub profile: DifficultyProfile,
    pub mode: TravelMode,
}

impl RouteRequest {
    pub fn validate(&self) -> Result<()> {
        if !self.desired_distance_m.is_finite() || self.desired_distance_m <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "desired distance must be positive, got {} m",
                self.desired_distance_m
            )));
        }
        if self.profile.max_distance_m <= 0.0 || self.profile.max_elevation_gain_m < 0.0 {
            return Err(Error::InvalidInput(
                "difficulty profile limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// How one fetch-and-search iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Found,
    NoCandidateInTolerance,
    FetchFailed,
}

/// Record of one iteration, kept for reporting and tests
#[derive(Debug, Clone)]
pub struct SearchAttempt {
    pub radius_m: f64,
    pub iteration_index: u32,
    pub outcome: AttemptOutcome,
}

/// Tuning knobs for one planning call
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Fixed sampling seed for reproducible searches; `None` uses OS entropy
    pub seed: Option<u64>,

    /// Candidates tried per fetched graph
    pub max_candidates: usize,

    /// Checked before every fetch and every candidate search. The
    /// supervising layer owns timeout enforcement; cancelling here stops
    /// the run without writing any artifact.
    pub cancellation: CancellationToken,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            seed: None,
            max_candidates: DEFAULT_CANDIDATES,
            cancellation: CancellationToken::new(),
        }
    }
}

/// Input for [`plan_circular_route`]
#[derive(Debug, Clone)]
pub struct PlanParams {
    pub address: String,
    pub desired_distance_km: f64,
    pub level: TrainingLevel,
    pub mode: TravelMode,
    pub output_file: PathBuf,
}

/// Successful planning result
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub route: Route,
    pub attempts: Vec<SearchAttempt>,
    pub profile: DifficultyProfile,
}

fn initial_radius(desired_distance_m: f64) -> f64 {
    INITIAL_RADIUS_CAP_M.min(desired_distance_m * INITIAL_RADIUS_FRACTION)
}

/// Radius for fetch retry `iteration` after failed fetches:
/// `initial * 0.8^iteration`
fn shrink_radius(initial: f64, iteration: u32) -> f64 {
    initial * SHRINK_FACTOR.powi(iteration as i32)
}

/// Radius for expansion `iteration` after in-tolerance misses:
/// `initial * (1 + iteration)`, capped at 80% of the requested distance
fn growth_radius(initial: f64, iteration: u32, desired_distance_m: f64) -> f64 {
    (initial * (1.0 + iteration as f64)).min(MAX_RADIUS_FRACTION * desired_distance_m)
}

/// The retry/backoff state machine around graph acquisition
pub struct ExpansionController<'a, P: GraphProvider + ?Sized> {
    provider: &'a P,
    request: &'a RouteRequest,
    options: &'a PlanOptions,
}

impl<'a, P: GraphProvider + ?Sized> ExpansionController<'a, P> {
    pub fn new(provider: &'a P, request: &'a RouteRequest, options: &'a PlanOptions) -> Self {
        Self {
            provider,
            request,
            options,
        }
    }

    /// Drive fetch-sample-search iterations until a route is accepted or the
    /// iteration bound is reached. The caller has validated the request.
    pub async fn run(self) -> Result<(Route, Vec<SearchAttempt>)> {
        let desired = self.request.desired_distance_m;
        let initial = initial_radius(desired);
        let mut radius = initial;
        let mut iteration: u32 = 0;
        let mut attempts: Vec<SearchAttempt> = Vec::new();
        let mut sampler = CandidateSampler::new(self.options.seed);

        loop {
            if self.options.cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // The previous snapshot was dropped before reaching this fetch.
            let graph = match self
                .provider
                .fetch(self.request.start, radius, self.request.mode)
                .await
            {
                Ok(graph) => graph,
                Err(Error::GraphFetch(reason)) => {
                    log::warn!("Graph fetch at radius {radius:.0} m failed: {reason}");
                    attempts.push(SearchAttempt {
                        radius_m: radius,
                        iteration_index: iteration,
                        outcome: AttemptOutcome::FetchFailed,
                    });
                    iteration += 1;
                    if iteration >= MAX_ITERATIONS {
                        return Err(Error::PlanningFailed {
                            iterations: iteration,
                        });
                    }
                    radius = shrink_radius(initial, iteration);
                    continue;
                }
                Err(other) => return Err(other),
            };

            match self.search_snapshot(&graph, &mut sampler, iteration)? {
                Some(route) => {
                    attempts.push(SearchAttempt {
                        radius_m: radius,
                        iteration_index: iteration,
                        outcome: AttemptOutcome::Found,
                    });
                    drop(graph);
                    log::info!(
                        "Accepted a {:.2} km loop after {} iteration(s)",
                        route.total_length_m / 1000.0,
                        iteration + 1
                    );
                    return Ok((route, attempts));
                }
                None => {
                    attempts.push(SearchAttempt {
                        radius_m: radius,
                        iteration_index: iteration,
                        outcome: AttemptOutcome::NoCandidateInTolerance,
                    });
                    // Release before the next, larger fetch; peak memory
                    // stays at one graph.
                    drop(graph);
                    iteration += 1;
                    if iteration >= MAX_ITERATIONS {
                        return Err(Error::PlanningFailed {
                            iterations: iteration,
                        });
                    }
                    radius = growth_radius(initial, iteration, desired);
                }
            }
        }
    }

    /// Search one graph snapshot. `Ok(None)` means no sampled candidate was
    /// accepted.
    fn search_snapshot(
        &self,
        graph: &RoutableGraph,
        sampler: &mut CandidateSampler,
        iteration: u32,
    ) -> Result<Option<Route>> {
        let Some(start_node) = graph.nearest_node(self.request.start) else {
            return Err(Error::GraphFetch(
                "fetched graph contains no nodes".to_string(),
            ));
        };

        let searcher = RouteSearcher::new(graph, self.request.desired_distance_m);
        let candidates = sampler.draw(graph, start_node, self.options.max_candidates);
        log::debug!(
            "Iteration {iteration}: start node {start_node}, {} candidate(s)",
            candidates.len()
        );

        let mut unreachable = 0usize;
        let mut out_of_window = 0usize;
        for candidate in candidates {
            if self.options.cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match searcher.evaluate(start_node, candidate) {
                CandidateOutcome::Accepted(route) => {
                    log::debug!(
                        "Candidate {candidate} accepted: {:.0} m over {} nodes",
                        route.total_length_m,
                        route.nodes.len()
                    );
                    return Ok(Some(route));
                }
                CandidateOutcome::OutOfTolerance { length_m } => {
                    log::trace!("Candidate {candidate} rejected: {length_m:.0} m");
                    out_of_window += 1;
                }
                CandidateOutcome::NoPath => {
                    unreachable += 1;
                }
            }
        }

        log::debug!(
            "Iteration {iteration}: no candidate in tolerance ({out_of_window} outside window, {unreachable} unreachable)"
        );
        Ok(None)
    }
}

/// Plan a circular route and write it as a GPX track.
///
/// The single public entry point: validates the request, geocodes the
/// address, drives the expansion controller, and serializes the accepted
/// route. The output file is written atomically and only on success; every
/// failure is a typed [`Error`].
pub async fn plan_circular_route<G, P>(
    geocoder: &G,
    provider: &P,
    params: &PlanParams,
    options: &PlanOptions,
) -> Result<PlanSummary>
where
    G: Geocoder + ?Sized,
    P: GraphProvider + ?Sized,
{
    if !params.desired_distance_km.is_finite() || params.desired_distance_km <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "desired distance must be positive, got {} km",
            params.desired_distance_km
        )));
    }
    let profile = profile_for(params.level);

    let start = geocoder.resolve(&params.address).await?;
    let request = RouteRequest {
        start,
        desired_distance_m: params.desired_distance_km * 1000.0,
        profile,
        mode: params.mode,
    };
    request.validate()?;

    // The tolerance window is anchored to the requested distance. The
    // profile limit does not rescale the target; it only flags ambition.
    if request.desired_distance_m > profile.max_distance_m {
        log::warn!(
            "Requested {:.1} km exceeds the {} limit of {:.1} km",
            params.desired_distance_km,
            params.level,
            profile.max_distance_m / 1000.0
        );
    }

    let controller = ExpansionController::new(provider, &request, options);
    let (route, attempts) = controller.run().await?;

    track::write_gpx(&route, &params.output_file)?;
    log::info!(
        "Suggested circular route: {:.2} km, saved to {}",
        route.total_length_m / 1000.0,
        params.output_file.display()
    );

    Ok(PlanSummary {
        route,
        attempts,
        profile,
    })
}
