//! Integration tests for giro planning
//!
//! The planner is driven end-to-end against in-memory collaborators: line
//! graphs with declared edge lengths, a provider instrumented with fetch and
//! live-graph accounting, and wiremock-served Overpass/Nominatim endpoints
//! for the production collaborators.

use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use giro::{
    plan_circular_route, AttemptOutcome, Coordinate, Error, ExpansionController, Geocoder,
    GraphProvider, NominatimGeocoder, OverpassProvider, PlanOptions, PlanParams, ProviderConfig,
    Result, RoutableGraph, RouteRequest, TrainingLevel, TravelMode, profile_for, MAX_ITERATIONS,
};

fn start_point() -> Coordinate {
    Coordinate::new(45.0, 7.5)
}

/// Geocoder that resolves every address to a fixed point
struct FixedGeocoder(Coordinate);

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn resolve(&self, _address: &str) -> Result<Coordinate> {
        Ok(self.0)
    }
}

/// Decrements the live-graph counter when the graph it is attached to drops
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Provider serving a bidirectional line graph with `node_count` nodes and
/// `edge_length_m` per segment; the loop through node `k` is `2 * k *
/// edge_length_m` long. Instrumented with fetch radii, a configurable number
/// of initial failures, and live-graph accounting.
struct LineProvider {
    node_count: i64,
    edge_length_m: f64,
    fail_first: usize,
    radii: Mutex<Vec<f64>>,
    fetches: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: AtomicUsize,
}

impl LineProvider {
    fn new(node_count: i64, edge_length_m: f64) -> Self {
        Self {
            node_count,
            edge_length_m,
            fail_first: 0,
            radii: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: AtomicUsize::new(0),
        }
    }

    fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    fn recorded_radii(&self) -> Vec<f64> {
        self.radii.lock().unwrap().clone()
    }

    fn build_graph(&self) -> RoutableGraph {
        // Nodes a few centimeters apart so the declared edge lengths dominate
        // straight-line distances
        let nodes: Vec<(i64, f64, f64)> = (0..self.node_count)
            .map(|i| (i, 45.0 + i as f64 * 1e-7, 7.5))
            .collect();
        let edges: Vec<(i64, i64, f64)> = (0..self.node_count - 1)
            .flat_map(|i| {
                [
                    (i, i + 1, self.edge_length_m),
                    (i + 1, i, self.edge_length_m),
                ]
            })
            .collect();
        RoutableGraph::from_parts(&nodes, &edges)
    }
}

#[async_trait]
impl GraphProvider for LineProvider {
    async fn fetch(
        &self,
        _center: Coordinate,
        radius_m: f64,
        _mode: TravelMode,
    ) -> Result<RoutableGraph> {
        self.radii.lock().unwrap().push(radius_m);
        let call = self.fetches.fetch_add(1, Ordering::SeqCst);

        if call < self.fail_first {
            return Err(Error::GraphFetch("simulated outage".to_string()));
        }

        let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now_live, Ordering::SeqCst);

        let mut graph = self.build_graph();
        graph.attach_release_guard(Box::new(LiveGuard(Arc::clone(&self.live))));
        Ok(graph)
    }
}

fn request(desired_distance_m: f64) -> RouteRequest {
    RouteRequest {
        start: start_point(),
        desired_distance_m,
        profile: profile_for(TrainingLevel::Beginner),
        mode: TravelMode::Bike,
    }
}

fn seeded_options(seed: u64) -> PlanOptions {
    PlanOptions {
        seed: Some(seed),
        ..Default::default()
    }
}

fn params_to(output: PathBuf, desired_distance_km: f64) -> PlanParams {
    PlanParams {
        address: "Piazza Castello, Torino".to_string(),
        desired_distance_km,
        level: TrainingLevel::Beginner,
        mode: TravelMode::Bike,
        output_file: output,
    }
}

// Scenario A: the first fetched graph offers a 9 500 m loop for a 10 km
// request; planning succeeds on the first iteration.
#[tokio::test]
async fn test_scenario_a_first_attempt_accepts() {
    let provider = LineProvider::new(3, 2_375.0);
    let req = request(10_000.0);
    let options = seeded_options(7);

    let (route, attempts) = ExpansionController::new(&provider, &req, &options)
        .run()
        .await
        .unwrap();

    assert_eq!(route.total_length_m, 9_500.0);
    assert!(route.total_length_m >= 7_000.0 && route.total_length_m <= 13_000.0);
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Found);
    assert_eq!(attempts[0].radius_m, 3_000.0);
}

// Property 2: every successful route is a closed walk through more than the
// start node.
#[tokio::test]
async fn test_route_is_closed_walk() {
    let provider = LineProvider::new(3, 2_375.0);
    let req = request(10_000.0);
    let options = seeded_options(7);

    let (route, _) = ExpansionController::new(&provider, &req, &options)
        .run()
        .await
        .unwrap();

    assert_eq!(route.nodes.first(), route.nodes.last());
    assert!(route.nodes.iter().any(|&n| n != route.nodes[0]));
    assert_eq!(route.geometry.len(), route.nodes.len());
}

// Property 3: a fixed seed, provider and request give identical routes.
#[tokio::test]
async fn test_deterministic_for_fixed_seed() {
    // Wide line: several candidates land inside the window, so the accepted
    // one depends on sampling order
    let req = request(10_000.0);

    let provider = LineProvider::new(40, 500.0);
    let (first, _) = ExpansionController::new(&provider, &req, &seeded_options(42))
        .run()
        .await
        .unwrap();

    let provider = LineProvider::new(40, 500.0);
    let (second, _) = ExpansionController::new(&provider, &req, &seeded_options(42))
        .run()
        .await
        .unwrap();

    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.total_length_m, second.total_length_m);
}

// Property 1: any accepted route lies within the tolerance window.
#[tokio::test]
async fn test_accepted_route_within_tolerance() {
    let req = request(10_000.0);
    for seed in [1, 2, 3, 99] {
        let provider = LineProvider::new(40, 500.0);
        let (route, _) = ExpansionController::new(&provider, &req, &seeded_options(seed))
            .run()
            .await
            .unwrap();
        assert!(
            route.total_length_m >= 7_000.0 && route.total_length_m <= 13_000.0,
            "seed {seed} gave {}",
            route.total_length_m
        );
    }
}

// Scenario B + property 4: no candidate ever fits, so the radius grows each
// iteration (strictly, until the cap) and planning fails at the bound.
#[tokio::test]
async fn test_scenario_b_exhausts_iterations() {
    // Loops of at most 400 m can never fit a 10 km window
    let provider = LineProvider::new(3, 100.0);
    let req = request(10_000.0);
    let options = seeded_options(7);

    let err = ExpansionController::new(&provider, &req, &options)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::PlanningFailed {
            iterations: MAX_ITERATIONS
        }
    ));
    // Growth schedule for D=10km: initial 3000, then capped at 8000
    assert_eq!(
        provider.recorded_radii(),
        vec![3_000.0, 6_000.0, 8_000.0, 8_000.0, 8_000.0]
    );
}

// Property 4, strict version: with a large enough request the growth branch
// never hits the cap and every fetch radius strictly increases.
#[tokio::test]
async fn test_growth_radii_strictly_increase_below_cap() {
    let provider = LineProvider::new(3, 100.0);
    let req = request(40_000.0);
    let options = seeded_options(7);

    let err = ExpansionController::new(&provider, &req, &options)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PlanningFailed { .. }));

    let radii = provider.recorded_radii();
    assert_eq!(radii, vec![5_000.0, 10_000.0, 15_000.0, 20_000.0, 25_000.0]);
    for pair in radii.windows(2) {
        assert!(pair[1] > pair[0]);
    }
    assert!(radii.iter().all(|&r| r <= 0.8 * 40_000.0));
}

// Property 5: repeated fetch failures shrink the radius along
// `initial * 0.8^iteration` and the controller still halts at the bound.
#[tokio::test]
async fn test_shrink_schedule_on_fetch_failures() {
    let provider = LineProvider::new(3, 2_375.0).failing_first(usize::MAX);
    let req = request(10_000.0);
    let options = seeded_options(7);

    let err = ExpansionController::new(&provider, &req, &options)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PlanningFailed {
            iterations: MAX_ITERATIONS
        }
    ));

    let radii = provider.recorded_radii();
    let expected: Vec<f64> = (0..MAX_ITERATIONS)
        .map(|i| 3_000.0 * 0.8f64.powi(i as i32))
        .collect();
    assert_eq!(radii.len(), expected.len());
    for (got, want) in radii.iter().zip(&expected) {
        assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
    }
}

// Scenario C: first fetch fails, the retry at the shrunk radius succeeds.
#[tokio::test]
async fn test_scenario_c_recovers_after_fetch_failure() {
    let provider = LineProvider::new(3, 2_375.0).failing_first(1);
    let req = request(10_000.0);
    let options = seeded_options(7);

    let (route, attempts) = ExpansionController::new(&provider, &req, &options)
        .run()
        .await
        .unwrap();

    assert_eq!(route.total_length_m, 9_500.0);
    assert_eq!(provider.recorded_radii(), vec![3_000.0, 2_400.0]);
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].outcome, AttemptOutcome::FetchFailed);
    assert_eq!(attempts[1].outcome, AttemptOutcome::Found);
}

// Property 6: the controller never holds two graphs at once, across all five
// expansion iterations.
#[tokio::test]
async fn test_at_most_one_graph_alive() {
    let provider = LineProvider::new(3, 100.0);
    let req = request(10_000.0);
    let options = seeded_options(7);

    let _ = ExpansionController::new(&provider, &req, &options).run().await;

    assert_eq!(provider.fetches.load(Ordering::SeqCst), 5);
    assert_eq!(provider.max_live.load(Ordering::SeqCst), 1);
    assert_eq!(provider.live.load(Ordering::SeqCst), 0);
}

// Cancellation observed before the first fetch stops the run immediately.
#[tokio::test]
async fn test_cancellation_before_first_fetch() {
    let provider = LineProvider::new(3, 2_375.0);
    let req = request(10_000.0);
    let cancellation = CancellationToken::new();
    cancellation.cancel();
    let options = PlanOptions {
        seed: Some(7),
        cancellation,
        ..Default::default()
    };

    let err = ExpansionController::new(&provider, &req, &options)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
}

// Orchestrator success path: geocode, plan, and write a parseable GPX file
// whose single segment closes on itself.
#[tokio::test]
async fn test_plan_writes_gpx_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("loop.gpx");

    let geocoder = FixedGeocoder(start_point());
    let provider = LineProvider::new(3, 2_375.0);
    let params = params_to(output.clone(), 10.0);
    let options = seeded_options(7);

    let summary = plan_circular_route(&geocoder, &provider, &params, &options)
        .await
        .unwrap();
    assert_eq!(summary.route.total_length_m, 9_500.0);
    assert_eq!(summary.profile.max_distance_m, 10_000.0);

    let file = std::fs::File::open(&output).unwrap();
    let parsed = gpx::read(BufReader::new(file)).unwrap();
    assert_eq!(parsed.tracks.len(), 1);
    assert_eq!(parsed.tracks[0].segments.len(), 1);

    let points = &parsed.tracks[0].segments[0].points;
    assert_eq!(points.len(), summary.route.nodes.len());
    assert_eq!(
        points.first().unwrap().point(),
        points.last().unwrap().point()
    );
    assert!(points.iter().all(|p| p.elevation.is_none()));
}

// Scenario B through the orchestrator: a failed plan writes no artifact.
#[tokio::test]
async fn test_failed_plan_writes_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("loop.gpx");

    let geocoder = FixedGeocoder(start_point());
    let provider = LineProvider::new(3, 100.0);
    let params = params_to(output.clone(), 10.0);
    let options = seeded_options(7);

    let err = plan_circular_route(&geocoder, &provider, &params, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PlanningFailed { .. }));
    assert!(!output.exists());
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

// Boundary validation: nonpositive distances are rejected before any
// geocoding or fetching happens.
#[tokio::test]
async fn test_nonpositive_distance_rejected() {
    let geocoder = FixedGeocoder(start_point());
    let provider = LineProvider::new(3, 2_375.0);
    let params = params_to(PathBuf::from("/tmp/unused.gpx"), -3.0);
    let options = seeded_options(7);

    let err = plan_circular_route(&geocoder, &provider, &params, &options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
}

mod production_collaborators {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            overpass_url: format!("{}/api/interpreter", server.uri()),
            nominatim_url: server.uri(),
            user_agent: "giro-tests".to_string(),
        }
    }

    #[tokio::test]
    async fn test_overpass_provider_builds_graph() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "elements": [
                    {"type": "node", "id": 1, "lat": 45.0, "lon": 7.5},
                    {"type": "node", "id": 2, "lat": 45.001, "lon": 7.5},
                    {"type": "node", "id": 3, "lat": 45.002, "lon": 7.5},
                    {"type": "way", "id": 100, "nodes": [1, 2, 3],
                     "tags": {"highway": "residential"}}
                ]
            })))
            .mount(&server)
            .await;

        let provider = OverpassProvider::with_config(config_for(&server));
        let graph = provider
            .fetch(start_point(), 3_000.0, TravelMode::Bike)
            .await
            .unwrap();

        assert_eq!(graph.node_count(), 3);
        // Two segments, both directions
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.nearest_node(start_point()), Some(1));
    }

    #[tokio::test]
    async fn test_overpass_provider_error_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let provider = OverpassProvider::with_config(config_for(&server));
        let err = provider
            .fetch(start_point(), 3_000.0, TravelMode::Bike)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GraphFetch(_)));
    }

    #[tokio::test]
    async fn test_overpass_provider_empty_region_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"elements": []})),
            )
            .mount(&server)
            .await;

        let provider = OverpassProvider::with_config(config_for(&server));
        let err = provider
            .fetch(start_point(), 3_000.0, TravelMode::Bike)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GraphFetch(_)));
    }

    #[tokio::test]
    async fn test_nominatim_geocoder_resolves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "45.07049", "lon": "7.68682", "display_name": "Torino, Italia"}
            ])))
            .mount(&server)
            .await;

        let geocoder = NominatimGeocoder::with_config(config_for(&server));
        let coordinate = geocoder.resolve("Torino").await.unwrap();
        assert!((coordinate.lat - 45.07049).abs() < 1e-9);
        assert!((coordinate.lon - 7.68682).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nominatim_geocoder_unresolved_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let geocoder = NominatimGeocoder::with_config(config_for(&server));
        let err = geocoder.resolve("nowhere at all").await.unwrap_err();
        assert!(matches!(err, Error::Geocode(_)));
    }
}
