//! # Giro Library
//!
//! A circular route planner for bike and foot training loops on
//! OpenStreetMap data. Given a start address, a desired round-trip distance
//! and a training level, giro searches the street network for a closed
//! out-and-back loop whose length lands within ±30% of the target and writes
//! it as a GPX track.
//!
//! ## Features
//!
//! - **Bounded search**: at most 5 radius adjustments per run, with a
//!   shrink-and-retry policy when the data source fails
//! - **Memory efficient**: never holds more than one graph snapshot; each
//!   snapshot is released before the next, larger one is fetched
//! - **Reproducible**: candidate sampling takes an explicit seed
//! - **Cancellable**: a cancellation token is honored between search steps
//! - **Safe output**: the GPX file is written atomically, only on success
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Plan a 25 km bike loop and write suggested_route.gpx
//!     giro::plan("Piazza Castello, Torino", 25.0, "intermediate", None).await?;
//!
//!     // Plan to a specific file
//!     giro::plan("Alexanderplatz, Berlin", 10.0, "beginner", Some("berlin.gpx")).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Collaborators and Options
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use giro::{PlanOptions, PlanParams, TrainingLevel, TravelMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let params = PlanParams {
//!         address: "Piazza Castello, Torino".to_string(),
//!         desired_distance_km: 25.0,
//!         level: TrainingLevel::Intermediate,
//!         mode: TravelMode::Bike,
//!         output_file: PathBuf::from("torino.gpx"),
//!     };
//!     let options = PlanOptions {
//!         seed: Some(42), // reproducible candidate order
//!         ..Default::default()
//!     };
//!     let summary = giro::plan_with_options(params, options).await?;
//!     println!("Found a {:.2} km loop", summary.route.total_length_m / 1000.0);
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

// Re-export the planning types users need
pub use crate::core::error::{Error, Result};
pub use crate::core::geo::{bbox_around, BoundingBox, Coordinate};
pub use crate::core::geocode::{Geocoder, NominatimGeocoder};
pub use crate::core::graph::{OsmNetwork, OsmWay, ReleaseGuard, RoutableGraph, TravelMode};
pub use crate::core::planner::{
    plan_circular_route, AttemptOutcome, ExpansionController, PlanOptions, PlanParams,
    PlanSummary, RouteRequest, SearchAttempt, INITIAL_RADIUS_CAP_M, MAX_ITERATIONS,
};
pub use crate::core::profile::{
    profile_for, suggest_level, DifficultyProfile, TrainingLevel,
};
pub use crate::core::provider::{GraphProvider, OverpassProvider, ProviderConfig};
pub use crate::core::sampler::{CandidateSampler, DEFAULT_CANDIDATES};
pub use crate::core::search::{
    tolerance_window, CandidateOutcome, Route, RouteSearcher, TOLERANCE_FRACTION,
};
pub use crate::core::track::write_gpx;

// Internal modules
mod core;

/// Output path used when the caller does not provide one
pub const DEFAULT_OUTPUT_FILE: &str = "suggested_route.gpx";

/// Plan a circular route with the production collaborators.
///
/// Resolves `address` through Nominatim, fetches street graphs from the
/// Overpass API, and writes the accepted loop to `output` (or
/// [`DEFAULT_OUTPUT_FILE`]). Unknown level names fall back to intermediate.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// giro::plan("Piazza Castello, Torino", 25.0, "intermediate", None).await?;
/// # Ok(())
/// # }
/// ```
pub async fn plan(
    address: &str,
    desired_distance_km: f64,
    level: &str,
    output: Option<&str>,
) -> Result<()> {
    let params = PlanParams {
        address: address.to_string(),
        desired_distance_km,
        level: TrainingLevel::parse(level),
        mode: TravelMode::Bike,
        output_file: PathBuf::from(output.unwrap_or(DEFAULT_OUTPUT_FILE)),
    };

    plan_with_options(params, PlanOptions::default())
        .await
        .map(|_| ())
}

/// Plan a circular route with explicit options.
///
/// Uses the production Nominatim and Overpass collaborators; for custom
/// collaborators (or mocks) call [`plan_circular_route`] directly.
pub async fn plan_with_options(params: PlanParams, options: PlanOptions) -> Result<PlanSummary> {
    let geocoder = NominatimGeocoder::new();
    let provider = OverpassProvider::new();
    plan_circular_route(&geocoder, &provider, &params, &options).await
}
