//! Geographic primitives shared across the planner

use geo::HaversineDistance;
use geo::Point;

/// Meters per degree of latitude, good enough for bounding-box sizing
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// A position in degrees, WGS84
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

/// Geographic bounding box, degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// Square bounding box of `radius_m` meters around a center point.
///
/// Longitude extent is widened by the latitude cosine so the box stays
/// roughly square away from the equator. Near the poles the cosine is
/// clamped to keep the box finite.
pub fn bbox_around(center: Coordinate, radius_m: f64) -> BoundingBox {
    let lat_delta = radius_m / METERS_PER_DEGREE_LAT;
    let cos_lat = center.lat.to_radians().cos().max(0.01);
    let lon_delta = radius_m / (METERS_PER_DEGREE_LAT * cos_lat);

    BoundingBox {
        min_lat: center.lat - lat_delta,
        min_lon: center.lon - lon_delta,
        max_lat: center.lat + lat_delta,
        max_lon: center.lon + lon_delta,
    }
}
