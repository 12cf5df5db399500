//! GPX track output
//!
//! Serializes an accepted route as one GPX 1.1 track with a single segment.
//! The file is written to a temporary sibling and renamed into place, so a
//! failed or cancelled run never leaves a partial artifact. Elevation is not
//! populated; the routable graph carries no height data.

use std::fs;
use std::path::Path;

use geo::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::core::error::{Error, Result};
use crate::core::search::Route;

/// Build the GPX document for a route
fn to_gpx(route: &Route) -> Gpx {
    let mut segment = TrackSegment::new();
    for coordinate in &route.geometry {
        segment
            .points
            .push(Waypoint::new(Point::new(coordinate.lon, coordinate.lat)));
    }

    let mut track = Track::new();
    track.segments.push(segment);

    Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(format!("giro/{}", env!("CARGO_PKG_VERSION"))),
        tracks: vec![track],
        ..Default::default()
    }
}

/// Serialize `route` to `path` atomically.
pub fn write_gpx(route: &Route, path: &Path) -> Result<()> {
    if route.geometry.is_empty() {
        return Err(Error::Serialization("route has no geometry".to_string()));
    }

    let gpx = to_gpx(route);
    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer).map_err(|e| Error::Serialization(e.to_string()))?;

    let tmp_path = match path.file_name() {
        Some(name) => {
            let mut tmp_name = name.to_os_string();
            tmp_name.push(".part");
            path.with_file_name(tmp_name)
        }
        None => {
            return Err(Error::Serialization(format!(
                "invalid output path: {}",
                path.display()
            )))
        }
    };

    fs::write(&tmp_path, &buffer)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}
