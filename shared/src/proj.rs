use std::f64::consts::PI;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// Spherical web mercator radius, matching the tile servers.
pub const EARTH_RADIUS: f64 = 6_378_137.0;
/// Half the width of the projected world; the valid range on both axes.
pub const HALF_SIZE: f64 = PI * EARTH_RADIUS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Geographic longitude/latitude in degrees, as stored by the API.
    #[serde(rename = "EPSG:4326")]
    Epsg4326,
    /// Web mercator meters, used for all on-screen math.
    #[serde(rename = "EPSG:3857")]
    Epsg3857,
}

pub fn from_lon_lat(c: Coord<f64>) -> Coord<f64> {
    let x = EARTH_RADIUS * c.x.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + c.y.to_radians() / 2.0).tan().ln();
    Coord {
        x,
        y: if y.is_nan() {
            // Latitudes beyond the poles.
            HALF_SIZE.copysign(c.y)
        } else {
            y.clamp(-HALF_SIZE, HALF_SIZE)
        },
    }
}

pub fn to_lon_lat(c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (c.x / EARTH_RADIUS).to_degrees(),
        y: (2.0 * (c.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
    }
}

pub fn reproject(geometry: &Geometry, from: Crs, to: Crs) -> Geometry {
    match (from, to) {
        (Crs::Epsg4326, Crs::Epsg3857) => geometry.map_coords(from_lon_lat),
        (Crs::Epsg3857, Crs::Epsg4326) => geometry.map_coords(to_lon_lat),
        _ => geometry.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tolerance,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    #[test]
    fn origin_maps_to_origin() {
        let c = from_lon_lat(Coord { x: 0.0, y: 0.0 });
        assert_close(c.x, 0.0, 1e-9);
        assert_close(c.y, 0.0, 1e-9);
    }

    #[test]
    fn helsinki_round_trip() {
        let lon_lat = Coord { x: 24.94, y: 60.16 };
        let projected = from_lon_lat(lon_lat);
        assert_close(projected.x, 2_776_308.1, 1.0);
        assert_close(projected.y, 8_435_446.6, 1.0);
        let back = to_lon_lat(projected);
        assert_close(back.x, 24.94, 1e-9);
        assert_close(back.y, 60.16, 1e-9);
    }

    #[test]
    fn poles_clamp_to_valid_range() {
        let north = from_lon_lat(Coord { x: 180.0, y: 90.0 });
        let south = from_lon_lat(Coord { x: -180.0, y: -90.0 });
        assert_close(north.x, HALF_SIZE, 1e-6);
        assert_close(north.y, HALF_SIZE, 1e-6);
        assert_close(south.x, -HALF_SIZE, 1e-6);
        assert_close(south.y, -HALF_SIZE, 1e-6);
    }
}
