//! Point-in-polygon containment over user-drawn areas.
//!
//! Coordinates are treated as planar (lat, lon) pairs. That is accurate enough
//! at web-mercator map scales; polygons spanning the antimeridian are not
//! supported.

use serde::{Deserialize, Serialize};

/// Ordered, implicitly closed ring of `(lat, lon)` vertices.
///
/// A polygon with fewer than three vertices can be built but contains nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<(f64, f64)>,
}

/// Axis-aligned `(lat, lon)` extent of a polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

impl Polygon {
    pub fn new(vertices: Vec<(f64, f64)>) -> Self {
        Self { vertices }
    }

    /// Parse a JSON array of `[lat, lon]` pairs. Anything else yields `None`.
    pub fn from_json(text: &str) -> Option<Self> {
        let coords: Vec<[f64; 2]> = serde_json::from_str(text).ok()?;
        Some(Self::new(coords.into_iter().map(|[lat, lon]| (lat, lon)).collect()))
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let (&(lat0, lon0), rest) = self.vertices.split_first()?;
        let init = BoundingBox {
            min_lat: lat0,
            max_lat: lat0,
            min_lon: lon0,
            max_lon: lon0,
        };
        Some(rest.iter().fold(init, |b, &(lat, lon)| BoundingBox {
            min_lat: b.min_lat.min(lat),
            max_lat: b.max_lat.max(lat),
            min_lon: b.min_lon.min(lon),
            max_lon: b.max_lon.max(lon),
        }))
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        contains(self, lat, lon)
    }
}

/// Even-odd ray casting.
///
/// For every edge whose longitude span straddles the query longitude, the
/// crossing latitude is interpolated and the state toggles when the query lies
/// below it. The straddle test is half-open, so an edge with equal endpoint
/// longitudes never reaches the division.
///
/// Points exactly on an edge may be classified either way.
pub fn contains(polygon: &Polygon, lat: f64, lon: f64) -> bool {
    let v = &polygon.vertices;
    let n = v.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (lat_i, lon_i) = v[i];
        let (lat_j, lon_j) = v[j];
        if (lon_i > lon) != (lon_j > lon) {
            let crossing = (lat_j - lat_i) * (lon - lon_i) / (lon_j - lon_i) + lat_i;
            if lat < crossing {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
