use geo::{BoundingRect, Coord, InteriorPoint, Intersects, MapCoords, MultiPolygon, Point, Polygon};

use crate::extent::Extent;

/// A parsed territory, region or boundary shape.
///
/// Immutable once built; every derived value is a pure function of it.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Geometry {
    pub fn extent(&self) -> Extent {
        let rect = match self {
            Geometry::Point(p) => Some(p.bounding_rect()),
            Geometry::Polygon(p) => p.bounding_rect(),
            Geometry::MultiPolygon(mp) => mp.bounding_rect(),
        };
        match rect {
            Some(r) => Extent::new(r.min().x, r.min().y, r.max().x, r.max().y),
            None => Extent::EMPTY,
        }
    }

    /// A point inside the geometry, used as its representative location in
    /// containment tests.
    ///
    /// Multi-polygons use their first member, not the largest one.
    pub fn interior_point(&self) -> Option<Point<f64>> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::Polygon(p) => p.interior_point(),
            Geometry::MultiPolygon(mp) => mp.0.first().and_then(|p| p.interior_point()),
        }
    }

    /// Points on the boundary count as inside.
    pub fn intersects_coordinate(&self, c: Coord<f64>) -> bool {
        match self {
            Geometry::Point(p) => p.0 == c,
            Geometry::Polygon(p) => p.intersects(&c),
            Geometry::MultiPolygon(mp) => mp.intersects(&c),
        }
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        match self {
            Geometry::Point(_) => &[],
            Geometry::Polygon(p) => std::slice::from_ref(p),
            Geometry::MultiPolygon(mp) => &mp.0,
        }
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons().len()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::Polygon(p) => p.exterior().0.is_empty(),
            Geometry::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        }
    }

    pub fn map_coords(&self, f: impl Fn(Coord<f64>) -> Coord<f64> + Copy) -> Geometry {
        match self {
            Geometry::Point(p) => Geometry::Point(p.map_coords(f)),
            Geometry::Polygon(p) => Geometry::Polygon(p.map_coords(f)),
            Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.map_coords(f)),
        }
    }
}

/// Concatenate the polygon members of every input into one multi-polygon.
///
/// This is not a topological union: overlapping members stay separate and
/// points contribute nothing.
pub fn union(geometries: &[Geometry]) -> Geometry {
    let polygons = geometries
        .iter()
        .flat_map(|g| g.polygons().iter().cloned())
        .collect::<Vec<_>>();
    Geometry::MultiPolygon(MultiPolygon(polygons))
}
