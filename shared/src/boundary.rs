use geo::{Coord, LineString, MultiPolygon, Polygon};
use tracing::warn;

use crate::geometry::{Geometry, union};
use crate::proj::{Crs, reproject};
use crate::wkt::{parse_wkt, to_wkt};

/// Stand-in congregation area when no boundary has been drawn.
pub const WHOLE_WORLD_WKT: &str = "MULTIPOLYGON(((180 90,180 -90,-180 -90,-180 90,180 90)))";

/// The whole-world sentinel in projected coordinates.
pub fn whole_world() -> Geometry {
    let ring = [(180.0, 90.0), (180.0, -90.0), (-180.0, -90.0), (-180.0, 90.0), (180.0, 90.0)]
        .into_iter()
        .map(|(x, y)| Coord { x, y })
        .collect::<Vec<_>>();
    let world = Geometry::MultiPolygon(MultiPolygon(vec![Polygon::new(LineString(ring), vec![])]));
    reproject(&world, Crs::Epsg4326, Crs::Epsg3857)
}

/// Combine a congregation's boundary fragments into its total area.
///
/// No fragments means the whole world, so callers always get a non-empty
/// geometry. Fragments are concatenated, never dissolved.
pub fn merge_boundaries(fragments: &[Geometry]) -> Geometry {
    if fragments.is_empty() {
        return whole_world();
    }
    union(fragments)
}

/// Same as [`merge_boundaries`] over the API's geographic WKT strings.
/// Malformed fragments are skipped.
///
/// Only the absence of parseable fragments yields the sentinel. Fragments
/// that parse but are all `EMPTY` merge to `MULTIPOLYGON EMPTY`.
pub fn merge_boundary_wkts<S: AsRef<str>>(fragments: &[S]) -> String {
    let parsed = fragments
        .iter()
        .filter_map(|wkt| match parse_wkt(wkt.as_ref()) {
            Ok(g) => Some(g),
            Err(e) => {
                warn!(error = %e, "skipping malformed congregation boundary");
                None
            }
        })
        .collect::<Vec<_>>();
    if parsed.is_empty() {
        return WHOLE_WORLD_WKT.to_string();
    }
    to_wkt(&union(&parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::Extent;
    use crate::geometry::tests::rect;
    use crate::proj::HALF_SIZE;
    use crate::wkt::parse_wkt as parse;

    #[test]
    fn no_fragments_covers_the_whole_world() {
        let world = merge_boundaries(&[]);
        let extent = world.extent();
        let full = Extent::new(-HALF_SIZE, -HALF_SIZE, HALF_SIZE, HALF_SIZE);
        for (a, b) in [
            (extent.min_x, full.min_x),
            (extent.min_y, full.min_y),
            (extent.max_x, full.max_x),
            (extent.max_y, full.max_y),
        ] {
            assert!((a - b).abs() < 1e-6, "{extent:?} != {full:?}");
        }
    }

    #[test]
    fn sentinel_matches_its_wkt() {
        let parsed = parse(WHOLE_WORLD_WKT).unwrap();
        assert_eq!(whole_world(), reproject(&parsed, Crs::Epsg4326, Crs::Epsg3857));
    }

    #[test]
    fn member_count_is_the_sum() {
        let f1 = Geometry::MultiPolygon(MultiPolygon(vec![
            rect(0.0, 0.0, 1.0, 1.0),
            rect(4.0, 0.0, 5.0, 1.0),
        ]));
        let f2 = Geometry::MultiPolygon(MultiPolygon(vec![rect(0.5, 0.5, 2.0, 2.0)]));
        let merged = merge_boundaries(&[f1.clone(), f2.clone()]);
        assert_eq!(
            merged.polygon_count(),
            f1.polygon_count() + f2.polygon_count()
        );
    }

    #[test]
    fn disjoint_fragments_extent_encloses_both() {
        let a = Geometry::Polygon(rect(0.0, 0.0, 1.0, 1.0));
        let b = Geometry::Polygon(rect(10.0, 20.0, 12.0, 25.0));
        let merged = merge_boundaries(&[a, b]);
        assert_eq!(merged.extent(), Extent::new(0.0, 0.0, 12.0, 25.0));
    }

    #[test]
    fn merge_is_order_independent_in_extent() {
        let a = Geometry::Polygon(rect(0.0, 0.0, 1.0, 1.0));
        let b = Geometry::Polygon(rect(-3.0, 2.0, 0.0, 4.0));
        assert_eq!(
            merge_boundaries(&[a.clone(), b.clone()]).extent(),
            merge_boundaries(&[b, a]).extent()
        );
    }

    #[test]
    fn wkt_merge_skips_malformed_and_falls_back() {
        assert_eq!(merge_boundary_wkts::<&str>(&[]), WHOLE_WORLD_WKT);
        assert_eq!(merge_boundary_wkts(&["nonsense"]), WHOLE_WORLD_WKT);
        let merged = merge_boundary_wkts(&[
            "MULTIPOLYGON(((0 0,1 0,1 1,0 0)))",
            "broken",
            "POLYGON((5 5,6 5,6 6,5 5))",
        ]);
        assert_eq!(
            merged,
            "MULTIPOLYGON(((0 0,1 0,1 1,0 0)),((5 5,6 5,6 6,5 5)))"
        );
    }

    #[test]
    fn empty_fragments_merge_to_empty_not_the_world() {
        assert_eq!(
            merge_boundary_wkts(&["MULTIPOLYGON EMPTY", "MULTIPOLYGON EMPTY"]),
            "MULTIPOLYGON EMPTY"
        );
    }
}
