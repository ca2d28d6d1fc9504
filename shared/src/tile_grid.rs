//! Web mercator XYZ tile grid: top-left origin, y growing southwards.

use serde::{Deserialize, Serialize};

use crate::extent::Extent;
use crate::proj::HALF_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// Inclusive range of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    pub fn len(&self) -> usize {
        (self.max_x - self.min_x + 1) as usize * (self.max_y - self.min_y + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min_y..=self.max_y).flat_map(move |y| {
            (self.min_x..=self.max_x).map(move |x| TileCoord { z: self.z, x, y })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    /// Tile edge in CSS pixels.
    pub tile_size: u32,
    pub max_zoom: u8,
}

impl TileGrid {
    pub fn new(tile_size: u32, max_zoom: u8) -> Self {
        Self {
            tile_size,
            max_zoom,
        }
    }

    pub fn resolution(&self, z: u8) -> f64 {
        2.0 * HALF_SIZE / (self.tile_size as f64 * 2f64.powi(z as i32))
    }

    /// Nearest zoom level for a view resolution.
    pub fn zoom_for_resolution(&self, resolution: f64) -> u8 {
        if !(resolution > 0.0) {
            return 0;
        }
        let z = (self.resolution(0) / resolution).log2().round();
        z.clamp(0.0, self.max_zoom as f64) as u8
    }

    pub fn tile_extent(&self, tile: TileCoord) -> Extent {
        let span = self.resolution(tile.z) * self.tile_size as f64;
        let min_x = -HALF_SIZE + tile.x as f64 * span;
        let max_y = HALF_SIZE - tile.y as f64 * span;
        Extent::new(min_x, max_y - span, min_x + span, max_y)
    }

    /// Tiles covering `extent` at zoom `z`, clipped to the world; `None` when
    /// the extent is empty or lies outside the world.
    pub fn tile_range(&self, extent: &Extent, z: u8) -> Option<TileRange> {
        if extent.is_empty() {
            return None;
        }
        let world = Extent::new(-HALF_SIZE, -HALF_SIZE, HALF_SIZE, HALF_SIZE);
        if !world.intersects(extent) {
            return None;
        }
        let span = self.resolution(z) * self.tile_size as f64;
        let count = 1u64 << z;
        let last = (count - 1) as f64;
        let index = |v: f64| v.clamp(0.0, last) as u32;
        // A maximum on a tile edge belongs to the tile before it.
        let upper = |lo: f64, hi: f64| (hi.ceil() - 1.0).max(lo);
        let min_x = ((extent.min_x + HALF_SIZE) / span).floor();
        let max_x = upper(min_x, (extent.max_x + HALF_SIZE) / span);
        let min_y = ((HALF_SIZE - extent.max_y) / span).floor();
        let max_y = upper(min_y, (HALF_SIZE - extent.min_y) / span);
        Some(TileRange {
            z,
            min_x: index(min_x),
            max_x: index(max_x),
            min_y: index(min_y),
            max_y: index(max_y),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_zero_is_one_tile() {
        let grid = TileGrid::new(256, 19);
        let world = Extent::new(-HALF_SIZE, -HALF_SIZE, HALF_SIZE, HALF_SIZE);
        let range = grid.tile_range(&world, 0).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(grid.tile_extent(TileCoord { z: 0, x: 0, y: 0 }), world);
    }

    #[test]
    fn smaller_tiles_mean_larger_resolutions() {
        let big = TileGrid::new(256, 19);
        let small = TileGrid::new(128, 19);
        assert!((small.resolution(3) - 2.0 * big.resolution(3)).abs() < 1e-9);
        assert_eq!(small.zoom_for_resolution(small.resolution(5)), 5);
    }

    #[test]
    fn zoom_selection_rounds_and_clamps() {
        let grid = TileGrid::new(256, 19);
        assert_eq!(grid.zoom_for_resolution(grid.resolution(10) * 1.2), 10);
        assert_eq!(grid.zoom_for_resolution(grid.resolution(10) * 0.6), 11);
        assert_eq!(grid.zoom_for_resolution(0.0001), 19);
        assert_eq!(grid.zoom_for_resolution(1e12), 0);
    }

    #[test]
    fn quadrant_covers_the_expected_tiles() {
        let grid = TileGrid::new(256, 19);
        // North-east quarter of the world at z=1 is tile (1, 0).
        let ne = Extent::new(1.0, 1.0, HALF_SIZE, HALF_SIZE);
        let range = grid.tile_range(&ne, 1).unwrap();
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![TileCoord { z: 1, x: 1, y: 0 }]);
        // Straddling the origin touches all four.
        let center = Extent::new(-10.0, -10.0, 10.0, 10.0);
        assert_eq!(grid.tile_range(&center, 1).unwrap().len(), 4);
    }

    #[test]
    fn outside_world_is_none() {
        let grid = TileGrid::new(256, 19);
        let far = Extent::new(3.0 * HALF_SIZE, 0.0, 4.0 * HALF_SIZE, 1.0);
        assert_eq!(grid.tile_range(&far, 3), None);
        assert_eq!(grid.tile_range(&Extent::EMPTY, 3), None);
    }
}
