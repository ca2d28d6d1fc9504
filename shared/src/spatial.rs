use geo::Coord;

use crate::config::PICK_GRID_SIZE;
use crate::extent::Extent;
use crate::geometry::Geometry;

/// A flat 2D grid over the territories' extents for fast click hit-testing.
/// Rebuilt whenever the list map's territories change.
#[derive(Debug, Clone, Default)]
pub struct SpatialGrid {
    cells: Vec<Vec<usize>>,
    ids: Vec<String>,
    geometries: Vec<Geometry>,
    extents: Vec<Extent>,
    bounds: Extent,
    cell_w: f64,
    cell_h: f64,
}

impl SpatialGrid {
    pub fn build<I>(territories: I) -> Self
    where
        I: IntoIterator<Item = (String, Geometry)>,
    {
        let (ids, geometries): (Vec<_>, Vec<_>) = territories
            .into_iter()
            .filter(|(_, g)| !g.extent().is_empty())
            .unzip();
        if ids.is_empty() {
            return Self::default();
        }
        let extents = geometries.iter().map(Geometry::extent).collect::<Vec<_>>();

        let mut bounds = Extent::EMPTY;
        for e in &extents {
            bounds.extend(e);
        }
        // Pad so points on the outer edge still land in a cell.
        let bounds = bounds.buffer(1.0);
        let cell_w = bounds.width() / PICK_GRID_SIZE as f64;
        let cell_h = bounds.height() / PICK_GRID_SIZE as f64;

        let span = |lo: f64, hi: f64, origin: f64, cell: f64| {
            let start = ((lo - origin) / cell).floor().max(0.0) as usize;
            let end = (((hi - origin) / cell).floor() as usize + 1).min(PICK_GRID_SIZE);
            start..end
        };
        let mut cells = vec![Vec::new(); PICK_GRID_SIZE * PICK_GRID_SIZE];
        for (idx, e) in extents.iter().enumerate() {
            for row in span(e.min_y, e.max_y, bounds.min_y, cell_h) {
                for col in span(e.min_x, e.max_x, bounds.min_x, cell_w) {
                    cells[row * PICK_GRID_SIZE + col].push(idx);
                }
            }
        }

        Self {
            cells,
            ids,
            geometries,
            extents,
            bounds,
            cell_w,
            cell_h,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Extent of all territories, padded; empty when there are none.
    pub fn bounds(&self) -> Extent {
        self.bounds
    }

    /// Ids of every territory whose shape contains `c`.
    pub fn find_all(&self, c: Coord<f64>) -> Vec<&str> {
        if self.cells.is_empty() || !self.bounds.contains_coord(c) {
            return Vec::new();
        }
        let col = (((c.x - self.bounds.min_x) / self.cell_w) as usize).min(PICK_GRID_SIZE - 1);
        let row = (((c.y - self.bounds.min_y) / self.cell_h) as usize).min(PICK_GRID_SIZE - 1);
        self.cells[row * PICK_GRID_SIZE + col]
            .iter()
            .filter(|&&idx| {
                self.extents[idx].contains_coord(c) && self.geometries[idx].intersects_coordinate(c)
            })
            .map(|&idx| self.ids[idx].as_str())
            .collect()
    }

    /// The territory at `c`, only when exactly one is hit. Overlapping
    /// territories are ambiguous and the user has to zoom in.
    pub fn pick_unique(&self, c: Coord<f64>) -> Option<&str> {
        match self.find_all(c).as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }
}
