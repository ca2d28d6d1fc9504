use geo::Coord;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in projected map units.
///
/// The empty extent is inverted (`min > max`), so extending it with any
/// coordinate yields that coordinate's degenerate box. A single point is a
/// valid, non-empty extent of zero size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Extent {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Extent {
    pub const EMPTY: Self = Self {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_coord(c: Coord<f64>) -> Self {
        Self::new(c.x, c.y, c.x, c.y)
    }

    /// Smallest extent containing every coordinate; empty for no input.
    pub fn bounding<I: IntoIterator<Item = Coord<f64>>>(coords: I) -> Self {
        let mut extent = Self::EMPTY;
        for c in coords {
            extent.extend_coord(c);
        }
        extent
    }

    pub fn is_empty(&self) -> bool {
        !(self.min_x <= self.max_x && self.min_y <= self.max_y)
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    pub fn center(&self) -> Option<Coord<f64>> {
        if self.is_empty() {
            return None;
        }
        Some(Coord {
            x: (self.min_x + self.max_x) / 2.0,
            y: (self.min_y + self.max_y) / 2.0,
        })
    }

    pub fn extend_coord(&mut self, c: Coord<f64>) {
        self.min_x = self.min_x.min(c.x);
        self.min_y = self.min_y.min(c.y);
        self.max_x = self.max_x.max(c.x);
        self.max_y = self.max_y.max(c.y);
    }

    pub fn extend(&mut self, other: &Extent) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn union(mut self, other: &Extent) -> Self {
        self.extend(other);
        self
    }

    /// Grow by `value` on every side. Empty stays empty.
    pub fn buffer(&self, value: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::new(
            self.min_x - value,
            self.min_y - value,
            self.max_x + value,
            self.max_y + value,
        )
    }

    pub fn contains_coord(&self, c: Coord<f64>) -> bool {
        self.min_x <= c.x && c.x <= self.max_x && self.min_y <= c.y && c.y <= self.max_y
    }

    pub fn contains_extent(&self, other: &Extent) -> bool {
        !other.is_empty()
            && self.min_x <= other.min_x
            && other.max_x <= self.max_x
            && self.min_y <= other.min_y
            && other.max_y <= self.max_y
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn corners(&self) -> [Coord<f64>; 4] {
        [
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
            Coord {
                x: self.min_x,
                y: self.max_y,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extent_has_no_size() {
        assert!(Extent::EMPTY.is_empty());
        assert_eq!(Extent::EMPTY.width(), 0.0);
        assert_eq!(Extent::EMPTY.center(), None);
        assert!(Extent::bounding(std::iter::empty()).is_empty());
    }

    #[test]
    fn single_point_is_not_empty() {
        let e = Extent::from_coord(Coord { x: 3.0, y: 4.0 });
        assert!(!e.is_empty());
        assert_eq!(e.width(), 0.0);
        assert_eq!(e.center(), Some(Coord { x: 3.0, y: 4.0 }));
    }

    #[test]
    fn extend_ignores_empty_and_grows_otherwise() {
        let mut e = Extent::new(0.0, 0.0, 1.0, 1.0);
        e.extend(&Extent::EMPTY);
        assert_eq!(e, Extent::new(0.0, 0.0, 1.0, 1.0));
        e.extend(&Extent::new(-2.0, 0.5, 0.5, 3.0));
        assert_eq!(e, Extent::new(-2.0, 0.0, 1.0, 3.0));
    }

    #[test]
    fn containment_and_intersection() {
        let outer = Extent::new(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains_extent(&Extent::new(1.0, 1.0, 9.0, 9.0)));
        assert!(!outer.contains_extent(&Extent::new(1.0, 1.0, 11.0, 9.0)));
        assert!(!outer.contains_extent(&Extent::EMPTY));
        assert!(outer.intersects(&Extent::new(10.0, 10.0, 12.0, 12.0)));
        assert!(!outer.intersects(&Extent::new(10.5, 0.0, 12.0, 1.0)));
        assert!(outer.contains_coord(Coord { x: 10.0, y: 0.0 }));
    }

    #[test]
    fn buffer_keeps_empty() {
        assert!(Extent::EMPTY.buffer(5.0).is_empty());
        assert_eq!(
            Extent::new(0.0, 0.0, 1.0, 1.0).buffer(1.0),
            Extent::new(-1.0, -1.0, 2.0, 2.0)
        );
    }
}
