//! Fitting a view to a target extent under padding and resolution limits.

use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{
    DEFAULT_MAX_RESOLUTION, DEFAULT_MIN_RESOLUTION, DEFAULT_ZOOM_FACTOR, MIN_SCREEN_PIXEL_RATIO,
    PRINTOUT_PIXEL_RATIO, PRINTOUT_ZOOM_FACTOR,
};
use crate::extent::Extent;
use crate::view::{ViewConstraints, ViewState};

/// Screen padding in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    pub const fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitMode {
    Interactive,
    /// Fixed pixel ratio and fine zoom steps for printed cards.
    Printout,
    /// Unconstrained resolution, no interaction.
    Minimap,
}

impl FitMode {
    pub fn constraints(self) -> ViewConstraints {
        match self {
            FitMode::Interactive => ViewConstraints::default(),
            FitMode::Printout => ViewConstraints {
                zoom_factor: PRINTOUT_ZOOM_FACTOR,
                ..ViewConstraints::default()
            },
            // Zoom level 28 is the deepest a minimap ever goes.
            FitMode::Minimap => ViewConstraints {
                min_resolution: DEFAULT_MAX_RESOLUTION / DEFAULT_ZOOM_FACTOR.powi(28),
                ..ViewConstraints::default()
            },
        }
    }

    /// Backing store pixels per CSS pixel. Printouts use a fixed ratio so a
    /// card renders the same on every screen.
    pub fn pixel_ratio(self, device_pixel_ratio: f64) -> f64 {
        match self {
            FitMode::Printout => PRINTOUT_PIXEL_RATIO,
            FitMode::Interactive | FitMode::Minimap => {
                let dpr = if device_pixel_ratio.is_finite() { device_pixel_ratio } else { 1.0 };
                dpr.max(MIN_SCREEN_PIXEL_RATIO)
            }
        }
    }

    pub fn default_options(self) -> FitOptions {
        match self {
            FitMode::Interactive | FitMode::Printout => FitOptions {
                padding: Padding::uniform(20.0),
                min_resolution: Some(DEFAULT_MIN_RESOLUTION),
                ..FitOptions::default()
            },
            FitMode::Minimap => FitOptions {
                padding: Padding::uniform(1.0),
                constrain_resolution: false,
                ..FitOptions::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub padding: Padding,
    /// Floor for the fitted resolution so small targets keep their context.
    pub min_resolution: Option<f64>,
    pub max_resolution: Option<f64>,
    /// Snap to the zoom grid, rounding towards the resolution that still fits.
    pub constrain_resolution: bool,
    /// Animation length in milliseconds; `None` jumps immediately.
    pub duration: Option<f64>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            padding: Padding::default(),
            min_resolution: None,
            max_resolution: None,
            constrain_resolution: true,
            duration: None,
        }
    }
}

impl FitOptions {
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// The kinds of map the application shows, each with its own fit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapKind {
    Territory,
    Neighborhood,
    Region,
    TerritoryList,
    MiniMap,
}

impl MapKind {
    pub fn fit_mode(self, printout: bool) -> FitMode {
        match self {
            MapKind::Territory if printout => FitMode::Printout,
            MapKind::Territory | MapKind::TerritoryList => FitMode::Interactive,
            MapKind::Neighborhood | MapKind::Region => FitMode::Printout,
            MapKind::MiniMap => FitMode::Minimap,
        }
    }

    pub fn fit_options(self, printout: bool) -> FitOptions {
        let base = self.fit_mode(printout).default_options();
        match self {
            // Small territories still show their surroundings.
            MapKind::Territory => FitOptions {
                padding: Padding::uniform(20.0),
                min_resolution: Some(1.25),
                ..base
            },
            MapKind::Neighborhood | MapKind::Region => FitOptions {
                padding: Padding::uniform(5.0),
                min_resolution: Some(3.0),
                ..base
            },
            MapKind::TerritoryList => FitOptions {
                padding: Padding::uniform(50.0),
                min_resolution: Some(3.0),
                ..base
            },
            MapKind::MiniMap => base,
        }
    }

    /// Whether the user can pan, zoom and use the map controls.
    pub fn is_interactive(self) -> bool {
        !matches!(self, MapKind::MiniMap)
    }
}

fn rotate(c: Coord<f64>, angle: f64) -> Coord<f64> {
    let (sin, cos) = angle.sin_cos();
    Coord {
        x: c.x * cos - c.y * sin,
        y: c.x * sin + c.y * cos,
    }
}

/// Compute the view that shows `extent` inside a `size` viewport.
///
/// Returns `None` for an empty extent or a viewport with no room left
/// inside the padding; callers skip the fit in that case.
pub fn fit_extent(
    size: [f64; 2],
    extent: &Extent,
    rotation: f64,
    opts: &FitOptions,
    constraints: &ViewConstraints,
) -> Option<ViewState> {
    if extent.is_empty() {
        return None;
    }
    let p = &opts.padding;
    let inner_w = size[0] - p.left - p.right;
    let inner_h = size[1] - p.top - p.bottom;
    if !(inner_w > 0.0 && inner_h > 0.0) {
        return None;
    }

    // Fit the bounding box of the extent as seen on a rotated screen.
    let rotated = Extent::bounding(extent.corners().into_iter().map(|c| rotate(c, -rotation)));
    let mut resolution = (rotated.width() / inner_w).max(rotated.height() / inner_h);
    if let Some(min) = opts.min_resolution {
        resolution = resolution.max(min);
    }
    if let Some(max) = opts.max_resolution {
        resolution = resolution.min(max);
    }
    resolution = if opts.constrain_resolution {
        constraints.snap(resolution, 1)
    } else {
        constraints.clamp(resolution)
    };

    let mut center = rotated.center()?;
    center.x += (p.right - p.left) / 2.0 * resolution;
    center.y += (p.top - p.bottom) / 2.0 * resolution;
    let center = rotate(center, rotation);

    Some(ViewState {
        center: [center.x, center.y],
        resolution,
        rotation,
    })
}

/// Fit the first non-empty extent of `extents`; `None` when all are empty.
pub fn fit_with_fallback(
    size: [f64; 2],
    extents: &[Extent],
    rotation: f64,
    opts: &FitOptions,
    constraints: &ViewConstraints,
) -> Option<ViewState> {
    let Some(extent) = extents.iter().find(|e| !e.is_empty()) else {
        debug!("no extent to fit, keeping the current view");
        return None;
    };
    fit_extent(size, extent, rotation, opts, constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::View;
    use proptest::prelude::*;

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < 1e-6 * expected.abs().max(1.0),
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    fn unconstrained() -> FitOptions {
        FitOptions {
            constrain_resolution: false,
            ..FitOptions::default()
        }
    }

    #[test]
    fn fits_without_padding() {
        let extent = Extent::new(0.0, 0.0, 1000.0, 500.0);
        let state = fit_extent(
            [100.0, 100.0],
            &extent,
            0.0,
            &unconstrained(),
            &ViewConstraints::default(),
        )
        .unwrap();
        assert_close(state.resolution, 10.0);
        assert_close(state.center[0], 500.0);
        assert_close(state.center[1], 250.0);
    }

    #[test]
    fn padding_shrinks_the_area_and_shifts_the_center() {
        let extent = Extent::new(0.0, 0.0, 800.0, 800.0);
        let opts = FitOptions {
            padding: Padding {
                top: 0.0,
                right: 0.0,
                bottom: 0.0,
                left: 20.0,
            },
            ..unconstrained()
        };
        let state = fit_extent([100.0, 80.0], &extent, 0.0, &opts, &ViewConstraints::default()).unwrap();
        assert_close(state.resolution, 10.0);
        // The extent sits right of the left padding.
        assert_close(state.center[0], 300.0);
        let view = View {
            state,
            constraints: ViewConstraints::default(),
            size: [100.0, 80.0],
        };
        let left = view.pixel_from_coordinate(Coord { x: 0.0, y: 400.0 });
        assert_close(left[0], 20.0);
    }

    #[test]
    fn minimum_resolution_is_a_floor() {
        let extent = Extent::new(0.0, 0.0, 10.0, 10.0);
        let opts = FitOptions {
            min_resolution: Some(1.25),
            ..unconstrained()
        };
        let state = fit_extent([200.0, 200.0], &extent, 0.0, &opts, &ViewConstraints::default()).unwrap();
        assert_close(state.resolution, 1.25);
        assert_close(state.center[0], 5.0);
    }

    #[test]
    fn single_point_extent_uses_the_floor() {
        let extent = Extent::from_coord(Coord { x: 7.0, y: 8.0 });
        let opts = MapKind::Territory.fit_options(false);
        let state = fit_extent([300.0, 300.0], &extent, 0.0, &opts, &FitMode::Interactive.constraints()).unwrap();
        assert!(state.resolution >= 1.25);
        assert_close(state.center[0], 7.0);
        assert_close(state.center[1], 8.0);
    }

    #[test]
    fn constrained_fit_rounds_to_a_level_that_still_fits() {
        let constraints = ViewConstraints::default();
        let extent = Extent::new(0.0, 0.0, 3000.0, 3000.0);
        let opts = FitOptions::default();
        let state = fit_extent([100.0, 100.0], &extent, 0.0, &opts, &constraints).unwrap();
        assert!(state.resolution >= 30.0);
        assert!(state.resolution < 60.0);
        let zoom = constraints.zoom_for_resolution(state.resolution);
        assert_close(zoom, zoom.round());
    }

    #[test]
    fn rotated_fit_contains_the_extent() {
        let extent = Extent::new(-500.0, -100.0, 500.0, 100.0);
        let size = [200.0, 200.0];
        let rotation = std::f64::consts::FRAC_PI_4;
        let state = fit_extent(size, &extent, rotation, &unconstrained(), &ViewConstraints::default()).unwrap();
        let view = View {
            state,
            constraints: ViewConstraints::default(),
            size,
        };
        for corner in extent.corners() {
            let [x, y] = view.pixel_from_coordinate(corner);
            assert!((-1e-6..=200.0 + 1e-6).contains(&x), "x {x}");
            assert!((-1e-6..=200.0 + 1e-6).contains(&y), "y {y}");
        }
    }

    #[test]
    fn empty_extent_or_size_is_skipped() {
        let opts = FitOptions::default();
        let c = ViewConstraints::default();
        assert_eq!(fit_extent([100.0, 100.0], &Extent::EMPTY, 0.0, &opts, &c), None);
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(fit_extent([0.0, 0.0], &extent, 0.0, &opts, &c), None);
        // Padding eats the whole viewport.
        assert_eq!(
            fit_extent([30.0, 30.0], &extent, 0.0, &MapKind::TerritoryList.fit_options(false), &c),
            None
        );
    }

    #[test]
    fn falls_back_to_the_next_extent() {
        let fallback = Extent::new(0.0, 0.0, 1000.0, 1000.0);
        let opts = MapKind::TerritoryList.fit_options(false);
        let c = FitMode::Interactive.constraints();
        let from_fallback = fit_with_fallback([400.0, 400.0], &[Extent::EMPTY, fallback], 0.0, &opts, &c);
        let direct = fit_extent([400.0, 400.0], &fallback, 0.0, &opts, &c);
        assert!(from_fallback.is_some());
        assert_eq!(from_fallback, direct);
        assert_eq!(
            fit_with_fallback([400.0, 400.0], &[Extent::EMPTY, Extent::EMPTY], 0.0, &opts, &c),
            None
        );
    }

    #[test]
    fn printout_pixel_ratio_ignores_the_screen() {
        assert_eq!(FitMode::Printout.pixel_ratio(3.0), PRINTOUT_PIXEL_RATIO);
        assert_eq!(FitMode::Printout.pixel_ratio(1.0), PRINTOUT_PIXEL_RATIO);
        assert_eq!(MapKind::Territory.fit_mode(true).pixel_ratio(3.0), PRINTOUT_PIXEL_RATIO);
    }

    #[test]
    fn screen_pixel_ratio_follows_the_device_with_a_floor() {
        assert_eq!(FitMode::Interactive.pixel_ratio(3.0), 3.0);
        assert_eq!(FitMode::Interactive.pixel_ratio(1.0), MIN_SCREEN_PIXEL_RATIO);
        assert_eq!(FitMode::Minimap.pixel_ratio(2.5), 2.5);
        assert_eq!(FitMode::Interactive.pixel_ratio(f64::NAN), MIN_SCREEN_PIXEL_RATIO);
    }

    #[test]
    fn map_kind_policies() {
        assert_eq!(MapKind::Region.fit_mode(false), FitMode::Printout);
        assert_eq!(MapKind::Territory.fit_mode(true), FitMode::Printout);
        assert_eq!(MapKind::Territory.fit_mode(false), FitMode::Interactive);
        let minimap = MapKind::MiniMap.fit_options(true);
        assert!(!minimap.constrain_resolution);
        assert_eq!(minimap.padding, Padding::uniform(1.0));
        assert_eq!(minimap.min_resolution, None);
        assert_eq!(FitMode::Printout.constraints().zoom_factor, PRINTOUT_ZOOM_FACTOR);
        assert!(!MapKind::MiniMap.is_interactive());
    }

    proptest! {
        #[test]
        fn refit_is_idempotent(
            min_x in -1.0e6f64..1.0e6,
            min_y in -1.0e6f64..1.0e6,
            w in 0.0f64..5.0e4,
            h in 0.0f64..5.0e4,
            width in 60.0f64..2000.0,
            height in 60.0f64..2000.0,
            kind in prop::sample::select(vec![
                MapKind::Territory,
                MapKind::Neighborhood,
                MapKind::Region,
                MapKind::TerritoryList,
                MapKind::MiniMap,
            ]),
        ) {
            let extent = Extent::new(min_x, min_y, min_x + w, min_y + h);
            let opts = kind.fit_options(false);
            let constraints = kind.fit_mode(false).constraints();
            let size = [width + 100.0, height + 100.0];
            let first = fit_extent(size, &extent, 0.0, &opts, &constraints);
            let second = fit_extent(size, &extent, 0.0, &opts, &constraints);
            prop_assert!(first.is_some());
            prop_assert_eq!(first, second);
        }
    }
}
