use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_MAX_RESOLUTION, DEFAULT_MIN_RESOLUTION, DEFAULT_ZOOM_FACTOR};
use crate::extent::Extent;

/// Camera of one map surface: projected center, map units per CSS pixel,
/// and rotation in radians (counter-clockwise).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub center: [f64; 2],
    pub resolution: f64,
    #[serde(default)]
    pub rotation: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            resolution: DEFAULT_MAX_RESOLUTION / DEFAULT_ZOOM_FACTOR,
            rotation: 0.0,
        }
    }
}

impl ViewState {
    pub fn is_valid(&self) -> bool {
        self.center.iter().all(|v| v.is_finite())
            && self.resolution.is_finite()
            && self.resolution > 0.0
            && self.rotation.is_finite()
    }
}

/// Resolution limits and zoom stepping of a view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewConstraints {
    pub min_resolution: f64,
    pub max_resolution: f64,
    /// Ratio between the resolutions of adjacent zoom levels.
    pub zoom_factor: f64,
}

impl Default for ViewConstraints {
    fn default() -> Self {
        Self {
            min_resolution: DEFAULT_MIN_RESOLUTION,
            max_resolution: DEFAULT_MAX_RESOLUTION,
            zoom_factor: DEFAULT_ZOOM_FACTOR,
        }
    }
}

impl ViewConstraints {
    pub fn clamp(&self, resolution: f64) -> f64 {
        resolution.clamp(self.min_resolution, self.max_resolution)
    }

    /// Fractional zoom level of a resolution (0 at `max_resolution`).
    pub fn zoom_for_resolution(&self, resolution: f64) -> f64 {
        (self.max_resolution / resolution).ln() / self.zoom_factor.ln()
    }

    pub fn resolution_for_zoom(&self, zoom: f64) -> f64 {
        self.max_resolution / self.zoom_factor.powf(zoom)
    }

    /// Snap to a zoom level. `direction > 0` prefers the larger resolution
    /// (zoomed out), `< 0` the smaller one, `0` the nearest.
    pub fn snap(&self, resolution: f64, direction: i32) -> f64 {
        let zoom = self.zoom_for_resolution(resolution);
        // Absorb float noise so exact levels do not jump a whole step.
        let rounded = zoom.round();
        let zoom = if (zoom - rounded).abs() < 1e-9 {
            rounded
        } else if direction > 0 {
            zoom.floor()
        } else if direction < 0 {
            zoom.ceil()
        } else {
            rounded
        };
        self.clamp(self.resolution_for_zoom(zoom.max(0.0)))
    }
}

/// A view bound to a viewport size, with pixel/coordinate transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub state: ViewState,
    pub constraints: ViewConstraints,
    /// Viewport size in CSS pixels.
    pub size: [f64; 2],
}

impl View {
    pub fn new(constraints: ViewConstraints) -> Self {
        Self {
            state: ViewState::default(),
            constraints,
            size: [0.0, 0.0],
        }
    }

    pub fn has_size(&self) -> bool {
        self.size[0] > 0.0 && self.size[1] > 0.0
    }

    pub fn pixel_from_coordinate(&self, c: Coord<f64>) -> [f64; 2] {
        let s = &self.state;
        let dx = (c.x - s.center[0]) / s.resolution;
        let dy = (c.y - s.center[1]) / s.resolution;
        let (sin, cos) = (-s.rotation).sin_cos();
        let rx = dx * cos - dy * sin;
        let ry = dx * sin + dy * cos;
        [self.size[0] / 2.0 + rx, self.size[1] / 2.0 - ry]
    }

    pub fn coordinate_from_pixel(&self, pixel: [f64; 2]) -> Coord<f64> {
        let s = &self.state;
        let rx = pixel[0] - self.size[0] / 2.0;
        let ry = self.size[1] / 2.0 - pixel[1];
        let (sin, cos) = s.rotation.sin_cos();
        let dx = rx * cos - ry * sin;
        let dy = rx * sin + ry * cos;
        Coord {
            x: s.center[0] + dx * s.resolution,
            y: s.center[1] + dy * s.resolution,
        }
    }

    /// The map area currently visible, rotation included.
    pub fn calculate_extent(&self) -> Extent {
        if !self.has_size() {
            return Extent::EMPTY;
        }
        let [w, h] = self.size;
        Extent::bounding(
            [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]
                .into_iter()
                .map(|p| self.coordinate_from_pixel(p)),
        )
    }

    /// Move the map content by a screen-space delta.
    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) {
        let center = self.coordinate_from_pixel([self.size[0] / 2.0 - dx, self.size[1] / 2.0 - dy]);
        self.state.center = [center.x, center.y];
    }

    /// Zoom by `delta` levels keeping the coordinate under `anchor` fixed.
    pub fn zoom_by(&mut self, delta: f64, anchor: [f64; 2]) {
        let before = self.coordinate_from_pixel(anchor);
        let target = self.state.resolution / self.constraints.zoom_factor.powf(delta);
        self.state.resolution = self.constraints.clamp(target);
        let after = self.coordinate_from_pixel(anchor);
        self.state.center[0] += before.x - after.x;
        self.state.center[1] += before.y - after.y;
    }
}

/// Animated move between two view states.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTransition {
    pub from: ViewState,
    pub to: ViewState,
    pub start_time: f64,
    /// Milliseconds.
    pub duration: f64,
}

impl ViewTransition {
    pub fn new(from: ViewState, to: ViewState, start_time: f64, duration: f64) -> Self {
        Self {
            from,
            to,
            start_time,
            duration,
        }
    }

    pub fn is_finished(&self, now: f64) -> bool {
        now - self.start_time >= self.duration
    }

    /// State at `now`; the target once the duration has elapsed.
    pub fn state_at(&self, now: f64) -> ViewState {
        let elapsed = now - self.start_time;
        if self.duration <= 0.0 || elapsed >= self.duration {
            return self.to;
        }
        let t = ease_in_out((elapsed / self.duration).max(0.0));
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        // Interpolate resolution geometrically so zooming feels uniform.
        let resolution = (self.from.resolution.ln()
            + (self.to.resolution.ln() - self.from.resolution.ln()) * t)
            .exp();
        ViewState {
            center: [
                lerp(self.from.center[0], self.to.center[0]),
                lerp(self.from.center[1], self.to.center[1]),
            ],
            resolution,
            rotation: lerp(self.from.rotation, self.to.rotation),
        }
    }
}

fn ease_in_out(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}
