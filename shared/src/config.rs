use crate::fit::{FitOptions, MapKind};
use crate::proj::HALF_SIZE;
use crate::raster::RasterRegistry;
use crate::style::StyleRegistry;
use crate::view::ViewConstraints;

/// Resolution of zoom level 0 on a 256 px web mercator grid.
pub const DEFAULT_MAX_RESOLUTION: f64 = 2.0 * HALF_SIZE / 256.0;
/// Global resolution floor; no view zooms in further than this.
pub const DEFAULT_MIN_RESOLUTION: f64 = 0.1;
pub const DEFAULT_ZOOM_FACTOR: f64 = 2.0;
/// Finer zoom steps for printouts so fitted cards waste less paper.
pub const PRINTOUT_ZOOM_FACTOR: f64 = 1.1;
pub const PRINTOUT_PIXEL_RATIO: f64 = 2.0;
/// Screen maps never render below this, so tiles and labels stay sharp.
pub const MIN_SCREEN_PIXEL_RATIO: f64 = 2.0;

/// Delay between the host asking for a map and the surface being built,
/// so the container has been laid out.
pub const MOUNT_DELAY_MS: u32 = 20;

pub const RESET_ZOOM_DURATION_MS: f64 = 500.0;
pub const UPDATE_TERRITORIES_DURATION_MS: f64 = 300.0;

// Show my location
pub const LOCATE_CONTAINMENT_BUFFER: f64 = 30.0; // meters
pub const LOCATE_PADDING_PX: f64 = 20.0;
pub const LOCATE_DURATION_MS: f64 = 500.0;

// Label declutter
pub const LABEL_FONT: &str = "bold 5mm sans-serif";
pub const LABEL_CHAR_WIDTH_PX: f64 = 11.0; // average glyph of LABEL_FONT
pub const MIN_LABEL_SCALE: f64 = 0.1;

/// Cells per axis of the territory picking grid.
pub const PICK_GRID_SIZE: usize = 50;

/// Zoom steps per wheel notch when the platform modifier is held.
pub const WHEEL_ZOOM_STEP: f64 = 1.0;
pub const WHEEL_DELTA_PER_STEP: f64 = 100.0;

/// Key prefix of remembered views in local storage.
pub const VIEW_MEMORY_PREFIX: &str = "territorybro.view.";

// Staleness thresholds for loanable territory fills, in months.
pub const STALE_RECENT_MONTHS: f64 = 3.0;
pub const STALE_MEDIUM_MONTHS: f64 = 6.0;

/// Everything a map surface needs that does not change after startup.
///
/// Built once and shared by reference, so concurrently mounted maps never
/// see each other's state.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    pub rasters: RasterRegistry,
    pub styles: StyleRegistry,
}

impl MapConfig {
    pub fn fit_options(&self, kind: MapKind, printout: bool) -> FitOptions {
        kind.fit_options(printout)
    }

    pub fn constraints(&self, kind: MapKind, printout: bool) -> ViewConstraints {
        kind.fit_mode(printout).constraints()
    }
}
