use geo::Coord;
use js_sys::Reflect;
use territorybro_shared::proj::from_lon_lat;
use tracing::{debug, warn};
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::{Geolocation, PositionOptions};

/// A position reported by the browser, projected to map coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub position: Coord<f64>,
    /// Accuracy radius in map units.
    pub accuracy: f64,
}

impl Fix {
    pub fn from_lon_lat(lon: f64, lat: f64, accuracy_meters: f64) -> Self {
        // Web mercator stretches distances by 1 / cos(latitude).
        let scale = 1.0 / lat.to_radians().cos().max(f64::EPSILON);
        Self {
            position: from_lon_lat(Coord { x: lon, y: lat }),
            accuracy: accuracy_meters * scale,
        }
    }
}

/// A running `watchPosition`; stops when dropped.
pub struct GeolocationWatch {
    geolocation: Geolocation,
    watch_id: i32,
    _on_position: Closure<dyn FnMut(JsValue)>,
    _on_error: Closure<dyn FnMut(JsValue)>,
}

impl GeolocationWatch {
    /// Start tracking with high accuracy. `None` when the browser has no
    /// geolocation or refuses to start.
    pub fn start(on_fix: impl Fn(Fix) + 'static) -> Option<Self> {
        let geolocation = web_sys::window()?.navigator().geolocation().ok()?;

        let on_position = Closure::<dyn FnMut(JsValue)>::new(move |position: JsValue| {
            if let Some(fix) = read_fix(&position) {
                on_fix(fix);
            }
        });
        let on_error = Closure::<dyn FnMut(JsValue)>::new(move |error: JsValue| {
            let message = Reflect::get(&error, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
                .unwrap_or_default();
            warn!(%message, "geolocation failed");
        });

        let options = PositionOptions::new();
        options.set_enable_high_accuracy(true);
        let watch_id = geolocation
            .watch_position_with_error_callback_and_options(
                on_position.as_ref().unchecked_ref(),
                Some(on_error.as_ref().unchecked_ref()),
                &options,
            )
            .ok()?;
        debug!(watch_id, "geolocation started");

        Some(Self {
            geolocation,
            watch_id,
            _on_position: on_position,
            _on_error: on_error,
        })
    }
}

impl Drop for GeolocationWatch {
    fn drop(&mut self) {
        self.geolocation.clear_watch(self.watch_id);
        debug!(watch_id = self.watch_id, "geolocation stopped");
    }
}

fn read_fix(position: &JsValue) -> Option<Fix> {
    let coords = Reflect::get(position, &JsValue::from_str("coords")).ok()?;
    let number = |key: &str| Reflect::get(&coords, &JsValue::from_str(key)).ok()?.as_f64();
    Some(Fix::from_lon_lat(
        number("longitude")?,
        number("latitude")?,
        number("accuracy").unwrap_or(0.0),
    ))
}
