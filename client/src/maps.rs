//! Map components and the `data-map` elements they are mounted from.

use std::sync::{Arc, OnceLock};
use std::rc::Rc;

use leptos::prelude::*;
use territorybro_shared::config::RESET_ZOOM_DURATION_MS;
use territorybro_shared::{Congregation, MapConfig, MapKind, MapRaster, Territory};
use thiserror::Error;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlElement, MutationObserver, MutationObserverInit};

use crate::layers::MapLayers;
use crate::surface::{MapSurface, SurfaceHandle, SurfaceOptions};

pub const ATTR_MAP: &str = "data-map";
const ATTR_RASTER: &str = "data-map-raster";
const ATTR_PRINTOUT: &str = "data-printout";
const ATTR_SETTINGS_KEY: &str = "data-settings-key";
const ATTR_TERRITORY_LOCATION: &str = "data-territory-location";
const ATTR_TERRITORY_NUMBER: &str = "data-territory-number";
const ATTR_TERRITORY_ID: &str = "data-territory-id";
const ATTR_REGION_LOCATION: &str = "data-region-location";
pub const ATTR_TERRITORIES: &str = "data-territories";
const ATTR_CONGREGATION: &str = "data-congregation";

const ZOOM_BUTTON_DELTA: f64 = 1.0;

const CONTAINER_STYLE: &str = "position: relative; width: 100%; height: 100%; overflow: hidden;";
const CONTROLS_STYLE: &str = "position: absolute; top: 8px; left: 8px; z-index: 1; display: flex; flex-direction: column; gap: 4px;";
const BUTTON_STYLE: &str = "width: 28px; height: 28px; border-radius: 4px; border: 1px solid #9aa0a6; background: rgba(255, 255, 255, 0.85); color: #202124; cursor: pointer; font: bold 16px sans-serif; padding: 0;";
const SELECT_STYLE: &str = "position: absolute; top: 8px; right: 8px; z-index: 1; max-width: 60%; font: 12px sans-serif;";
const ATTRIBUTION_STYLE: &str = "position: absolute; right: 0; bottom: 0; z-index: 1; padding: 1px 5px; background: rgba(255, 255, 255, 0.7); font: 11px sans-serif;";

#[derive(Debug, Error, PartialEq)]
pub enum MountError {
    #[error("unknown map kind {0:?}")]
    UnknownKind(String),
    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),
    #[error("attribute {attribute} is not valid JSON: {message}")]
    InvalidJson {
        attribute: &'static str,
        message: String,
    },
    #[error("territory {0:?} is not in the congregation")]
    UnknownTerritory(String),
}

pub fn parse_kind(value: &str) -> Result<MapKind, MountError> {
    match value {
        "territory" => Ok(MapKind::Territory),
        "neighborhood" => Ok(MapKind::Neighborhood),
        "region" => Ok(MapKind::Region),
        "territory-list" => Ok(MapKind::TerritoryList),
        "minimap" => Ok(MapKind::MiniMap),
        other => Err(MountError::UnknownKind(other.to_string())),
    }
}

/// A map described by the data attributes of its mount element.
#[derive(Debug, Clone)]
pub struct MapElement {
    pub layers: MapLayers,
    pub raster_id: Option<String>,
    pub printout: bool,
    pub settings_key: Option<String>,
}

impl MapElement {
    /// Read a map from attribute values; `get` returns `None` for an absent
    /// attribute.
    pub fn from_attributes(
        config: &MapConfig,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MountError> {
        let kind = parse_kind(&get(ATTR_MAP).ok_or(MountError::MissingAttribute(ATTR_MAP))?)?;
        let territory_location = get(ATTR_TERRITORY_LOCATION);
        let layers = match kind {
            MapKind::Territory => MapLayers::territory(config, territory_location.as_deref()),
            MapKind::Neighborhood => MapLayers::neighborhood(
                config,
                get(ATTR_TERRITORY_NUMBER).as_deref(),
                territory_location.as_deref(),
            ),
            MapKind::Region => {
                let territories = territories_attribute(&get)?.unwrap_or_default();
                MapLayers::region(config, get(ATTR_REGION_LOCATION).as_deref(), &territories)
            }
            MapKind::TerritoryList => {
                let congregation = congregation_attribute(&get)?;
                let territories = territories_attribute(&get)?
                    .unwrap_or_else(|| congregation.territories.clone());
                MapLayers::territory_list(config, &congregation, &territories)
            }
            MapKind::MiniMap => {
                let congregation = congregation_attribute(&get)?;
                let id = get(ATTR_TERRITORY_ID)
                    .ok_or(MountError::MissingAttribute(ATTR_TERRITORY_ID))?;
                let territory = congregation
                    .territory_by_id(&id)
                    .ok_or(MountError::UnknownTerritory(id.clone()))?;
                MapLayers::minimap(config, &congregation, territory)
            }
        };
        Ok(Self {
            layers,
            raster_id: get(ATTR_RASTER).filter(|id| !id.is_empty()),
            printout: get(ATTR_PRINTOUT).is_some(),
            settings_key: get(ATTR_SETTINGS_KEY).filter(|key| !key.is_empty()),
        })
    }

    pub fn kind(&self) -> MapKind {
        self.layers.kind
    }

    pub fn options(&self) -> SurfaceOptions {
        SurfaceOptions {
            printout: self.printout,
            settings_key: self.settings_key.clone(),
        }
    }
}

pub fn parse_territories(json: &str) -> Result<Vec<Territory>, MountError> {
    serde_json::from_str(json).map_err(|err| MountError::InvalidJson {
        attribute: ATTR_TERRITORIES,
        message: err.to_string(),
    })
}

fn territories_attribute(
    get: &impl Fn(&str) -> Option<String>,
) -> Result<Option<Vec<Territory>>, MountError> {
    get(ATTR_TERRITORIES)
        .map(|json| parse_territories(&json))
        .transpose()
}

fn congregation_attribute(get: &impl Fn(&str) -> Option<String>) -> Result<Congregation, MountError> {
    let json = get(ATTR_CONGREGATION).ok_or(MountError::MissingAttribute(ATTR_CONGREGATION))?;
    Congregation::from_json(&json).map_err(|err| MountError::InvalidJson {
        attribute: ATTR_CONGREGATION,
        message: err.to_string(),
    })
}

/// Calls back with the new territories whenever the element's
/// `data-territories` attribute changes. Disconnects when dropped.
pub struct TerritoriesObserver {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut()>,
}

impl TerritoriesObserver {
    pub fn observe(element: &Element, on_change: impl Fn(Vec<Territory>) + 'static) -> Option<Self> {
        let target = element.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            let Some(json) = target.get_attribute(ATTR_TERRITORIES) else {
                return;
            };
            match parse_territories(&json) {
                Ok(territories) => on_change(territories),
                Err(err) => warn!(%err, "ignoring territory update"),
            }
        });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).ok()?;
        let init = MutationObserverInit::new();
        init.set_attributes(true);
        let filter = js_sys::Array::of1(&JsValue::from_str(ATTR_TERRITORIES));
        init.set_attribute_filter(&filter);
        observer.observe_with_options(element, &init).ok()?;
        Some(Self {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for TerritoriesObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// One map with its controls. The surface is created once the container
/// is in the page and unmounted with the component.
#[component]
pub fn MapView(
    config: Rc<MapConfig>,
    layers: MapLayers,
    raster_id: Option<String>,
    options: SurfaceOptions,
    /// Replacement territories for the list map.
    territories: Option<Signal<Vec<Territory>>>,
) -> impl IntoView {
    let Some(initial) = config.rasters.find_or_default(raster_id.as_deref()).cloned() else {
        warn!("no map rasters configured");
        return ().into_any();
    };
    let kind = layers.kind;
    let controls = kind.is_interactive() && !options.printout;
    let show_location = kind == MapKind::Territory && !options.printout;
    let show_attribution = kind.is_interactive();
    let rasters: Arc<[MapRaster]> = config.rasters.all().into();
    let selected = RwSignal::new(initial.id.clone());

    let container = NodeRef::<leptos::html::Div>::new();
    let handle: Arc<OnceLock<SurfaceHandle>> = Arc::new(OnceLock::new());

    let mount_slot = handle.clone();
    let mut setup = Some((layers, initial.clone(), options));
    Effect::new(move || {
        let Some(div) = container.get() else {
            return;
        };
        let Some((layers, raster, options)) = setup.take() else {
            return;
        };
        let surface = MapSurface::create(HtmlElement::from(div), layers, raster, options, config.clone());
        debug!(?kind, "map scheduled");
        let _ = mount_slot.set(surface);
    });

    let cleanup_slot = handle.clone();
    on_cleanup(move || {
        if let Some(surface) = cleanup_slot.get() {
            surface.unmount();
        }
    });

    if let Some(territories) = territories {
        let update_slot = handle.clone();
        Effect::new(move |seen: Option<()>| {
            territories.with(|list| {
                if seen.is_some()
                    && let Some(surface) = update_slot.get()
                {
                    surface.update_territories(list);
                }
            });
        });
    }

    let controls_view = controls.then(|| {
        let zoom_in = handle.clone();
        let zoom_out = handle.clone();
        let reset = handle.clone();
        let locate = handle.clone();
        view! {
            <div style=CONTROLS_STYLE>
                <button
                    title="Zoom in"
                    style=BUTTON_STYLE
                    on:click=move |_| {
                        if let Some(surface) = zoom_in.get() {
                            surface.zoom(ZOOM_BUTTON_DELTA);
                        }
                    }
                >"+"</button>
                <button
                    title="Zoom out"
                    style=BUTTON_STYLE
                    on:click=move |_| {
                        if let Some(surface) = zoom_out.get() {
                            surface.zoom(-ZOOM_BUTTON_DELTA);
                        }
                    }
                >"\u{2212}"</button>
                <button
                    title="Reset zoom"
                    style=BUTTON_STYLE
                    on:click=move |_| {
                        if let Some(surface) = reset.get() {
                            surface.reset_zoom(RESET_ZOOM_DURATION_MS);
                        }
                    }
                >"\u{2922}"</button>
                {show_location.then(|| view! {
                    <button
                        title="Show my location"
                        style=BUTTON_STYLE
                        on:click=move |_| {
                            if let Some(surface) = locate.get() {
                                surface.show_my_location();
                            }
                        }
                    >"\u{25CE}"</button>
                })}
            </div>
        }
    });

    let raster_select = (controls && rasters.len() > 1).then(|| {
        let choices = rasters.clone();
        let select_slot = handle.clone();
        let initial_id = initial.id.clone();
        let on_change = move |ev: leptos::ev::Event| {
            let id = event_target_value(&ev);
            let Some(raster) = choices.iter().find(|r| r.id == id) else {
                return;
            };
            if let Some(surface) = select_slot.get() {
                surface.set_raster(raster);
            }
            selected.set(id);
        };
        view! {
            <select style=SELECT_STYLE on:change=on_change>
                {rasters.iter().map(|raster| view! {
                    <option value=raster.id.clone() selected={raster.id == initial_id}>
                        {raster.name.clone()}
                    </option>
                }).collect_view()}
            </select>
        }
    });

    let attribution = show_attribution.then(|| {
        let rasters = rasters.clone();
        let html = move || {
            selected.with(|id| {
                rasters
                    .iter()
                    .find(|r| &r.id == id)
                    .map(|r| r.attribution.clone())
                    .unwrap_or_default()
            })
        };
        view! { <div style=ATTRIBUTION_STYLE inner_html=html /> }
    });

    view! {
        <div node_ref=container style=CONTAINER_STYLE>
            {controls_view}
            {raster_select}
            {attribution}
        </div>
    }
    .into_any()
}
