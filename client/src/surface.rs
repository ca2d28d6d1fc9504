//! One mounted map: a canvas inside the caller's container, its view, its
//! layers and every browser resource it holds.
//!
//! Surfaces are owned by a per-thread registry and addressed through the
//! `Copy` [`SurfaceHandle`], so reactive cleanups can tear them down without
//! holding the DOM objects themselves.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use geo::Coord;
use gloo_timers::callback::Timeout;
use js_sys::Array;
use territorybro_shared::config::{
    LOCATE_DURATION_MS, LOCATE_PADDING_PX, MOUNT_DELAY_MS, UPDATE_TERRITORIES_DURATION_MS,
};
use territorybro_shared::locate::extent_including;
use territorybro_shared::{
    FitOptions, MapConfig, MapRaster, Padding, SpatialGrid, Territory, View, ViewState,
    ViewTransition, fit_extent, fit_with_fallback,
};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, CanvasRenderingContext2d, CustomEvent, CustomEventInit, Event,
    EventTarget, HtmlCanvasElement, HtmlElement, MouseEvent, PointerEvent, ResizeObserver,
    WheelEvent,
};

use crate::draw::{Frame, draw_frame};
use crate::geolocation::{Fix, GeolocationWatch};
use crate::interaction::{
    DOUBLE_CLICK_ZOOM, Modifiers, PointerTracker, drag_pan_allowed, is_mac, wheel_zoom_delta,
};
use crate::layers::MapLayers;
use crate::render_loop::RenderScheduler;
use crate::tiles::TileLayer;
use crate::view_memory;

/// Name of the event dispatched on the container when a territory is
/// clicked; `detail` holds the territory id.
pub const TERRITORY_CLICK_EVENT: &str = "territoryclick";
const CANVAS_STYLE: &str =
    "position:absolute;inset:0;width:100%;height:100%;display:block;touch-action:pan-x pan-y;";
/// A click waits this long so a double click can claim it.
const SINGLE_CLICK_DELAY_MS: u32 = 250;
const DOUBLE_CLICK_DURATION_MS: f64 = 250.0;

/// Per-map settings read from the mount element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceOptions {
    pub printout: bool,
    /// Key under which the user's view adjustments are remembered.
    pub settings_key: Option<String>,
}

struct Setup {
    container: HtmlElement,
    layers: MapLayers,
    raster: MapRaster,
    options: SurfaceOptions,
    config: Rc<MapConfig>,
}

enum SurfaceSlot {
    Pending {
        setup: Rc<RefCell<Option<Setup>>>,
        _timeout: Timeout,
    },
    Mounted(Rc<MapSurface>),
}

thread_local! {
    static SURFACES: RefCell<HashMap<u64, SurfaceSlot>> = RefCell::new(HashMap::new());
    static NEXT_SURFACE_ID: Cell<u64> = const { Cell::new(1) };
}

/// Capability to control or tear down one mounted map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    fn mounted(self) -> Option<Rc<MapSurface>> {
        SURFACES.with(|surfaces| match surfaces.borrow().get(&self.0) {
            Some(SurfaceSlot::Mounted(surface)) => Some(surface.clone()),
            _ => None,
        })
    }

    fn pending(self) -> Option<Rc<RefCell<Option<Setup>>>> {
        SURFACES.with(|surfaces| match surfaces.borrow().get(&self.0) {
            Some(SurfaceSlot::Pending { setup, .. }) => Some(setup.clone()),
            _ => None,
        })
    }

    /// Swap the base tile source; vector layers and view stay as they are.
    pub fn set_raster(self, raster: &MapRaster) {
        if let Some(surface) = self.mounted() {
            surface.tiles.set_raster(raster.clone());
            surface.scheduler.mark_dirty();
        } else if let Some(setup) = self.pending()
            && let Some(setup) = setup.borrow_mut().as_mut()
        {
            setup.raster = raster.clone();
        }
    }

    /// Release everything the surface holds. Before the delayed mount has
    /// happened this cancels it; afterwards it is a no-op.
    pub fn unmount(self) {
        let slot = SURFACES.with(|surfaces| surfaces.borrow_mut().remove(&self.0));
        match slot {
            Some(SurfaceSlot::Mounted(surface)) => surface.teardown(),
            Some(SurfaceSlot::Pending { .. }) => debug!(surface = self.0, "map mount cancelled"),
            None => {}
        }
    }

    /// Animate back to the map kind's default fit.
    pub fn reset_zoom(self, duration: f64) {
        if let Some(surface) = self.mounted() {
            if let Some(key) = surface.settings_key.as_deref() {
                view_memory::forget(key);
            }
            surface.fit(Some(duration));
        }
    }

    /// Animated zoom about the view center, as the +/- buttons do.
    pub fn zoom(self, delta: f64) {
        if let Some(surface) = self.mounted() {
            surface.zoom_about_center(delta);
        }
    }

    /// Track the device position and zoom out until it is visible.
    pub fn show_my_location(self) {
        if let Some(surface) = self.mounted() {
            surface.show_my_location();
        }
    }

    /// Replace the list map's territories and re-fit to them.
    pub fn update_territories(self, territories: &[Territory]) {
        if let Some(surface) = self.mounted() {
            surface.update_territories(territories);
        } else if let Some(setup) = self.pending()
            && let Some(setup) = setup.borrow_mut().as_mut()
        {
            let config = setup.config.clone();
            setup.layers.set_territories(&config, territories);
        }
    }
}

/// Removes its listener when dropped.
struct EventBinding {
    target: EventTarget,
    kind: &'static str,
    handler: Closure<dyn Fn(Event)>,
}

impl EventBinding {
    fn bind(
        target: &EventTarget,
        kind: &'static str,
        passive: bool,
        handler: impl Fn(Event) + 'static,
    ) -> Option<Self> {
        let handler = Closure::<dyn Fn(Event)>::new(handler);
        let options = AddEventListenerOptions::new();
        options.set_passive(passive);
        target
            .add_event_listener_with_callback_and_add_event_listener_options(
                kind,
                handler.as_ref().unchecked_ref(),
                &options,
            )
            .ok()?;
        Some(Self {
            target: target.clone(),
            kind,
            handler,
        })
    }
}

impl Drop for EventBinding {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.handler.as_ref().unchecked_ref());
    }
}

struct ResizeBinding {
    observer: ResizeObserver,
    _callback: Closure<dyn FnMut(Array)>,
}

impl Drop for ResizeBinding {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

pub struct MapSurface {
    id: u64,
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    config: Rc<MapConfig>,
    settings_key: Option<String>,
    fit_options: FitOptions,
    pixel_ratio: f64,
    mac: bool,
    view: RefCell<View>,
    layers: RefCell<MapLayers>,
    pick_grid: RefCell<SpatialGrid>,
    tiles: TileLayer,
    scheduler: RenderScheduler,
    transition: RefCell<Option<ViewTransition>>,
    /// Whether the running transition is a user adjustment worth remembering.
    remember_transition: Cell<bool>,
    fitted: Cell<bool>,
    pointers: RefCell<PointerTracker>,
    /// Set once a gesture moved the view, cleared when it ends.
    moved: Cell<bool>,
    pending_click: RefCell<Option<Timeout>>,
    location: Cell<Option<Fix>>,
    locate_pending: Cell<bool>,
    geolocation: RefCell<Option<GeolocationWatch>>,
    bindings: RefCell<Vec<EventBinding>>,
    resize: RefCell<Option<ResizeBinding>>,
}

impl MapSurface {
    /// Schedule a map into `container`. The canvas is created after a short
    /// delay so the container has been laid out; if the container has left
    /// the page by then, nothing happens.
    pub fn create(
        container: HtmlElement,
        layers: MapLayers,
        raster: MapRaster,
        options: SurfaceOptions,
        config: Rc<MapConfig>,
    ) -> SurfaceHandle {
        let id = NEXT_SURFACE_ID.with(|next| next.replace(next.get() + 1));
        let setup = Rc::new(RefCell::new(Some(Setup {
            container,
            layers,
            raster,
            options,
            config,
        })));

        let setup_for_mount = setup.clone();
        let timeout = Timeout::new(MOUNT_DELAY_MS, move || {
            let Some(setup) = setup_for_mount.borrow_mut().take() else {
                return;
            };
            let surface = MapSurface::build(id, setup);
            let previous = SURFACES.with(|surfaces| {
                let mut surfaces = surfaces.borrow_mut();
                match surface {
                    Some(surface) => surfaces.insert(id, SurfaceSlot::Mounted(surface)),
                    None => surfaces.remove(&id),
                }
            });
            drop(previous);
        });

        SURFACES.with(|surfaces| {
            surfaces.borrow_mut().insert(
                id,
                SurfaceSlot::Pending {
                    setup,
                    _timeout: timeout,
                },
            );
        });
        SurfaceHandle(id)
    }

    fn build(id: u64, setup: Setup) -> Option<Rc<Self>> {
        let Setup {
            container,
            layers,
            raster,
            options,
            config,
        } = setup;
        if !container.is_connected() {
            debug!(surface = id, "map container left the page before mounting");
            return None;
        }
        let document = container.owner_document()?;
        let canvas = document
            .create_element("canvas")
            .ok()?
            .dyn_into::<HtmlCanvasElement>()
            .ok()?;
        let _ = canvas.set_attribute("style", CANVAS_STYLE);
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()?
            .dyn_into::<CanvasRenderingContext2d>()
            .ok()?;
        container.append_child(&canvas).ok()?;

        let kind = layers.kind;
        let pick_grid = layers.pick_grid();
        let mac = web_sys::window()
            .and_then(|w| w.navigator().user_agent().ok())
            .is_some_and(|ua| is_mac(&ua));

        let surface = Rc::new_cyclic(|weak: &Weak<MapSurface>| {
            let weak_render = weak.clone();
            let scheduler = RenderScheduler::new(move |now| {
                weak_render
                    .upgrade()
                    .is_some_and(|surface| surface.render(now))
            });
            let weak_tiles = weak.clone();
            let tiles = TileLayer::new(raster, move || {
                if let Some(surface) = weak_tiles.upgrade() {
                    surface.scheduler.mark_dirty();
                }
            });
            MapSurface {
                id,
                container,
                canvas,
                ctx,
                fit_options: config.fit_options(kind, options.printout),
                view: RefCell::new(View::new(config.constraints(kind, options.printout))),
                config,
                settings_key: options.settings_key,
                pixel_ratio: kind.fit_mode(options.printout).pixel_ratio(device_pixel_ratio()),
                mac,
                layers: RefCell::new(layers),
                pick_grid: RefCell::new(pick_grid),
                tiles,
                scheduler,
                transition: RefCell::new(None),
                remember_transition: Cell::new(false),
                fitted: Cell::new(false),
                pointers: RefCell::new(PointerTracker::default()),
                moved: Cell::new(false),
                pending_click: RefCell::new(None),
                location: Cell::new(None),
                locate_pending: Cell::new(false),
                geolocation: RefCell::new(None),
                bindings: RefCell::new(Vec::new()),
                resize: RefCell::new(None),
            }
        });

        if kind.is_interactive() {
            surface.bind_interactions();
        }
        surface.observe_size();
        debug!(surface = id, ?kind, "map surface mounted");
        Some(surface)
    }

    fn teardown(&self) {
        self.scheduler.cancel();
        self.bindings.borrow_mut().clear();
        self.resize.borrow_mut().take();
        self.geolocation.borrow_mut().take();
        self.pending_click.borrow_mut().take();
        self.canvas.remove();
        debug!(surface = self.id, "map surface unmounted");
    }

    fn observe_size(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let callback = Closure::<dyn FnMut(Array)>::new(move |_entries: Array| {
            if let Some(surface) = weak.upgrade() {
                surface.resize();
            }
        });
        match ResizeObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => {
                observer.observe(&self.container);
                *self.resize.borrow_mut() = Some(ResizeBinding {
                    observer,
                    _callback: callback,
                });
            }
            Err(_) => {
                warn!(surface = self.id, "no ResizeObserver; map keeps its initial size");
                self.resize();
            }
        }
    }

    fn resize(&self) {
        let w = self.container.client_width() as f64;
        let h = self.container.client_height() as f64;
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let pr = self.pixel_ratio;
        self.canvas.set_width((w * pr).round() as u32);
        self.canvas.set_height((h * pr).round() as u32);
        self.view.borrow_mut().size = [w, h];
        if !self.fitted.replace(true) {
            self.initial_view();
        }
        self.scheduler.mark_dirty();
    }

    fn initial_view(&self) {
        self.fit(None);
        let Some(key) = self.settings_key.as_deref() else {
            return;
        };
        if let Some(state) = view_memory::load(key) {
            debug!(surface = self.id, settings_key = key, "restoring remembered view");
            self.view.borrow_mut().state = state;
        }
    }

    /// Fit the first non-empty layer of the map kind's fit chain.
    fn fit(&self, duration: Option<f64>) {
        let (size, rotation, constraints) = {
            let view = self.view.borrow();
            (view.size, view.state.rotation, view.constraints)
        };
        let extents = self.layers.borrow().fit_extents();
        let opts = FitOptions {
            duration,
            ..self.fit_options
        };
        if let Some(target) = fit_with_fallback(size, &extents, rotation, &opts, &constraints) {
            debug!(surface = self.id, resolution = target.resolution, "fitting view");
            self.animate_to(target, opts.duration);
            self.remember_transition.set(false);
        }
    }

    /// Move to `target`, animated when a duration is given. A new move
    /// replaces a running one.
    fn animate_to(&self, target: ViewState, duration: Option<f64>) {
        match duration.filter(|d| *d > 0.0) {
            Some(duration) => {
                let from = self.view.borrow().state;
                *self.transition.borrow_mut() =
                    Some(ViewTransition::new(from, target, now_ms(), duration));
                self.remember_transition.set(true);
            }
            None => {
                self.transition.borrow_mut().take();
                self.view.borrow_mut().state = target;
            }
        }
        self.scheduler.mark_dirty();
    }

    /// Remember the view once a user-driven change has come to rest.
    fn view_settled(&self) {
        if let Some(key) = self.settings_key.as_deref() {
            view_memory::save(key, &self.view.borrow().state);
        }
    }

    fn step_transition(&self, now: f64) -> bool {
        let Some(transition) = self.transition.borrow().clone() else {
            return false;
        };
        self.view.borrow_mut().state = transition.state_at(now);
        if transition.is_finished(now) {
            self.transition.borrow_mut().take();
            if self.remember_transition.replace(false) {
                self.view_settled();
            }
            return false;
        }
        true
    }

    /// Paint one frame; `true` while an animation needs more frames.
    fn render(&self, now: f64) -> bool {
        let animating = self.step_transition(now);
        let view = self.view.borrow().clone();
        if !view.has_size() {
            return animating;
        }
        let visible = view.calculate_extent();
        let tiles = match self.tiles.visible_range(&visible, view.state.resolution) {
            Some(range) => {
                self.tiles.request(&range, view.state.center);
                self.tiles.drawable(&range)
            }
            None => Vec::new(),
        };
        let layers = self.layers.borrow();
        draw_frame(
            &self.ctx,
            &Frame {
                view: &view,
                pixel_ratio: self.pixel_ratio,
                tiles: &tiles,
                layers: &layers,
                location: self.location.get(),
                location_style: &self.config.styles.geolocation,
            },
        );
        animating
    }

    fn update_territories(&self, territories: &[Territory]) {
        {
            let mut layers = self.layers.borrow_mut();
            layers.set_territories(&self.config, territories);
            *self.pick_grid.borrow_mut() = layers.pick_grid();
        }
        self.fit(Some(UPDATE_TERRITORIES_DURATION_MS));
    }

    fn show_my_location(self: &Rc<Self>) {
        if self.geolocation.borrow().is_none() {
            let weak = Rc::downgrade(self);
            let watch = GeolocationWatch::start(move |fix| {
                if let Some(surface) = weak.upgrade() {
                    surface.on_fix(fix);
                }
            });
            if watch.is_none() {
                warn!(surface = self.id, "geolocation is not available");
                return;
            }
            *self.geolocation.borrow_mut() = watch;
        }
        // The first fix arrives asynchronously; later clicks reuse the last one.
        match self.location.get() {
            Some(fix) => self.zoom_out_to(fix.position),
            None => self.locate_pending.set(true),
        }
    }

    fn on_fix(&self, fix: Fix) {
        self.location.set(Some(fix));
        if self.locate_pending.replace(false) {
            self.zoom_out_to(fix.position);
        }
        self.scheduler.mark_dirty();
    }

    fn zoom_out_to(&self, position: Coord<f64>) {
        let (visible, size, rotation, constraints) = {
            let view = self.view.borrow();
            (
                view.calculate_extent(),
                view.size,
                view.state.rotation,
                view.constraints,
            )
        };
        let Some(extent) = extent_including(&visible, position) else {
            return;
        };
        let opts = FitOptions {
            padding: Padding::uniform(LOCATE_PADDING_PX),
            ..FitOptions::default()
        }
        .with_duration(LOCATE_DURATION_MS);
        if let Some(target) = fit_extent(size, &extent, rotation, &opts, &constraints) {
            self.animate_to(target, opts.duration);
        }
    }

    fn bind_interactions(self: &Rc<Self>) {
        let handlers: [(&'static str, bool, fn(&Rc<MapSurface>, Event)); 6] = [
            ("pointerdown", true, Self::on_pointer_down),
            ("pointermove", false, Self::on_pointer_move),
            ("pointerup", true, Self::on_pointer_up),
            ("pointercancel", true, Self::on_pointer_cancel),
            ("wheel", false, Self::on_wheel),
            ("dblclick", false, Self::on_double_click),
        ];
        let target: &EventTarget = self.canvas.as_ref();
        let mut bindings = self.bindings.borrow_mut();
        for (kind, passive, handler) in handlers {
            let weak = Rc::downgrade(self);
            let binding = EventBinding::bind(target, kind, passive, move |event| {
                if let Some(surface) = weak.upgrade() {
                    handler(&surface, event);
                }
            });
            bindings.extend(binding);
        }
    }

    fn on_pointer_down(self: &Rc<Self>, event: Event) {
        let Ok(e) = event.dyn_into::<PointerEvent>() else {
            return;
        };
        let _ = self.canvas.set_pointer_capture(e.pointer_id());
        self.pointers
            .borrow_mut()
            .down(e.pointer_id(), offset(&e));
        // Grabbing the map stops a running animation.
        self.transition.borrow_mut().take();
    }

    fn on_pointer_move(self: &Rc<Self>, event: Event) {
        let Ok(e) = event.dyn_into::<PointerEvent>() else {
            return;
        };
        let gesture = {
            let mut pointers = self.pointers.borrow_mut();
            if pointers.count() == 0 {
                return;
            }
            let allowed = drag_pan_allowed(
                &e.pointer_type(),
                pointers.count(),
                modifiers(&e).platform_only(self.mac),
            );
            pointers.moved(e.pointer_id(), offset(&e), allowed)
        };
        if gesture.is_none() {
            return;
        }
        e.prevent_default();
        {
            let mut view = self.view.borrow_mut();
            view.pan_by_pixels(gesture.pan[0], gesture.pan[1]);
            if let Some((ratio, anchor)) = gesture.zoom {
                let levels = ratio.ln() / view.constraints.zoom_factor.ln();
                view.zoom_by(levels, anchor);
            }
        }
        self.moved.set(true);
        self.scheduler.mark_dirty();
    }

    fn on_pointer_up(self: &Rc<Self>, event: Event) {
        let Ok(e) = event.dyn_into::<PointerEvent>() else {
            return;
        };
        let click = self.pointers.borrow_mut().up(e.pointer_id(), offset(&e));
        if let Some(pixel) = click {
            self.schedule_pick(pixel);
        }
        if self.pointers.borrow().count() == 0 && self.moved.replace(false) {
            self.view_settled();
        }
    }

    fn on_pointer_cancel(self: &Rc<Self>, event: Event) {
        let Ok(e) = event.dyn_into::<PointerEvent>() else {
            return;
        };
        self.pointers.borrow_mut().cancel(e.pointer_id());
    }

    fn on_wheel(self: &Rc<Self>, event: Event) {
        let Ok(e) = event.dyn_into::<WheelEvent>() else {
            return;
        };
        // Without the modifier the wheel keeps scrolling the page.
        if !modifiers(&e).platform_only(self.mac) {
            return;
        }
        e.prevent_default();
        let delta = wheel_zoom_delta(e.delta_y(), e.delta_mode());
        self.transition.borrow_mut().take();
        self.view.borrow_mut().zoom_by(delta, offset(&e));
        self.scheduler.mark_dirty();
        self.view_settled();
    }

    fn on_double_click(self: &Rc<Self>, event: Event) {
        let Ok(e) = event.dyn_into::<MouseEvent>() else {
            return;
        };
        e.prevent_default();
        self.pending_click.borrow_mut().take();
        let delta = if e.shift_key() {
            -DOUBLE_CLICK_ZOOM
        } else {
            DOUBLE_CLICK_ZOOM
        };
        let mut target = self.view.borrow().clone();
        target.zoom_by(delta, offset(&e));
        self.animate_to(target.state, Some(DOUBLE_CLICK_DURATION_MS));
    }

    fn zoom_about_center(&self, delta: f64) {
        let mut target = self.view.borrow().clone();
        if !target.has_size() {
            return;
        }
        let [w, h] = target.size;
        target.zoom_by(delta, [w / 2.0, h / 2.0]);
        self.animate_to(target.state, Some(DOUBLE_CLICK_DURATION_MS));
    }

    fn schedule_pick(self: &Rc<Self>, pixel: [f64; 2]) {
        if self.pick_grid.borrow().is_empty() {
            return;
        }
        let weak = Rc::downgrade(self);
        let timeout = Timeout::new(SINGLE_CLICK_DELAY_MS, move || {
            if let Some(surface) = weak.upgrade() {
                surface.pending_click.borrow_mut().take();
                surface.pick(pixel);
            }
        });
        *self.pending_click.borrow_mut() = Some(timeout);
    }

    /// Report the territory under `pixel`, but only when exactly one is hit;
    /// overlapping labels need a closer zoom.
    fn pick(&self, pixel: [f64; 2]) {
        let coordinate = self.view.borrow().coordinate_from_pixel(pixel);
        let Some(id) = self
            .pick_grid
            .borrow()
            .pick_unique(coordinate)
            .map(str::to_string)
        else {
            return;
        };
        debug!(surface = self.id, territory = %id, "territory clicked");
        let init = CustomEventInit::new();
        init.set_bubbles(true);
        init.set_detail(&JsValue::from_str(&id));
        if let Ok(event) = CustomEvent::new_with_event_init_dict(TERRITORY_CLICK_EVENT, &init) {
            let _ = self.container.dispatch_event(&event);
        }
    }
}

fn offset(e: &MouseEvent) -> [f64; 2] {
    [e.offset_x() as f64, e.offset_y() as f64]
}

fn modifiers(e: &MouseEvent) -> Modifiers {
    Modifiers {
        alt: e.alt_key(),
        ctrl: e.ctrl_key(),
        meta: e.meta_key(),
        shift: e.shift_key(),
    }
}

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0)
}
