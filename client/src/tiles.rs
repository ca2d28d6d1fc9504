#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use js_sys::Reflect;
use territorybro_shared::Extent;
use territorybro_shared::MapRaster;
use territorybro_shared::proj::HALF_SIZE;
use territorybro_shared::tile_grid::{TileCoord, TileGrid, TileRange};
use tracing::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlImageElement;

const MAX_CONCURRENCY: usize = 6;
/// Loaded images kept per surface before off-screen ones are evicted.
const MAX_CACHED_TILES: usize = 256;
const ONLOAD_HANDLE_KEY: &str = "__territorybroTileOnload";
const ONERROR_HANDLE_KEY: &str = "__territorybroTileOnerror";

/// A tile ready to be drawn: the image of `source` covers `extent`.
#[derive(Clone)]
pub struct DrawableTile {
    pub image: HtmlImageElement,
    pub source: TileCoord,
    pub extent: Extent,
}

/// Base raster layer of one surface: loads the tiles the view needs and
/// hands back what is drawable right now.
///
/// Every raster swap bumps a generation; loads that finish for an older
/// generation are dropped.
#[derive(Clone)]
pub struct TileLayer {
    inner: Rc<Inner>,
}

struct Inner {
    raster: RefCell<MapRaster>,
    generation: Cell<u32>,
    loaded: RefCell<HashMap<TileCoord, HtmlImageElement>>,
    failed: RefCell<HashSet<TileCoord>>,
    pending: RefCell<HashSet<TileCoord>>,
    queue: RefCell<VecDeque<TileCoord>>,
    in_flight: Cell<usize>,
    on_loaded: Box<dyn Fn()>,
}

impl TileLayer {
    /// `on_loaded` runs after each tile finishes loading, typically to
    /// schedule a repaint.
    pub fn new(raster: MapRaster, on_loaded: impl Fn() + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                raster: RefCell::new(raster),
                generation: Cell::new(0),
                loaded: RefCell::new(HashMap::new()),
                failed: RefCell::new(HashSet::new()),
                pending: RefCell::new(HashSet::new()),
                queue: RefCell::new(VecDeque::new()),
                in_flight: Cell::new(0),
                on_loaded: Box::new(on_loaded),
            }),
        }
    }

    /// Swap the tile source. Everything cached for the old source goes.
    pub fn set_raster(&self, raster: MapRaster) {
        debug!(raster = %raster.id, "switching base raster");
        let inner = &self.inner;
        inner.generation.set(inner.generation.get().wrapping_add(1));
        inner.loaded.borrow_mut().clear();
        inner.failed.borrow_mut().clear();
        inner.pending.borrow_mut().clear();
        inner.queue.borrow_mut().clear();
        // Loads still in flight finish against a stale generation.
        inner.in_flight.set(0);
        *inner.raster.borrow_mut() = raster;
    }

    fn grid(&self) -> TileGrid {
        self.inner.raster.borrow().source.tile_grid()
    }

    /// Tiles covering `extent` at the zoom level matching `resolution`.
    pub fn visible_range(&self, extent: &Extent, resolution: f64) -> Option<TileRange> {
        let grid = self.grid();
        grid.tile_range(extent, grid.zoom_for_resolution(resolution))
    }

    /// Queue the tiles of `range` that are neither loaded nor known to fail,
    /// closest to `center` first, replacing whatever was still queued.
    pub fn request(&self, range: &TileRange, center: [f64; 2]) {
        let grid = self.grid();
        let inner = &self.inner;
        let wanted = load_order(range, tile_position(&grid, range.z, center));
        {
            let loaded = inner.loaded.borrow();
            let failed = inner.failed.borrow();
            let mut pending = inner.pending.borrow_mut();
            let mut queue = inner.queue.borrow_mut();
            for stale in queue.drain(..) {
                pending.remove(&stale);
            }
            for tile in wanted {
                if loaded.contains_key(&tile) || failed.contains(&tile) || pending.contains(&tile)
                {
                    continue;
                }
                pending.insert(tile);
                queue.push_back(tile);
            }
        }
        self.evict(range);
        pump_queue(&self.inner);
    }

    /// What to draw for `range`: each tile's own image, or the closest
    /// loaded ancestor while it is still loading.
    pub fn drawable(&self, range: &TileRange) -> Vec<DrawableTile> {
        let grid = self.grid();
        let loaded = self.inner.loaded.borrow();
        let mut seen = HashSet::new();
        let mut fallbacks = Vec::new();
        let mut exact = Vec::new();
        for tile in range.iter() {
            if let Some(image) = loaded.get(&tile) {
                exact.push(DrawableTile {
                    image: image.clone(),
                    source: tile,
                    extent: grid.tile_extent(tile),
                });
                continue;
            }
            let ancestor = ancestors(tile).find(|a| loaded.contains_key(a));
            if let Some(ancestor) = ancestor
                && seen.insert(ancestor)
                && let Some(image) = loaded.get(&ancestor)
            {
                fallbacks.push(DrawableTile {
                    image: image.clone(),
                    source: ancestor,
                    extent: grid.tile_extent(ancestor),
                });
            }
        }
        // Coarser tiles underneath the exact ones.
        fallbacks.sort_by_key(|t| t.source.z);
        fallbacks.extend(exact);
        fallbacks
    }

    fn evict(&self, keep: &TileRange) {
        let mut loaded = self.inner.loaded.borrow_mut();
        if loaded.len() <= MAX_CACHED_TILES {
            return;
        }
        loaded.retain(|tile, _| in_range_or_ancestor(tile, keep));
    }
}

fn pump_queue(inner: &Rc<Inner>) {
    while inner.in_flight.get() < MAX_CONCURRENCY {
        let Some(tile) = inner.queue.borrow_mut().pop_front() else {
            break;
        };
        inner.in_flight.set(inner.in_flight.get() + 1);
        let url = inner.raster.borrow().source.tile_url(tile);
        load_tile(Rc::downgrade(inner), inner.generation.get(), tile, &url);
    }
}

fn finish(weak: &Weak<Inner>, generation: u32, tile: TileCoord, image: Option<HtmlImageElement>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    if inner.generation.get() != generation {
        return;
    }
    inner.in_flight.set(inner.in_flight.get().saturating_sub(1));
    inner.pending.borrow_mut().remove(&tile);
    match image {
        Some(image) => {
            inner.loaded.borrow_mut().insert(tile, image);
            (inner.on_loaded)();
        }
        None => {
            inner.failed.borrow_mut().insert(tile);
        }
    }
    pump_queue(&inner);
}

fn load_tile(weak: Weak<Inner>, generation: u32, tile: TileCoord, src: &str) {
    let img = match HtmlImageElement::new() {
        Ok(img) => img,
        Err(_) => {
            finish(&weak, generation, tile, None);
            return;
        }
    };

    let img_for_load = img.clone();
    let weak_load = weak.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_load);

        let img_for_decode = img_for_load.clone();
        let weak_load = weak_load.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let _ = JsFuture::from(img_for_decode.decode()).await;
            finish(&weak_load, generation, tile, Some(img_for_decode));
        });
    });

    let img_for_error = img.clone();
    let onerror = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_error);
        finish(&weak, generation, tile, None);
    });

    let onload_js = onload.into_js_value();
    let onerror_js = onerror.into_js_value();
    img.set_onload(Some(onload_js.unchecked_ref()));
    img.set_onerror(Some(onerror_js.unchecked_ref()));
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONLOAD_HANDLE_KEY),
        &onload_js,
    );
    let _ = Reflect::set(
        img.as_ref(),
        &JsValue::from_str(ONERROR_HANDLE_KEY),
        &onerror_js,
    );
    img.set_src(src);
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}

/// Position of a projected coordinate in fractional tile units at zoom `z`.
fn tile_position(grid: &TileGrid, z: u8, center: [f64; 2]) -> [f64; 2] {
    let span = grid.resolution(z) * grid.tile_size as f64;
    [(center[0] + HALF_SIZE) / span, (HALF_SIZE - center[1]) / span]
}

/// Tiles of `range` sorted by distance of their centers to `position`.
fn load_order(range: &TileRange, position: [f64; 2]) -> Vec<TileCoord> {
    let distance_sq = |t: &TileCoord| {
        let dx = t.x as f64 + 0.5 - position[0];
        let dy = t.y as f64 + 0.5 - position[1];
        dx * dx + dy * dy
    };
    let mut tiles = range.iter().collect::<Vec<_>>();
    tiles.sort_by(|a, b| distance_sq(a).total_cmp(&distance_sq(b)).then_with(|| a.cmp(b)));
    tiles
}

fn parent(tile: TileCoord) -> Option<TileCoord> {
    (tile.z > 0).then(|| TileCoord {
        z: tile.z - 1,
        x: tile.x / 2,
        y: tile.y / 2,
    })
}

fn ancestors(tile: TileCoord) -> impl Iterator<Item = TileCoord> {
    std::iter::successors(parent(tile), |t| parent(*t))
}

fn in_range_or_ancestor(tile: &TileCoord, range: &TileRange) -> bool {
    if tile.z > range.z {
        return false;
    }
    let shift = range.z - tile.z;
    let covers = |lo: u32, hi: u32, v: u32| (lo >> shift) <= v && v <= (hi >> shift);
    covers(range.min_x, range.max_x, tile.x) && covers(range.min_y, range.max_y, tile.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(z: u8, min_x: u32, max_x: u32, min_y: u32, max_y: u32) -> TileRange {
        TileRange {
            z,
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    #[test]
    fn test_load_order_starts_at_the_center() {
        let order = load_order(&range(3, 0, 2, 0, 2), [1.5, 1.5]);
        assert_eq!(order.len(), 9);
        assert_eq!(order[0], TileCoord { z: 3, x: 1, y: 1 });
        // Corners come last.
        let last = order[8];
        assert!(last.x != 1 && last.y != 1);
    }

    #[test]
    fn test_ancestors_walk_to_the_root() {
        let chain = ancestors(TileCoord { z: 3, x: 5, y: 2 }).collect::<Vec<_>>();
        assert_eq!(
            chain,
            [
                TileCoord { z: 2, x: 2, y: 1 },
                TileCoord { z: 1, x: 1, y: 0 },
                TileCoord { z: 0, x: 0, y: 0 },
            ]
        );
        assert_eq!(parent(TileCoord { z: 0, x: 0, y: 0 }), None);
    }

    #[test]
    fn test_eviction_keeps_visible_tiles_and_their_ancestors() {
        let visible = range(4, 4, 5, 6, 7);
        assert!(in_range_or_ancestor(&TileCoord { z: 4, x: 5, y: 7 }, &visible));
        assert!(in_range_or_ancestor(&TileCoord { z: 3, x: 2, y: 3 }, &visible));
        assert!(in_range_or_ancestor(&TileCoord { z: 0, x: 0, y: 0 }, &visible));
        assert!(!in_range_or_ancestor(&TileCoord { z: 4, x: 6, y: 7 }, &visible));
        assert!(!in_range_or_ancestor(&TileCoord { z: 5, x: 8, y: 12 }, &visible));
    }

    #[test]
    fn test_tile_position_of_the_world_center() {
        let grid = TileGrid::new(256, 19);
        assert_eq!(tile_position(&grid, 2, [0.0, 0.0]), [2.0, 2.0]);
        assert_eq!(tile_position(&grid, 0, [-HALF_SIZE, HALF_SIZE]), [0.0, 0.0]);
    }
}
