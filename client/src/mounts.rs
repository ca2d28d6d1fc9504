//! Keeps every `[data-map]` element on the page mounted, and only those.
//!
//! A document-wide `MutationObserver` mounts map elements as they are
//! inserted and drops the mount of each one that has left the page, which
//! unmounts its surface and releases everything it holds.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use leptos::mount::mount_to;
use leptos::prelude::*;
use territorybro_shared::{MapConfig, MapKind};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlElement, MutationObserver, MutationObserverInit};

use crate::maps::{ATTR_MAP, MapElement, MapView, TerritoriesObserver};

/// Set on elements that have been handled, so they are mounted only once.
const ATTR_MOUNTED: &str = "data-map-mounted";
const MOUNT_FAILED: &str = "failed";

/// Mounted entries; the caller decides which ones are still attached.
#[derive(Debug)]
pub struct MountRegistry<T> {
    entries: Vec<T>,
}

impl<T> Default for MountRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> MountRegistry<T> {
    pub fn insert(&mut self, entry: T) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove and return the entries that are no longer attached. They are
    /// handed back so the caller can drop them outside any borrow.
    pub fn take_detached(&mut self, is_attached: impl Fn(&T) -> bool) -> Vec<T> {
        let (kept, detached): (Vec<T>, Vec<T>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| is_attached(entry));
        self.entries = kept;
        detached
    }

    pub fn clear(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
    }
}

/// One mounted map element. Dropping it unmounts the map.
struct MountedMap {
    element: HtmlElement,
    _territories: Option<TerritoriesObserver>,
    _mount: Box<dyn Any>,
}

impl MountedMap {
    fn is_attached(&self) -> bool {
        self.element.is_connected()
    }
}

impl Drop for MountedMap {
    fn drop(&mut self) {
        // Re-inserting the element later mounts it afresh.
        let _ = self.element.remove_attribute(ATTR_MOUNTED);
    }
}

struct PageObserver {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut()>,
}

impl Drop for PageObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

thread_local! {
    static MAPS: RefCell<MountRegistry<MountedMap>> = RefCell::new(MountRegistry::default());
    static PAGE_OBSERVER: RefCell<Option<PageObserver>> = const { RefCell::new(None) };
}

/// Mount the maps already on the page and follow later insertions and
/// removals.
pub fn start(config: Rc<MapConfig>) {
    // If start() is re-entered, drop the old mounts so stale surfaces are torn down.
    let old_observer = PAGE_OBSERVER.with(|slot| slot.borrow_mut().take());
    drop(old_observer);
    let old_maps = MAPS.with(|maps| maps.borrow_mut().clear());
    drop(old_maps);

    sync(&config);

    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let callback = Closure::<dyn FnMut()>::new(move || sync(&config));
    let Ok(observer) = MutationObserver::new(callback.as_ref().unchecked_ref()) else {
        warn!("no MutationObserver; maps added later will not mount");
        return;
    };
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    if observer.observe_with_options(&document, &init).is_err() {
        warn!("could not observe the page for map elements");
        return;
    }
    PAGE_OBSERVER.with(|slot| {
        *slot.borrow_mut() = Some(PageObserver {
            observer,
            _callback: callback,
        });
    });
}

/// Unmount maps whose element left the page, then mount new ones.
fn sync(config: &Rc<MapConfig>) {
    let detached = MAPS.with(|maps| maps.borrow_mut().take_detached(MountedMap::is_attached));
    let unmounted = detached.len();
    drop(detached);

    let mut mounted = 0;
    for element in unmounted_elements() {
        let map = match MapElement::from_attributes(config, |name| element.get_attribute(name)) {
            Ok(map) => map,
            Err(err) => {
                warn!(%err, "skipping map element");
                let _ = element.set_attribute(ATTR_MOUNTED, MOUNT_FAILED);
                continue;
            }
        };
        let _ = element.set_attribute(ATTR_MOUNTED, "");
        let entry = mount_map(element, map, config.clone());
        MAPS.with(|maps| maps.borrow_mut().insert(entry));
        mounted += 1;
    }
    if mounted > 0 || unmounted > 0 {
        let total = MAPS.with(|maps| maps.borrow().len());
        debug!(mounted, unmounted, total, "map elements synced");
    }
}

fn unmounted_elements() -> Vec<HtmlElement> {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return Vec::new();
    };
    let selector = format!("[{ATTR_MAP}]:not([{ATTR_MOUNTED}])");
    let Ok(nodes) = document.query_selector_all(&selector) else {
        return Vec::new();
    };
    (0..nodes.length())
        .filter_map(|i| nodes.item(i))
        .filter_map(|node| node.dyn_into::<HtmlElement>().ok())
        .collect()
}

fn mount_map(element: HtmlElement, map: MapElement, config: Rc<MapConfig>) -> MountedMap {
    let mut observer = None;
    let territories = (map.kind() == MapKind::TerritoryList).then(|| {
        let territories = RwSignal::new(Vec::new());
        observer = TerritoriesObserver::observe(&element, move |list| territories.set(list));
        Signal::from(territories)
    });

    let options = map.options();
    let handle = mount_to(element.clone(), move || {
        view! {
            <MapView
                config=config
                layers=map.layers
                raster_id=map.raster_id
                options=options
                territories=territories
            />
        }
    });
    MountedMap {
        element,
        _territories: observer,
        _mount: Box::new(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Entry {
        attached: Rc<Cell<bool>>,
        dropped: Rc<Cell<bool>>,
    }

    impl Drop for Entry {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    fn entry() -> (Entry, Rc<Cell<bool>>, Rc<Cell<bool>>) {
        let attached = Rc::new(Cell::new(true));
        let dropped = Rc::new(Cell::new(false));
        let entry = Entry {
            attached: attached.clone(),
            dropped: dropped.clone(),
        };
        (entry, attached, dropped)
    }

    #[test]
    fn test_removed_element_releases_its_mount() {
        let mut registry = MountRegistry::default();
        let (a, a_attached, a_dropped) = entry();
        let (b, _, b_dropped) = entry();
        registry.insert(a);
        registry.insert(b);

        assert!(registry.take_detached(|e| e.attached.get()).is_empty());
        assert_eq!(registry.len(), 2);

        a_attached.set(false);
        let detached = registry.take_detached(|e| e.attached.get());
        assert_eq!(detached.len(), 1);
        assert_eq!(registry.len(), 1);
        assert!(!a_dropped.get());
        drop(detached);
        assert!(a_dropped.get());
        assert!(!b_dropped.get());
    }

    #[test]
    fn test_clear_hands_back_everything() {
        let mut registry = MountRegistry::default();
        let (a, _, a_dropped) = entry();
        registry.insert(a);
        let all = registry.clear();
        assert_eq!(registry.len(), 0);
        drop(all);
        assert!(a_dropped.get());
    }
}
