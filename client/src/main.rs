mod draw;
mod geolocation;
mod interaction;
mod layers;
mod logging;
mod maps;
mod mounts;
mod render_loop;
mod surface;
mod tiles;
mod view_memory;

use std::rc::Rc;

use territorybro_shared::MapConfig;
use tracing::info;

fn main() {
    console_error_panic_hook::set_once();
    logging::init();
    mounts::start(Rc::new(MapConfig::default()));
    info!("map engine started");
}
