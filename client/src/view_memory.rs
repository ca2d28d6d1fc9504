use gloo_storage::{LocalStorage, Storage};
use territorybro_shared::ViewState;
use territorybro_shared::config::VIEW_MEMORY_PREFIX;
use tracing::debug;

/// Storage key of the view remembered under a map's settings key.
pub fn storage_key(settings_key: &str) -> String {
    format!("{VIEW_MEMORY_PREFIX}{settings_key}")
}

/// The view the user last left this map at, if it is still usable.
pub fn load(settings_key: &str) -> Option<ViewState> {
    let state = LocalStorage::get::<ViewState>(storage_key(settings_key)).ok()?;
    state.is_valid().then_some(state)
}

pub fn save(settings_key: &str, state: &ViewState) {
    if let Err(err) = LocalStorage::set(storage_key(settings_key), state) {
        debug!(%err, settings_key, "could not remember map view");
    }
}

pub fn forget(settings_key: &str) {
    LocalStorage::delete(storage_key(settings_key));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(storage_key("territory-7"), "territorybro.view.territory-7");
    }
}
