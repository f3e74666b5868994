#![allow(dead_code)]

use std::sync::Arc;

use weatherguard::{AppState, MemoryCredentialStore, Settings};

pub fn test_settings() -> Settings {
    Settings::new_for_test().expect("Failed to load test config")
}

pub fn test_state(settings: Settings) -> (AppState, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let state = AppState::with_store(settings, store.clone()).expect("Failed to build state");
    (state, store)
}

/// Settings pointing the weather passthrough at `base_url`.
pub fn settings_with_weather(base_url: &str) -> Settings {
    let mut settings = test_settings();
    settings.weather.base_url = base_url.to_string();
    settings
}
