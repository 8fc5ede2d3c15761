//! Coordinator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_debounce_window_secs() -> u64 {
    5
}

/// Configuration for the session coordination layer.
///
/// Deserialized from the shell's configuration file; every field has a
/// default so an empty table is a valid configuration.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CoordinatorConfig {
    /// Minimum time, in seconds, between the start of two admitted fetches
    /// for the same resource key.
    #[serde(default = "default_debounce_window_secs")]
    pub debounce_window_secs: u64,

    /// Whether a rehydrated session is trusted as authenticated immediately,
    /// or held unauthenticated until the first verification confirms it.
    #[serde(default)]
    pub trust_rehydrated_session: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce_window_secs: default_debounce_window_secs(),
            trust_rehydrated_session: false,
        }
    }
}

impl CoordinatorConfig {
    /// Returns the debounce window as a [`Duration`].
    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.debounce_window_secs)
    }
}
