use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;
use crate::errors::Result;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
///
/// # Panics
/// If [`init_config`] has not been called.
pub fn get_config() -> Arc<StaticConfig> {
    try_get_config().expect("Config not initialized. Call init_config() first.")
}

pub fn try_get_config() -> Option<Arc<StaticConfig>> {
    CONFIG.get().map(|c| c.load_full())
}

/// Load, validate and publish the global configuration.
///
/// A second call replaces the published value, which keeps repeated CLI
/// invocations inside one process (tests) deterministic.
pub fn init_config(path: Option<&str>) -> Result<()> {
    let config = StaticConfig::load(path)?;
    config.validate()?;
    let config = Arc::new(config);

    CONFIG
        .get_or_init(|| ArcSwap::new(config.clone()))
        .store(config);

    Ok(())
}
