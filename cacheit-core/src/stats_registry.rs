use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::CacheStats;

/// Process-wide registry of composite cache statistics, keyed by cache bin.
///
/// Every [`CompositeCache`](crate::CompositeCache) registers its counters here
/// when built, so a host can report on all bins without holding the caches.
///
/// # Examples
///
/// ```
/// use cacheit_core::stats_registry;
///
/// if let Some(stats) = stats_registry::get("render") {
///     println!("render bin hit rate: {:.2}", stats.hit_rate());
/// }
/// ```
static STATS_REGISTRY: Lazy<RwLock<HashMap<String, Arc<CacheStats>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register statistics under `name`, replacing any previous registration.
pub fn register(name: &str, stats: Arc<CacheStats>) {
    let mut registry = STATS_REGISTRY.write();
    registry.insert(name.to_string(), stats);
}

/// Snapshot of the statistics registered under `name`.
pub fn get(name: &str) -> Option<CacheStats> {
    let registry = STATS_REGISTRY.read();
    registry.get(name).map(|stats| (**stats).clone())
}

/// Shared handle to the live statistics registered under `name`.
pub fn get_shared(name: &str) -> Option<Arc<CacheStats>> {
    let registry = STATS_REGISTRY.read();
    registry.get(name).cloned()
}

/// Names of every registered bin.
pub fn list() -> Vec<String> {
    let registry = STATS_REGISTRY.read();
    let mut names: Vec<String> = registry.keys().cloned().collect();
    names.sort();
    names
}

/// Reset the counters registered under `name`.
///
/// # Returns
///
/// `true` if something was registered under that name
pub fn reset(name: &str) -> bool {
    let registry = STATS_REGISTRY.read();
    if let Some(stats) = registry.get(name) {
        stats.reset();
        true
    } else {
        false
    }
}
