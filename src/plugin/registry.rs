//! Plugin registry and URL resolution.
//!
//! The registry is an ordered name → handler map. Resolution walks it in
//! order and returns the first handler whose matchers accept the URL, so
//! the order *is* the priority. Batch loads put specific handlers first and
//! the generic fallbacks last, in `hls`, `dash`, `http` order.
//!
//! Readers take a cheap snapshot (`Arc` of an immutable map); writers
//! build a private copy and swap it in under one write lock, so a resolve
//! never observes a half-applied batch.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use super::builtin;
use super::handler::{Handler, FALLBACK_ORDER};
use super::loader::PluginLoader;
use super::matcher::Captures;

/// A handler selected for a URL.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub name: String,
    pub handler: Arc<dyn Handler>,
    /// Label of the matcher that accepted the URL.
    pub matcher: Option<String>,
    /// Named groups captured from the URL.
    pub captures: Captures,
}

#[derive(Clone, Default)]
struct PluginMap {
    entries: Vec<(String, Arc<dyn Handler>)>,
}

impl PluginMap {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    /// Replace in place, or append a new name at the end.
    fn insert(&mut self, name: String, handler: Arc<dyn Handler>) -> Option<Arc<dyn Handler>> {
        match self.position(&name) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, handler)),
            None => {
                self.entries.push((name, handler));
                None
            }
        }
    }

    fn remove(&mut self, name: &str) -> Option<Arc<dyn Handler>> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Arrange one load batch: specific handlers in discovery order (a
/// repeated name replaces the earlier one in place), then the fallbacks
/// present in the batch in [`FALLBACK_ORDER`].
fn order_batch<I>(candidates: I) -> PluginMap
where
    I: IntoIterator<Item = (String, Arc<dyn Handler>)>,
{
    let mut ordered = PluginMap::default();
    let mut fallbacks: [Option<Arc<dyn Handler>>; FALLBACK_ORDER.len()] = Default::default();

    for (name, handler) in candidates {
        if let Some(slot) = FALLBACK_ORDER.iter().position(|f| *f == name) {
            fallbacks[slot] = Some(handler);
        } else if ordered.insert(name.clone(), handler).is_some() {
            info!("Plugin {name} is being overridden within the same batch");
        }
    }

    for (name, handler) in FALLBACK_ORDER.iter().zip(fallbacks) {
        if let Some(handler) = handler {
            ordered.insert((*name).to_string(), handler);
        }
    }

    ordered
}

/// Registry of stream handlers keyed by name.
pub struct PluginRegistry {
    plugins: RwLock<Arc<PluginMap>>,
    loader: PluginLoader,
}

impl PluginRegistry {
    /// Empty registry with the default manifest loader.
    pub fn new() -> Self {
        Self::with_loader(PluginLoader::new())
    }

    /// Empty registry using `loader` for directory loads.
    pub fn with_loader(loader: PluginLoader) -> Self {
        Self {
            plugins: RwLock::new(Arc::new(PluginMap::default())),
            loader,
        }
    }

    /// Registry with the builtin `hls`, `dash` and `http` handlers loaded.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.load_builtin();
        registry
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Load the builtin handler batch.
    pub fn load_builtin(&self) -> bool {
        self.load(builtin::handlers())
    }

    /// Load every handler manifest in `path` as one batch.
    ///
    /// Individual bad manifests are logged and skipped. Returns whether
    /// anything was loaded.
    pub fn load_dir(&self, path: impl AsRef<Path>) -> bool {
        self.load(self.loader.load_dir(path.as_ref()))
    }

    /// Load the builtin handlers (if `builtin`) and every manifest in
    /// `dirs` as a single batch.
    ///
    /// Site handlers from the directories therefore resolve ahead of the
    /// builtin fallbacks, and a directory handler named like a builtin
    /// replaces it. Later directories override earlier ones by name.
    pub fn load_sources<P>(&self, builtin: bool, dirs: &[P]) -> bool
    where
        P: AsRef<Path>,
    {
        let mut batch = if builtin {
            builtin::handlers()
        } else {
            Vec::new()
        };
        for dir in dirs {
            let loaded = self.loader.load_dir(dir.as_ref());
            if !loaded.is_empty() {
                debug!("Found {} plugins in {}", loaded.len(), dir.as_ref().display());
            }
            batch.extend(loaded);
        }
        self.load(batch)
    }

    /// Load an explicit `(name, handler)` batch.
    ///
    /// The batch is ordered privately (specific handlers, then `hls`,
    /// `dash`, `http`) and merged into the registry in one step. Existing
    /// names are replaced in place, new names are appended. Returns whether
    /// the batch was non-empty.
    pub fn load<I>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = (String, Arc<dyn Handler>)>,
    {
        let batch = order_batch(candidates);
        if batch.len() == 0 {
            return false;
        }

        let mut guard = self.write();
        let mut merged = (**guard).clone();
        for (name, handler) in batch.entries {
            if merged.insert(name.clone(), handler).is_some() {
                info!("Plugin {name} is being overridden");
            }
        }
        *guard = Arc::new(merged);
        true
    }

    /// Add or replace a single handler, outside of any batch ordering.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        let name = name.into();
        let mut guard = self.write();
        if Arc::make_mut(&mut *guard).insert(name.clone(), handler).is_some() {
            debug!("Plugin {name} replaced");
        }
    }

    /// Remove a handler. Returns whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        let mut guard = self.write();
        if guard.position(name).is_none() {
            return false;
        }
        Arc::make_mut(&mut *guard).remove(name).is_some()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        *self.write() = Arc::new(PluginMap::default());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted handler names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().entries.iter().map(|(n, _)| n.clone()).collect();
        names.sort();
        names
    }

    /// Ordered copy of the registry, in resolution order.
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn Handler>)> {
        self.read().entries.clone()
    }

    /// Find the handler for `url`: the first registered handler (in
    /// resolution order) with a matcher accepting it.
    pub fn resolve(&self, url: &str) -> Option<Resolved> {
        let plugins = Arc::clone(&self.read());

        plugins.entries.iter().find_map(|(name, handler)| {
            let hit = handler.matchers().find(url)?;
            debug!("Plugin [{name}] found for: {url}");
            Some(Resolved {
                name: name.clone(),
                handler: Arc::clone(handler),
                matcher: hit.matcher,
                captures: hit.captures,
            })
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<PluginMap>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<PluginMap>> {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
