//! # Composite Cache
//!
//! Stores composed views keyed by their merged contexts and indexed by their
//! merged tags.
//!
//! Resolving a view goes through these steps:
//!
//! 1. fold the metadata of every cacheable part (placeholders excluded) plus
//!    the configured required contexts
//! 2. resolve each context to its value and derive the entry key
//! 3. on a hit, reuse the stored slots
//! 4. on a miss, compute the lazy parts, store the slots and index the key
//!    under every merged tag on the [`InvalidationBus`]
//! 5. render every placeholder fresh and splice it into its slot
//!
//! An uncacheable composite (max-age 0, disabled cache or a context the host
//! cannot answer) is computed and returned but never stored.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::backend::{CacheBackend, MemoryBackend};
use crate::cache_entry::CacheEntry;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::context::{resolve_contexts, ContextResolver, ContextValues, ResolvedContexts};
use crate::error::{CacheError, CacheResult};
use crate::fragment::{splice, Part, PlaceholderFragment, Slot};
use crate::invalidation::{current_generation, InvalidationBus, InvalidationListener};
use crate::keys::{derive_entry_key, validate_key, validate_tag};
use crate::metadata::CacheMetadata;
use crate::view::{LazyFragment, View, ViewPart};

#[cfg(feature = "stats")]
use crate::stats::CacheStats;

/// How a resolved composite was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a stored entry.
    Hit,
    /// Computed and stored.
    Miss,
    /// Computed and not stored.
    Uncacheable,
}

/// A delivered composite.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// Content of every part, in view order, placeholders filled in.
    pub value: Vec<T>,
    /// Merged metadata of the cacheable parts.
    pub metadata: CacheMetadata,
    /// Entry key, `None` when the composite was not cacheable.
    pub key: Option<String>,
    pub status: CacheStatus,
}

impl<T> Resolved<T> {
    pub fn is_hit(&self) -> bool {
        self.status == CacheStatus::Hit
    }

    pub fn into_value(self) -> Vec<T> {
        self.value
    }
}

/// Deletes backend entries when the bus invalidates them.
struct Evictor<V, B> {
    backend: Arc<B>,
    _marker: PhantomData<fn() -> V>,
}

impl<V, B: CacheBackend<V>> InvalidationListener for Evictor<V, B> {
    fn evict(&self, key: &str) {
        self.backend.delete(key);
    }

    fn evict_all(&self) {
        self.backend.delete_all();
    }
}

enum Pending<'a, T> {
    Ready(T),
    Lazy(LazyFragment<'a, T>),
    Marker(String),
}

/// Cache of composed views.
///
/// # Type Parameters
///
/// * `T` - Content type of a single part
/// * `B` - Storage backend, [`MemoryBackend`] unless the host supplies one
///
/// # Examples
///
/// ```
/// use cacheit_core::{CacheMetadata, CacheStatus, CompositeCache, InvalidationBus, View};
/// use std::sync::Arc;
///
/// let bus = Arc::new(InvalidationBus::new());
/// let cache: CompositeCache<String> = CompositeCache::builder()
///     .bus(Arc::clone(&bus))
///     .build()
///     .unwrap();
///
/// let node_5 = CacheMetadata::new().with_tags(["node:5"]);
/// let render = || {
///     View::new("recent_content")
///         .lazy("list", &[&node_5], || Ok::<_, std::io::Error>("Five".to_string()))
/// };
///
/// assert_eq!(cache.resolve_view(render()).unwrap().status, CacheStatus::Miss);
/// assert_eq!(cache.resolve_view(render()).unwrap().status, CacheStatus::Hit);
///
/// bus.invalidate_tag("node:5");
/// assert_eq!(cache.resolve_view(render()).unwrap().status, CacheStatus::Miss);
/// ```
pub struct CompositeCache<T, B = MemoryBackend<Vec<Slot<T>>>> {
    backend: Arc<B>,
    // The bus only holds a weak reference; this keeps the subscription alive.
    _evictor: Arc<Evictor<Vec<Slot<T>>, B>>,
    bus: Arc<InvalidationBus>,
    clock: Arc<dyn Clock>,
    contexts: Arc<dyn ContextResolver>,
    config: CacheConfig,
    #[cfg(feature = "stats")]
    stats: Arc<CacheStats>,
}

impl<T> CompositeCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start building a cache over an in-memory backend.
    pub fn builder() -> CompositeCacheBuilder<T> {
        CompositeCacheBuilder {
            config: CacheConfig::default(),
            backend: MemoryBackend::new(),
            bus: None,
            clock: None,
            contexts: None,
            _marker: PhantomData,
        }
    }

    /// In-memory cache on the global bus with the system clock.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        Self::builder().config(config).build()
    }
}

impl<T, B> CompositeCache<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: CacheBackend<Vec<Slot<T>>> + 'static,
{
    /// Resolve an ordered list of already computed parts.
    ///
    /// # Errors
    ///
    /// * `CacheError::InvalidKey` - empty `view_key`
    /// * `CacheError::InvalidTag` - a fragment carries a malformed tag
    /// * `CacheError::DuplicatePlaceholder` - two placeholders share a name
    /// * `CacheError::ComputeFailure` - a placeholder failed to render
    pub fn resolve(&self, view_key: &str, parts: Vec<Part<T>>) -> CacheResult<Resolved<T>> {
        self.resolve_view(View::from_parts(view_key, parts))
    }

    /// Resolve a view using the cache's own context resolver.
    pub fn resolve_view(&self, view: View<'_, T>) -> CacheResult<Resolved<T>> {
        self.resolve_view_with(view, self.contexts.as_ref())
    }

    /// Resolve a view against request-specific context values.
    ///
    /// Lazy fragments only run on a miss or when the composite is not
    /// cacheable. Placeholders run on every call.
    pub fn resolve_view_with(
        &self,
        view: View<'_, T>,
        contexts: &dyn ContextResolver,
    ) -> CacheResult<Resolved<T>> {
        let (view_key, parts) = view.into_parts();
        validate_key(&view_key)?;

        let mut metadata =
            CacheMetadata::new().with_contexts(self.config.required_contexts.iter().cloned());
        let mut placeholders: HashMap<String, PlaceholderFragment<T>> = HashMap::new();
        let mut pending = Vec::with_capacity(parts.len());
        let mut oldest_ready = u64::MAX;

        for part in parts {
            match part {
                ViewPart::Ready(fragment) => {
                    metadata = metadata.merge(fragment.metadata());
                    oldest_ready = oldest_ready.min(fragment.generation());
                    pending.push(Pending::Ready(fragment.into_content()));
                }
                ViewPart::Lazy(lazy) => {
                    metadata = metadata.merge(&lazy.metadata());
                    pending.push(Pending::Lazy(lazy));
                }
                ViewPart::Deferred(placeholder) => {
                    let name = placeholder.name().to_string();
                    if placeholders.contains_key(&name) {
                        return Err(CacheError::DuplicatePlaceholder(name));
                    }
                    pending.push(Pending::Marker(name.clone()));
                    placeholders.insert(name, placeholder);
                }
            }
        }

        for tag in metadata.tags() {
            validate_tag(tag)?;
        }

        if !self.config.enabled || metadata.is_uncacheable() {
            return self.compute_uncacheable(pending, &placeholders, metadata);
        }

        let key = match resolve_contexts(contexts, metadata.contexts()) {
            ResolvedContexts::Complete(values) => {
                derive_entry_key(&self.config.bin, &view_key, &values)?
            }
            ResolvedContexts::Unresolved(missing) => {
                tracing::warn!(
                    view = %view_key,
                    ?missing,
                    "context values unavailable, composite will not be cached"
                );
                let metadata = metadata.merge(&CacheMetadata::uncacheable());
                return self.compute_uncacheable(pending, &placeholders, metadata);
            }
        };

        if let Some(entry) = self.backend.get(&key) {
            if self.is_fresh(&entry) {
                #[cfg(feature = "stats")]
                self.stats.record_hit();
                tracing::debug!(key = %key, "composite cache hit");

                let value = splice(entry.value, &placeholders)?;
                return Ok(Resolved {
                    value,
                    metadata: entry.metadata,
                    key: Some(key),
                    status: CacheStatus::Hit,
                });
            }

            self.backend.delete(&key);
            self.bus.unregister(&key);
            #[cfg(feature = "stats")]
            self.stats.record_stale();
            tracing::debug!(key = %key, "dropped stale composite");
        }

        #[cfg(feature = "stats")]
        self.stats.record_miss();
        tracing::debug!(key = %key, "composite cache miss");

        // Taken before the lazy parts run. Ready fragments keep their own,
        // older stamp. An invalidation issued after either is seen on read.
        let created_at = self.clock.now();
        let generation = current_generation().min(oldest_ready);

        let slots = build_slots(pending)?;
        let value = splice(slots.clone(), &placeholders)?;

        self.bus.register(&key, metadata.tags())?;
        self.backend.set(CacheEntry::new(
            key.clone(),
            metadata.clone(),
            slots,
            created_at,
            generation,
        ));

        #[cfg(feature = "stats")]
        self.stats.record_store();
        tracing::debug!(key = %key, max_age = %metadata.max_age(), "stored composite");

        Ok(Resolved {
            value,
            metadata,
            key: Some(key),
            status: CacheStatus::Miss,
        })
    }

    /// Drop one stored entry by key.
    ///
    /// # Returns
    ///
    /// `true` if an entry was stored under `key`
    pub fn invalidate_entry(&self, key: &str) -> bool {
        self.bus.unregister(key);
        self.backend.delete(key)
    }

    /// Number of stored entries, stale ones included until they are read.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn bus(&self) -> &Arc<InvalidationBus> {
        &self.bus
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn is_fresh(&self, entry: &CacheEntry<Vec<Slot<T>>>) -> bool {
        !entry.is_expired_at(self.clock.now(), self.config.max_age_ceiling())
            && self.bus.is_current(entry.metadata.tags(), entry.generation)
    }

    fn compute_uncacheable(
        &self,
        pending: Vec<Pending<'_, T>>,
        placeholders: &HashMap<String, PlaceholderFragment<T>>,
        metadata: CacheMetadata,
    ) -> CacheResult<Resolved<T>> {
        #[cfg(feature = "stats")]
        self.stats.record_uncacheable();

        let slots = build_slots(pending)?;
        let value = splice(slots, placeholders)?;
        Ok(Resolved {
            value,
            metadata,
            key: None,
            status: CacheStatus::Uncacheable,
        })
    }
}

fn build_slots<T>(pending: Vec<Pending<'_, T>>) -> CacheResult<Vec<Slot<T>>> {
    pending
        .into_iter()
        .map(|part| match part {
            Pending::Ready(content) => Ok(Slot::Content(content)),
            Pending::Lazy(lazy) => lazy.run().map(Slot::Content),
            Pending::Marker(name) => Ok(Slot::Placeholder(name)),
        })
        .collect()
}

impl<T, B> fmt::Debug for CompositeCache<T, B>
where
    B: CacheBackend<Vec<Slot<T>>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCache")
            .field("bin", &self.config.bin)
            .field("enabled", &self.config.enabled)
            .field("entries", &self.backend.len())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CompositeCache`].
///
/// Unset collaborators default to the global bus, the system clock and an
/// empty context resolver.
pub struct CompositeCacheBuilder<T, B = MemoryBackend<Vec<Slot<T>>>> {
    config: CacheConfig,
    backend: B,
    bus: Option<Arc<InvalidationBus>>,
    clock: Option<Arc<dyn Clock>>,
    contexts: Option<Arc<dyn ContextResolver>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, B> CompositeCacheBuilder<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: CacheBackend<Vec<Slot<T>>> + 'static,
{
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Store entries in `backend` instead of memory.
    pub fn backend<B2>(self, backend: B2) -> CompositeCacheBuilder<T, B2>
    where
        B2: CacheBackend<Vec<Slot<T>>> + 'static,
    {
        CompositeCacheBuilder {
            config: self.config,
            backend,
            bus: self.bus,
            clock: self.clock,
            contexts: self.contexts,
            _marker: PhantomData,
        }
    }

    pub fn bus(mut self, bus: Arc<InvalidationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn clock<C: Clock + 'static>(mut self, clock: Arc<C>) -> Self {
        let clock: Arc<dyn Clock> = clock;
        self.clock = Some(clock);
        self
    }

    pub fn contexts<R: ContextResolver + 'static>(mut self, resolver: R) -> Self {
        let resolver: Arc<dyn ContextResolver> = Arc::new(resolver);
        self.contexts = Some(resolver);
        self
    }

    /// Validate the configuration and subscribe the backend to the bus.
    ///
    /// # Errors
    ///
    /// `CacheError::InvalidKey` if the configured bin is empty.
    pub fn build(self) -> CacheResult<CompositeCache<T, B>> {
        self.config.validate()?;

        let backend = Arc::new(self.backend);
        let bus = self
            .bus
            .unwrap_or_else(|| Arc::clone(InvalidationBus::global()));
        let evictor = Arc::new(Evictor {
            backend: Arc::clone(&backend),
            _marker: PhantomData,
        });
        bus.subscribe(&evictor);

        #[cfg(feature = "stats")]
        let stats = {
            let stats = Arc::new(CacheStats::new());
            crate::stats_registry::register(&self.config.bin, Arc::clone(&stats));
            stats
        };

        tracing::debug!(bin = %self.config.bin, enabled = self.config.enabled, "built composite cache");

        Ok(CompositeCache {
            backend,
            _evictor: evictor,
            bus,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            contexts: self
                .contexts
                .unwrap_or_else(|| Arc::new(ContextValues::new())),
            config: self.config,
            #[cfg(feature = "stats")]
            stats,
        })
    }
}
