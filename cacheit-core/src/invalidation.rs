//! # Cache Invalidation
//!
//! Tag-based invalidation of stored composites.
//!
//! The [`InvalidationBus`] keeps an index from every cache tag to the entry
//! keys carrying it. When the persistence layer changes a record it fires the
//! record's tags (`node:5`, or a list tag such as `cacheit_recent_content`
//! when something is created) and every entry indexed under them is removed
//! from every subscribed store.
//!
//! Every invalidation also draws a number from one process-wide sequence.
//! Content is stamped with [`current_generation`] before the data it is built
//! from is read; [`InvalidationBus::is_current`] rejects a stamp older than
//! the last invalidation of any of its tags. Content computed from old data
//! and stored after the invalidation fired is therefore never served.
//!
//! # Examples
//!
//! ```rust
//! use cacheit_core::invalidation::InvalidationBus;
//!
//! let bus = InvalidationBus::new();
//! bus.register("render:recent_content", ["node:5", "cacheit_recent_content"]).unwrap();
//!
//! // A node was created somewhere: the list is stale.
//! assert_eq!(bus.invalidate_tag("cacheit_recent_content"), 1);
//! assert!(bus.tags_for_entry("render:recent_content").is_empty());
//! ```

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::CacheResult;
use crate::keys::{validate_key, validate_tag};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Number of the latest invalidation on any bus in the process.
///
/// Take it before reading the data a piece of content is built from. Any
/// invalidation issued afterwards gets a strictly greater number.
///
/// ```
/// use cacheit_core::invalidation::{current_generation, InvalidationBus};
///
/// let before = current_generation();
/// InvalidationBus::new().invalidate_tag("node:1");
/// assert!(current_generation() > before);
/// ```
pub fn current_generation() -> u64 {
    SEQUENCE.load(Ordering::SeqCst)
}

fn next_generation() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::SeqCst) + 1
}

/// A store that holds entries indexed by the bus.
///
/// Eviction must be idempotent: the bus may report the same key more than
/// once when invalidations overlap.
pub trait InvalidationListener: Send + Sync {
    /// Drop the entry stored under `key`, if any.
    fn evict(&self, key: &str);
    /// Drop every entry.
    fn evict_all(&self);
}

/// Registry mapping cache tags to the entries that carry them.
///
/// All maps are sharded `DashMap`s, so registering or invalidating one tag
/// only locks the shard holding that tag. Memory is bounded by what is
/// indexed: firing a tag nothing carries leaves no trace beyond one counter.
pub struct InvalidationBus {
    /// Map from tag to set of entry keys
    tag_index: DashMap<String, HashSet<String>>,
    /// Map from entry key to its tags
    key_tags: DashMap<String, BTreeSet<String>>,
    /// Oldest generation still current for each indexed tag
    valid_since: DashMap<String, u64>,
    /// Same, for every tag missing from `valid_since`
    floor: AtomicU64,
    /// Generation of the last full flush
    flushed_at: AtomicU64,
    /// Stores to notify; held weakly so a dropped cache unsubscribes itself
    listeners: RwLock<Vec<Weak<dyn InvalidationListener>>>,
}

static GLOBAL_BUS: Lazy<Arc<InvalidationBus>> = Lazy::new(|| Arc::new(InvalidationBus::new()));

impl InvalidationBus {
    /// Create a new, empty bus
    pub fn new() -> Self {
        Self {
            tag_index: DashMap::new(),
            key_tags: DashMap::new(),
            valid_since: DashMap::new(),
            floor: AtomicU64::new(0),
            flushed_at: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Get the process-wide bus
    pub fn global() -> &'static Arc<InvalidationBus> {
        &GLOBAL_BUS
    }

    /// Subscribe a store to evictions.
    pub fn subscribe<L>(&self, listener: &Arc<L>)
    where
        L: InvalidationListener + 'static,
    {
        let weak = Arc::downgrade(listener);
        let weak: Weak<dyn InvalidationListener> = weak;
        let mut listeners = self.listeners.write();
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(weak);
    }

    /// Index `entry_key` under every tag in `tags`.
    ///
    /// Idempotent. Tags are added to any the key already carries. Nothing is
    /// indexed if the key or any tag is invalid.
    ///
    /// # Errors
    ///
    /// * `CacheError::InvalidKey` - empty key
    /// * `CacheError::InvalidTag` - empty tag or a tag containing whitespace
    pub fn register<I, S>(&self, entry_key: &str, tags: I) -> CacheResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_key(entry_key)?;
        let tags: BTreeSet<String> = tags
            .into_iter()
            .map(|t| {
                let t = t.as_ref();
                validate_tag(t).map(|_| t.to_string())
            })
            .collect::<CacheResult<_>>()?;

        self.key_tags
            .entry(entry_key.to_string())
            .or_default()
            .extend(tags.iter().cloned());

        for tag in &tags {
            self.valid_since
                .entry(tag.clone())
                .or_insert_with(|| self.floor.load(Ordering::SeqCst));
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(entry_key.to_string());
        }

        tracing::trace!(key = entry_key, tags = ?tags, "registered cache entry");
        Ok(())
    }

    /// Remove `entry_key` from the index without notifying stores.
    ///
    /// Used by stores that dropped an entry on their own (TTL expiry).
    ///
    /// # Returns
    ///
    /// `true` if the key was indexed
    pub fn unregister(&self, entry_key: &str) -> bool {
        match self.key_tags.remove(entry_key) {
            Some((_, tags)) => {
                self.drop_from_tag_sets(entry_key, &tags);
                true
            }
            None => false,
        }
    }

    /// Invalidate every entry carrying `tag`.
    ///
    /// A tag nothing is registered under is a no-op.
    ///
    /// # Returns
    ///
    /// Number of entries removed by this call
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        // Raise the floor before forgetting the tag, so a reader never sees
        // the tag missing with the old floor still in place.
        let generation = next_generation();
        self.floor.fetch_max(generation, Ordering::SeqCst);
        self.valid_since.remove(tag);

        let keys = match self.tag_index.remove(tag) {
            Some((_, keys)) => keys,
            None => return 0,
        };

        let mut removed = 0;
        for key in &keys {
            // Only one concurrent invalidation wins the reverse-index removal
            if let Some((_, tags)) = self.key_tags.remove(key) {
                self.drop_from_tag_sets(key, &tags);
                removed += 1;
            }
        }

        let listeners = self.live_listeners();
        for key in &keys {
            for listener in &listeners {
                listener.evict(key);
            }
        }

        tracing::debug!(tag, removed, generation, "invalidated cache tag");
        removed
    }

    /// Invalidate every entry carrying any of `tags`.
    ///
    /// # Returns
    ///
    /// Total number of entries removed
    pub fn invalidate_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .map(|tag| self.invalidate_tag(tag.as_ref()))
            .sum()
    }

    /// Drop every entry and every index.
    ///
    /// # Returns
    ///
    /// Number of entries that were indexed
    pub fn invalidate_all(&self) -> usize {
        let generation = next_generation();
        self.flushed_at.fetch_max(generation, Ordering::SeqCst);
        self.floor.fetch_max(generation, Ordering::SeqCst);

        let removed = self.key_tags.len();
        self.key_tags.clear();
        self.tag_index.clear();
        self.valid_since.clear();

        for listener in self.live_listeners() {
            listener.evict_all();
        }

        tracing::info!(removed, generation, "flushed all cache entries");
        removed
    }

    /// Returns true if content stamped with `generation` and depending on
    /// `tags` has not been invalidated since.
    ///
    /// Conservative: a tag that is not indexed counts as invalidated by the
    /// latest invalidation of any unindexed tag.
    pub fn is_current<I, S>(&self, tags: I, generation: u64) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.flushed_at.load(Ordering::SeqCst) > generation {
            return false;
        }
        tags.into_iter().all(|tag| {
            let since = match self.valid_since.get(tag.as_ref()) {
                Some(since) => *since,
                None => self.floor.load(Ordering::SeqCst),
            };
            since <= generation
        })
    }

    /// Get all entry keys indexed under a tag, sorted
    pub fn entries_for_tag(&self, tag: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .tag_index
            .get(tag)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Get the tags an entry is indexed under
    pub fn tags_for_entry(&self, entry_key: &str) -> BTreeSet<String> {
        self.key_tags
            .get(entry_key)
            .map(|tags| tags.clone())
            .unwrap_or_default()
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.key_tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_tags.is_empty()
    }

    fn drop_from_tag_sets(&self, entry_key: &str, tags: &BTreeSet<String>) {
        for tag in tags {
            let now_empty = match self.tag_index.get_mut(tag) {
                Some(mut set) => {
                    set.remove(entry_key);
                    set.is_empty()
                }
                None => false,
            };
            if now_empty && self.tag_index.remove_if(tag, |_, set| set.is_empty()).is_some() {
                // Recorded values never exceed the floor, so forgetting one is safe
                self.valid_since.remove(tag);
            }
        }
    }

    fn live_listeners(&self) -> Vec<Arc<dyn InvalidationListener>> {
        self.listeners
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InvalidationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationBus")
            .field("entries", &self.key_tags.len())
            .field("tags", &self.tag_index.len())
            .field("floor", &self.floor.load(Ordering::Relaxed))
            .finish()
    }
}

/// Invalidate every entry carrying `tag` on the global bus
///
/// # Example
///
/// ```ignore
/// use cacheit_core::invalidate_tag;
///
/// // Called from the persistence layer after a node was inserted
/// let count = invalidate_tag("cacheit_recent_content");
/// println!("Invalidated {} entries", count);
/// ```
pub fn invalidate_tag(tag: &str) -> usize {
    InvalidationBus::global().invalidate_tag(tag)
}

/// Invalidate every entry carrying any of `tags` on the global bus
pub fn invalidate_tags<I, S>(tags: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    InvalidationBus::global().invalidate_tags(tags)
}

/// Flush the global bus
pub fn invalidate_all() -> usize {
    InvalidationBus::global().invalidate_all()
}
