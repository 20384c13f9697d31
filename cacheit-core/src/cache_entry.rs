use std::time::{Duration, Instant};

use crate::metadata::{CacheMetadata, MaxAge};

/// A stored composite together with the metadata that governs its lifetime.
///
/// # Type Parameters
///
/// * `V` - The type of the cached value
///
/// # Fields
///
/// * `key` - The derived entry key (bin, view key and context values)
/// * `metadata` - Merged metadata of every cacheable fragment
/// * `value` - The cached value
/// * `created_at` - When computation of this entry began, per the cache's clock
/// * `generation` - Invalidation generation the content was computed at; the
///   entry is stale once any of its tags is invalidated after it
///
/// # Examples
///
/// ```
/// use cacheit_core::{CacheEntry, CacheMetadata, MaxAge};
/// use std::time::{Duration, Instant};
///
/// let now = Instant::now();
/// let meta = CacheMetadata::new().with_max_age(MaxAge::Seconds(60));
/// let entry = CacheEntry::new("render:ad", meta, "teaser", now, 0);
///
/// assert!(!entry.is_expired_at(now + Duration::from_secs(59), None));
/// assert!(entry.is_expired_at(now + Duration::from_secs(60), None));
/// ```
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub metadata: CacheMetadata,
    pub value: V,
    pub created_at: Instant,
    pub generation: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(
        key: impl Into<String>,
        metadata: CacheMetadata,
        value: V,
        created_at: Instant,
        generation: u64,
    ) -> Self {
        Self {
            key: key.into(),
            metadata,
            value,
            created_at,
            generation,
        }
    }

    /// The lifetime actually applied: the entry's max-age, capped by `ceiling`.
    pub fn effective_max_age(&self, ceiling: Option<Duration>) -> Option<Duration> {
        match (self.metadata.max_age().as_duration(), ceiling) {
            (Some(own), Some(cap)) => Some(own.min(cap)),
            (Some(own), None) => Some(own),
            (None, cap) => cap,
        }
    }

    /// Returns true once `now - created_at` reaches the effective max-age.
    ///
    /// Permanent entries without a ceiling never expire. An entry whose
    /// max-age is zero is always expired.
    pub fn is_expired_at(&self, now: Instant, ceiling: Option<Duration>) -> bool {
        match self.effective_max_age(ceiling) {
            Some(max_age) => now.saturating_duration_since(self.created_at) >= max_age,
            None => false,
        }
    }

    pub fn max_age(&self) -> MaxAge {
        self.metadata.max_age()
    }
}
