//! # Cacheit Core
//!
//! Core types for composing cacheable views out of independently changing
//! data sources.
//!
//! Every piece of derived output carries a [`CacheMetadata`]: the cache tags
//! that invalidate it, the contexts it varies by and how long it may live.
//! Metadata merges as a commutative, associative algebra, so a view built
//! from many fragments gets the union of their tags and contexts and the
//! shortest of their lifetimes.
//!
//! ## Features
//!
//! - **Metadata Algebra**: `merge` with a permanent identity and an absorbing zero max-age
//! - **Cacheable Sources**: Any type can report its metadata through [`CacheableSource`]
//! - **Fragments & Placeholders**: Cacheable parts plus parts recomputed on every delivery
//! - **Composite Cache**: Context-aware keys, lazy TTL checks, pluggable backends
//! - **Tag Invalidation**: A sharded tag index with listener-based eviction
//! - **Statistics**: Hit/miss counters per cache bin (`stats` feature)
//!
//! ## Module Organization
//!
//! - [`metadata`] - `MaxAge`, `CacheMetadata` and the merge rule
//! - [`fragment`] - Fragments, placeholders and slot splicing
//! - [`view`] - Views over lazily computed fragments
//! - [`composite`] - The composite cache itself
//! - [`invalidation`] - The tag index and its global instance
//! - [`keys`] - Entry key derivation and tag validation
//! - [`backend`] - Storage seam and the in-memory backend
//!
mod cache_entry;
mod clock;
mod config;
mod context;
mod error;
mod source;

pub mod backend;
pub mod composite;
pub mod fragment;
pub mod invalidation;
pub mod keys;
pub mod metadata;
pub mod view;

#[cfg(feature = "stats")]
mod stats;

#[cfg(feature = "stats")]
pub mod stats_registry;

pub use backend::{CacheBackend, MemoryBackend};
pub use cache_entry::CacheEntry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use composite::{CacheStatus, CompositeCache, CompositeCacheBuilder, Resolved};
pub use crate::config::{CacheConfig, ENV_PREFIX};
pub use context::{resolve_contexts, ContextResolver, ContextValues, FnContexts, ResolvedContexts};
pub use error::{BoxError, CacheError, CacheResult, SourceUnavailable};
pub use fragment::{compute_fragment, mark_deferred, splice, Fragment, Part, PlaceholderFragment, Slot};
pub use invalidation::{
    current_generation, invalidate_all, invalidate_tag, invalidate_tags, InvalidationBus,
    InvalidationListener,
};
pub use metadata::{is_uncacheable, merge, CacheMetadata, MaxAge};
pub use source::{collect_metadata, metadata_or_uncacheable, CacheableSource};
pub use view::{LazyFragment, View};

#[cfg(feature = "stats")]
pub use stats::CacheStats;
