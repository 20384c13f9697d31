//! # Cacheit
//!
//! Cache metadata for views composed from several independently changing
//! data sources: which tags invalidate them, which request contexts they vary
//! by and how long they may be served.
//!
//! ## Features
//!
//! - **Metadata algebra**: tags and contexts union, max-age takes the minimum
//! - **Declarative sources**: `#[cacheable]` derives `CacheableSource` for a struct
//! - **Composite cache**: context-aware keys, lazy TTL checks, pluggable storage
//! - **Placeholders**: live parts recomputed on every delivery of a cached view
//! - **Tag invalidation**: evict every view built from a record when it changes
//!
//! ## Quick Start
//!
//! Describe what a record's cacheability depends on:
//!
//! ```rust
//! use cacheit::{cacheable, CacheableSource, MaxAge};
//!
//! #[cacheable(tags = ["node:{id}"], max_age = 3600)]
//! struct Node {
//!     id: u64,
//!     title: String,
//! }
//!
//! let node = Node { id: 2, title: "Conditions".to_string() };
//! let meta = node.cache_metadata().unwrap();
//! assert!(meta.has_tag("node:2"));
//! assert_eq!(meta.max_age(), MaxAge::Seconds(3600));
//! ```
//!
//! ## Composing a View
//!
//! Lazy fragments name their sources up front; on a hit they never run.
//! Placeholders run on every call:
//!
//! ```rust
//! use cacheit::{CacheMetadata, CacheStatus, CompositeCache, InvalidationBus, View};
//! use std::sync::Arc;
//!
//! let bus = Arc::new(InvalidationBus::new());
//! let cache: CompositeCache<String> = CompositeCache::builder()
//!     .bus(Arc::clone(&bus))
//!     .build()
//!     .unwrap();
//!
//! let ad = CacheMetadata::new().with_tags(["node:12"]);
//! let view = || {
//!     View::new("ad_block")
//!         .lazy("teaser", &[&ad], || Ok::<_, std::io::Error>("Big sale".to_string()))
//!         .placeholder("validity", || Ok::<_, std::io::Error>("still valid".to_string()))
//! };
//!
//! let first = cache.resolve_view(view()).unwrap();
//! assert_eq!(first.status, CacheStatus::Miss);
//! assert_eq!(first.value, vec!["Big sale".to_string(), "still valid".to_string()]);
//!
//! assert!(cache.resolve_view(view()).unwrap().is_hit());
//! ```
//!
//! ## Invalidation
//!
//! The persistence layer fires tags when records change:
//!
//! ```rust
//! use cacheit::InvalidationBus;
//!
//! let bus = InvalidationBus::new();
//! bus.register("render:recent_content", ["node:5", "cacheit_recent_content"]).unwrap();
//!
//! // A node was inserted: every list of recent content is stale.
//! assert_eq!(bus.invalidate_tag("cacheit_recent_content"), 1);
//! ```
//!
//! The global bus is reachable through [`invalidate_tag`], [`invalidate_tags`]
//! and [`invalidate_all`].

pub use cacheit_core::*;
pub use cacheit_macros::cacheable;
