//! Data sources that can describe their own cacheability.

use std::sync::Arc;

use crate::error::SourceUnavailable;
use crate::metadata::CacheMetadata;

/// A data provider that can report a [`CacheMetadata`] snapshot of itself.
///
/// Implementations must be pure reads: calling `cache_metadata` twice without
/// the underlying record changing returns the same value.
///
/// # Examples
///
/// ```
/// use cacheit_core::{CacheMetadata, CacheableSource, MaxAge, SourceUnavailable};
///
/// struct Node {
///     id: u64,
/// }
///
/// impl CacheableSource for Node {
///     fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable> {
///         Ok(CacheMetadata::new().with_tags([format!("node:{}", self.id)]))
///     }
/// }
///
/// let meta = Node { id: 5 }.cache_metadata().unwrap();
/// assert!(meta.has_tag("node:5"));
/// assert_eq!(meta.max_age(), MaxAge::Permanent);
/// ```
pub trait CacheableSource {
    fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable>;
}

impl CacheableSource for CacheMetadata {
    fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable> {
        Ok(self.clone())
    }
}

impl<T: CacheableSource + ?Sized> CacheableSource for &T {
    fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable> {
        (**self).cache_metadata()
    }
}

impl<T: CacheableSource + ?Sized> CacheableSource for Box<T> {
    fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable> {
        (**self).cache_metadata()
    }
}

impl<T: CacheableSource + ?Sized> CacheableSource for Arc<T> {
    fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable> {
        (**self).cache_metadata()
    }
}

/// A record that could not be loaded reports itself as unavailable.
impl<T: CacheableSource> CacheableSource for Option<T> {
    fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable> {
        match self {
            Some(source) => source.cache_metadata(),
            None => Err(SourceUnavailable::new(
                std::any::type_name::<T>(),
                "record not loaded",
            )),
        }
    }
}

/// Metadata of a source, with unavailability downgraded to "never cache".
pub fn metadata_or_uncacheable<S: CacheableSource + ?Sized>(source: &S) -> CacheMetadata {
    match source.cache_metadata() {
        Ok(metadata) => metadata,
        Err(err) => {
            tracing::warn!(
                source_id = %err.source_id,
                reason = %err.reason,
                "cache metadata unavailable, treating as uncacheable"
            );
            CacheMetadata::uncacheable()
        }
    }
}

/// Fold the metadata of every source, starting from the identity.
pub fn collect_metadata<'a, I>(sources: I) -> CacheMetadata
where
    I: IntoIterator<Item = &'a dyn CacheableSource>,
{
    sources
        .into_iter()
        .fold(CacheMetadata::new(), |acc, source| {
            acc.merge(&metadata_or_uncacheable(source))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MaxAge;

    struct Missing;

    impl CacheableSource for Missing {
        fn cache_metadata(&self) -> Result<CacheMetadata, SourceUnavailable> {
            Err(SourceUnavailable::new("node:9", "deleted"))
        }
    }

    #[test]
    fn test_option_none_is_unavailable() {
        let source: Option<CacheMetadata> = None;
        assert!(source.cache_metadata().is_err());
        assert!(metadata_or_uncacheable(&source).is_uncacheable());
    }

    #[test]
    fn test_collect_metadata_degrades_on_missing_source() {
        let a = CacheMetadata::new().with_tags(["node:1"]);
        let b = CacheMetadata::new().with_max_age(MaxAge::Seconds(60));
        let sources: [&dyn CacheableSource; 3] = [&a, &Missing, &b];

        let merged = collect_metadata(sources);
        assert!(merged.is_uncacheable());
        assert!(merged.has_tag("node:1"));
    }

    #[test]
    fn test_collect_metadata_through_smart_pointers() {
        let boxed: Box<dyn CacheableSource> =
            Box::new(CacheMetadata::new().with_tags(["node:3"]));
        let shared = Arc::new(CacheMetadata::new().with_contexts(["languages"]));
        let sources: [&dyn CacheableSource; 2] = [&boxed, &shared];

        let merged = collect_metadata(sources);
        assert!(merged.has_tag("node:3"));
        assert!(merged.has_context("languages"));
        assert_eq!(merged.max_age(), MaxAge::Permanent);
    }
}
