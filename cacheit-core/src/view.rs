//! Composite views described before anything is computed.
//!
//! A [`View`] lists its parts in output order. Lazy fragments name their
//! sources up front, so the composite cache can work out the entry key from
//! source metadata alone and skip the computation on a hit.

use std::fmt;

use crate::error::{BoxError, CacheError, CacheResult};
use crate::fragment::{Fragment, Part, PlaceholderFragment};
use crate::metadata::CacheMetadata;
use crate::source::{collect_metadata, CacheableSource};

type LazyFn<'a, T> = Box<dyn FnOnce() -> Result<T, BoxError> + 'a>;

/// A fragment whose content is only computed on a cache miss.
pub struct LazyFragment<'a, T> {
    name: String,
    sources: Vec<&'a dyn CacheableSource>,
    extra: CacheMetadata,
    compute: LazyFn<'a, T>,
}

impl<'a, T> LazyFragment<'a, T> {
    pub fn new<F, E>(
        name: impl Into<String>,
        sources: &[&'a dyn CacheableSource],
        compute: F,
    ) -> Self
    where
        F: FnOnce() -> Result<T, E> + 'a,
        E: Into<BoxError>,
    {
        Self {
            name: name.into(),
            sources: sources.to_vec(),
            extra: CacheMetadata::new(),
            compute: Box::new(move || compute().map_err(Into::into)),
        }
    }

    /// Metadata the fragment adds on top of its sources.
    pub fn with_metadata(mut self, metadata: CacheMetadata) -> Self {
        self.extra = self.extra.merge(&metadata);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metadata of the sources, read without computing the content.
    pub fn metadata(&self) -> CacheMetadata {
        collect_metadata(self.sources.iter().copied()).merge(&self.extra)
    }

    pub(crate) fn run(self) -> CacheResult<T> {
        let name = self.name;
        (self.compute)().map_err(|e| CacheError::compute_failure(name, e))
    }
}

impl<T> fmt::Debug for LazyFragment<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFragment")
            .field("name", &self.name)
            .field("sources", &self.sources.len())
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) enum ViewPart<'a, T> {
    Ready(Fragment<T>),
    Lazy(LazyFragment<'a, T>),
    Deferred(PlaceholderFragment<T>),
}

/// An ordered description of a composite.
///
/// # Examples
///
/// ```
/// use cacheit_core::{CacheMetadata, MaxAge, View};
///
/// let ad = CacheMetadata::new().with_tags(["node:12"]);
/// let view: View<'_, String> = View::new("ad_block")
///     .lazy("teaser", &[&ad], || Ok::<_, std::io::Error>("Big sale".to_string()))
///     .placeholder("validity", || Ok::<_, std::io::Error>("00:10:00".to_string()));
///
/// assert_eq!(view.len(), 2);
/// assert!(view.declared_metadata().has_tag("node:12"));
/// assert_eq!(view.declared_metadata().max_age(), MaxAge::Permanent);
/// ```
#[derive(Debug)]
pub struct View<'a, T> {
    key: String,
    parts: Vec<ViewPart<'a, T>>,
}

impl<'a, T> View<'a, T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            parts: Vec::new(),
        }
    }

    /// A view over already computed parts.
    pub fn from_parts<I>(key: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = Part<T>>,
    {
        parts.into_iter().fold(Self::new(key), View::part)
    }

    pub fn part(mut self, part: Part<T>) -> Self {
        self.parts.push(match part {
            Part::Fragment(fragment) => ViewPart::Ready(fragment),
            Part::Placeholder(placeholder) => ViewPart::Deferred(placeholder),
        });
        self
    }

    pub fn fragment(mut self, fragment: Fragment<T>) -> Self {
        self.parts.push(ViewPart::Ready(fragment));
        self
    }

    pub fn lazy<F, E>(
        mut self,
        name: impl Into<String>,
        sources: &[&'a dyn CacheableSource],
        compute: F,
    ) -> Self
    where
        F: FnOnce() -> Result<T, E> + 'a,
        E: Into<BoxError>,
    {
        self.parts
            .push(ViewPart::Lazy(LazyFragment::new(name, sources, compute)));
        self
    }

    pub fn lazy_fragment(mut self, fragment: LazyFragment<'a, T>) -> Self {
        self.parts.push(ViewPart::Lazy(fragment));
        self
    }

    pub fn placeholder<F, E>(mut self, name: impl Into<String>, compute_at_render_time: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.parts.push(ViewPart::Deferred(PlaceholderFragment::new(
            name,
            compute_at_render_time,
        )));
        self
    }

    pub fn deferred(mut self, placeholder: PlaceholderFragment<T>) -> Self {
        self.parts.push(ViewPart::Deferred(placeholder));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Fold of every cacheable part's metadata. Placeholders are left out.
    pub fn declared_metadata(&self) -> CacheMetadata {
        self.parts
            .iter()
            .fold(CacheMetadata::new(), |acc, part| match part {
                ViewPart::Ready(fragment) => acc.merge(fragment.metadata()),
                ViewPart::Lazy(lazy) => acc.merge(&lazy.metadata()),
                ViewPart::Deferred(_) => acc,
            })
    }

    pub(crate) fn into_parts(self) -> (String, Vec<ViewPart<'a, T>>) {
        (self.key, self.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::mark_deferred;
    use crate::metadata::MaxAge;

    #[test]
    fn test_declared_metadata_skips_placeholders() {
        let view: View<'_, u32> = View::new("v")
            .fragment(Fragment::new(
                "a",
                1,
                CacheMetadata::new().with_max_age(MaxAge::Seconds(30)),
            ))
            .deferred(mark_deferred("live", || Ok::<_, BoxError>(2)));

        assert_eq!(view.declared_metadata().max_age(), MaxAge::Seconds(30));
    }

    #[test]
    fn test_lazy_metadata_does_not_compute() {
        let source = CacheMetadata::new().with_tags(["node:1"]);
        let lazy = LazyFragment::new("list", &[&source], || -> Result<u32, BoxError> {
            panic!("must not run")
        })
        .with_metadata(CacheMetadata::new().with_tags(["cacheit_recent_content"]));

        let meta = lazy.metadata();
        assert!(meta.has_tag("node:1"));
        assert!(meta.has_tag("cacheit_recent_content"));
    }

    #[test]
    fn test_from_parts_keeps_order() {
        let parts = vec![
            Part::from(Fragment::new("a", 1, CacheMetadata::new())),
            Part::from(mark_deferred("b", || Ok::<_, BoxError>(2))),
            Part::from(Fragment::new("c", 3, CacheMetadata::new())),
        ];
        let view = View::from_parts("v", parts);
        let (_, parts) = view.into_parts();
        assert!(matches!(parts[0], ViewPart::Ready(_)));
        assert!(matches!(parts[1], ViewPart::Deferred(_)));
        assert!(matches!(parts[2], ViewPart::Ready(_)));
    }

    #[test]
    fn test_lazy_failure_is_compute_failure() {
        let lazy = LazyFragment::new("broken", &[], || Err::<u8, _>("boom"));
        assert!(lazy.run().unwrap_err().is_compute_failure());
    }
}
