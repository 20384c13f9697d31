//! Fragments: named pieces of derived content with their cache metadata.
//!
//! A [`Fragment`] is computed once and carries the merged metadata of every
//! source it was built from. A [`PlaceholderFragment`] is too volatile to be
//! cached with its parent: it is recomputed on every delivery and spliced
//! into the otherwise cached composite.

use std::collections::HashMap;
use std::fmt;

use crate::error::{BoxError, CacheError, CacheResult};
use crate::invalidation::current_generation;
use crate::metadata::CacheMetadata;
use crate::source::{collect_metadata, metadata_or_uncacheable, CacheableSource};

/// A named piece of content plus the metadata of everything it depends on.
///
/// A fragment also remembers the invalidation generation it was computed at.
/// A composite cache refuses to serve a fragment whose tags were invalidated
/// after that point, even when the invalidation fired before the fragment
/// reached the cache.
///
/// # Examples
///
/// ```
/// use cacheit_core::{CacheMetadata, CacheableSource, Fragment, MaxAge};
///
/// let node_5 = CacheMetadata::new().with_tags(["node:5"]);
/// let node_7 = CacheMetadata::new().with_tags(["node:7"]);
/// let sources: [&dyn CacheableSource; 2] = [&node_5, &node_7];
///
/// let fragment = Fragment::compute("recent_content", &sources, || {
///     Ok::<_, std::io::Error>(vec!["Five", "Seven"])
/// })
/// .unwrap();
///
/// assert_eq!(fragment.content().len(), 2);
/// assert!(fragment.metadata().has_tag("node:7"));
/// assert_eq!(fragment.metadata().max_age(), MaxAge::Permanent);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment<T> {
    name: String,
    content: T,
    metadata: CacheMetadata,
    generation: u64,
}

impl<T> Fragment<T> {
    /// Wrap content computed by the caller, stamped with the current
    /// generation. Use [`with_generation`](Self::with_generation) when the
    /// data was read earlier.
    pub fn new(name: impl Into<String>, content: T, metadata: CacheMetadata) -> Self {
        Self {
            name: name.into(),
            content,
            metadata,
            generation: current_generation(),
        }
    }

    /// Run `compute`, then fold the metadata of every source.
    ///
    /// A source that cannot report its metadata makes the fragment
    /// uncacheable instead of failing it.
    ///
    /// # Errors
    ///
    /// `CacheError::ComputeFailure` if `compute` fails. No fragment is built.
    pub fn compute<F, E>(
        name: impl Into<String>,
        sources: &[&dyn CacheableSource],
        compute: F,
    ) -> CacheResult<Self>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxError>,
    {
        let name = name.into();
        let generation = current_generation();
        let content = compute().map_err(|e| CacheError::compute_failure(name.clone(), e))?;
        let metadata = collect_metadata(sources.iter().copied());
        Ok(Self {
            name,
            content,
            metadata,
            generation,
        })
    }

    /// Stamp the fragment with a generation taken before its data was read.
    ///
    /// Only ever moves the stamp back.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = self.generation.min(generation);
        self
    }

    /// Merge the metadata of one more source into this fragment.
    pub fn add_cacheable_dependency(mut self, source: &dyn CacheableSource) -> Self {
        self.metadata = self.metadata.merge(&metadata_or_uncacheable(source));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &T {
        &self.content
    }

    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    /// Invalidation generation the content was computed at
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn into_content(self) -> T {
        self.content
    }
}

/// Free-function form of [`Fragment::compute`].
pub fn compute_fragment<T, F, E>(
    name: impl Into<String>,
    sources: &[&dyn CacheableSource],
    compute: F,
) -> CacheResult<Fragment<T>>
where
    F: FnOnce() -> Result<T, E>,
    E: Into<BoxError>,
{
    Fragment::compute(name, sources, compute)
}

type DeferredFn<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// A fragment computed fresh on every delivery.
///
/// It contributes nothing to the composite's metadata; the composite stores a
/// marker in its place and calls [`render`](Self::render) each time.
pub struct PlaceholderFragment<T> {
    name: String,
    compute: DeferredFn<T>,
}

impl<T> PlaceholderFragment<T> {
    pub fn new<F, E>(name: impl Into<String>, compute_at_render_time: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            name: name.into(),
            compute: Box::new(move || compute_at_render_time().map_err(Into::into)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// # Errors
    ///
    /// `CacheError::ComputeFailure` if the deferred computation fails.
    pub fn render(&self) -> CacheResult<T> {
        (self.compute)().map_err(|e| CacheError::compute_failure(self.name.clone(), e))
    }
}

impl<T> fmt::Debug for PlaceholderFragment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderFragment")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Free-function form of [`PlaceholderFragment::new`].
pub fn mark_deferred<T, F, E>(name: impl Into<String>, compute_at_render_time: F) -> PlaceholderFragment<T>
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    PlaceholderFragment::new(name, compute_at_render_time)
}

/// One positional part of a composite view.
#[derive(Debug)]
pub enum Part<T> {
    Fragment(Fragment<T>),
    Placeholder(PlaceholderFragment<T>),
}

impl<T> From<Fragment<T>> for Part<T> {
    fn from(fragment: Fragment<T>) -> Self {
        Part::Fragment(fragment)
    }
}

impl<T> From<PlaceholderFragment<T>> for Part<T> {
    fn from(placeholder: PlaceholderFragment<T>) -> Self {
        Part::Placeholder(placeholder)
    }
}

/// What a stored composite holds at each position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Content(T),
    /// Filled by the named placeholder on every delivery.
    Placeholder(String),
}

/// Replace every placeholder marker with a fresh render.
///
/// # Errors
///
/// * `CacheError::MissingPlaceholder` - a marker has no matching placeholder
/// * `CacheError::ComputeFailure` - a placeholder failed to render
pub fn splice<T>(
    slots: Vec<Slot<T>>,
    placeholders: &HashMap<String, PlaceholderFragment<T>>,
) -> CacheResult<Vec<T>> {
    slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Content(content) => Ok(content),
            Slot::Placeholder(name) => placeholders
                .get(&name)
                .ok_or(CacheError::MissingPlaceholder(name))?
                .render(),
        })
        .collect()
}
