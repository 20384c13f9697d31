//! # Cache Metadata
//!
//! The value every cacheable piece of output carries: which tags invalidate it,
//! which request contexts it varies by and how long it may be served.
//!
//! Metadata from several sources is combined with [`CacheMetadata::merge`].
//! Merging is a join on a semilattice:
//!
//! - tags and contexts are unioned
//! - max-age takes the minimum, with [`MaxAge::Permanent`] as the top element
//!   and `MaxAge::Seconds(0)` absorbing everything
//!
//! so the order in which fragments are folded never changes the result.
//!
//! # Examples
//!
//! ```
//! use cacheit_core::{CacheMetadata, MaxAge};
//!
//! let list = CacheMetadata::new().with_tags(["node:5"]);
//! let link = CacheMetadata::new()
//!     .with_tags(["node:7"])
//!     .with_max_age(MaxAge::Seconds(3600));
//!
//! let merged = list.merge(&link);
//! assert!(merged.has_tag("node:5") && merged.has_tag("node:7"));
//! assert_eq!(merged.max_age(), MaxAge::Seconds(3600));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::error::CacheError;

/// Upper bound on how long an entry may be served.
///
/// Variant order matters: every `Seconds(n)` compares lower than `Permanent`,
/// so `min` implements the merge rule directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum MaxAge {
    /// Served for at most this many seconds. `Seconds(0)` means never cached.
    Seconds(u64),
    /// No time bound; only tag invalidation evicts the entry.
    Permanent,
}

impl MaxAge {
    /// Never cache.
    pub const UNCACHEABLE: MaxAge = MaxAge::Seconds(0);

    /// Wire value for [`MaxAge::Permanent`].
    pub const PERMANENT_RAW: i64 = -1;

    /// Parse the integer form (`-1` permanent, `0` uncacheable, `n` seconds).
    pub fn from_seconds(seconds: i64) -> Result<Self, CacheError> {
        match seconds {
            Self::PERMANENT_RAW => Ok(MaxAge::Permanent),
            n if n >= 0 => Ok(MaxAge::Seconds(n as u64)),
            n => Err(CacheError::InvalidMaxAge(n)),
        }
    }

    /// Integer form of this max-age.
    pub fn as_seconds(&self) -> i64 {
        match self {
            MaxAge::Permanent => Self::PERMANENT_RAW,
            MaxAge::Seconds(n) => i64::try_from(*n).unwrap_or(i64::MAX),
        }
    }

    /// `None` for permanent entries.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            MaxAge::Permanent => None,
            MaxAge::Seconds(n) => Some(Duration::from_secs(*n)),
        }
    }

    pub fn is_uncacheable(&self) -> bool {
        *self == Self::UNCACHEABLE
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, MaxAge::Permanent)
    }
}

impl Default for MaxAge {
    fn default() -> Self {
        MaxAge::Permanent
    }
}

impl TryFrom<i64> for MaxAge {
    type Error = CacheError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        MaxAge::from_seconds(value)
    }
}

impl From<MaxAge> for i64 {
    fn from(value: MaxAge) -> Self {
        value.as_seconds()
    }
}

impl From<Duration> for MaxAge {
    fn from(value: Duration) -> Self {
        MaxAge::Seconds(value.as_secs())
    }
}

impl fmt::Display for MaxAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxAge::Permanent => f.write_str("permanent"),
            MaxAge::Seconds(n) => write!(f, "{}s", n),
        }
    }
}

/// Tags, contexts and max-age of a piece of output.
///
/// Immutable once built: the `with_*` builders consume `self` and
/// [`merge`](Self::merge) returns a fresh value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheMetadata {
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    contexts: BTreeSet<String>,
    #[serde(default, rename = "max-age")]
    max_age: MaxAge,
}

impl CacheMetadata {
    /// The identity element: no tags, no contexts, permanent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata that forbids caching whatever carries it.
    pub fn uncacheable() -> Self {
        Self::new().with_max_age(MaxAge::UNCACHEABLE)
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn add_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts.extend(contexts.into_iter().map(Into::into));
        self
    }

    /// Replaces the max-age. Use [`merge`](Self::merge) to only ever lower it.
    pub fn with_max_age(mut self, max_age: MaxAge) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn contexts(&self) -> &BTreeSet<String> {
        &self.contexts
    }

    pub fn max_age(&self) -> MaxAge {
        self.max_age
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.contexts.contains(context)
    }

    /// True iff max-age is zero.
    pub fn is_uncacheable(&self) -> bool {
        self.max_age.is_uncacheable()
    }

    /// Union of tags and contexts, minimum of max-ages.
    pub fn merge(&self, other: &CacheMetadata) -> CacheMetadata {
        CacheMetadata {
            tags: self.tags.union(&other.tags).cloned().collect(),
            contexts: self.contexts.union(&other.contexts).cloned().collect(),
            max_age: self.max_age.min(other.max_age),
        }
    }

    /// Fold any number of metadata values, starting from the identity.
    pub fn merge_all<'a, I>(items: I) -> CacheMetadata
    where
        I: IntoIterator<Item = &'a CacheMetadata>,
    {
        items
            .into_iter()
            .fold(CacheMetadata::new(), |acc, m| acc.merge(m))
    }
}

/// Free-function form of [`CacheMetadata::merge`].
pub fn merge(a: &CacheMetadata, b: &CacheMetadata) -> CacheMetadata {
    a.merge(b)
}

/// Free-function form of [`CacheMetadata::is_uncacheable`].
pub fn is_uncacheable(m: &CacheMetadata) -> bool {
    m.is_uncacheable()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_age_ordering() {
        assert!(MaxAge::Seconds(0) < MaxAge::Seconds(1));
        assert!(MaxAge::Seconds(u64::MAX) < MaxAge::Permanent);
        assert_eq!(MaxAge::Permanent.min(MaxAge::Seconds(3600)), MaxAge::Seconds(3600));
        assert!(MaxAge::default().is_permanent());
        assert!(!MaxAge::Seconds(3600).is_permanent());
    }

    #[test]
    fn test_max_age_from_duration_truncates() {
        assert_eq!(MaxAge::from(Duration::from_millis(2500)), MaxAge::Seconds(2));
        assert!(MaxAge::from(Duration::from_millis(999)).is_uncacheable());
    }

    #[test]
    fn test_max_age_from_seconds() {
        assert_eq!(MaxAge::from_seconds(-1).unwrap(), MaxAge::Permanent);
        assert_eq!(MaxAge::from_seconds(0).unwrap(), MaxAge::UNCACHEABLE);
        assert_eq!(MaxAge::from_seconds(3600).unwrap(), MaxAge::Seconds(3600));
        assert!(matches!(
            MaxAge::from_seconds(-5),
            Err(CacheError::InvalidMaxAge(-5))
        ));
    }

    #[test]
    fn test_scenario_tagged_list_and_timed_link() {
        let a = CacheMetadata::new().with_tags(["node:5"]);
        let b = CacheMetadata::new()
            .with_tags(["node:7"])
            .with_max_age(MaxAge::Seconds(3600));

        let merged = merge(&a, &b);
        assert_eq!(
            merged.tags().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["node:5", "node:7"]
        );
        assert_eq!(merged.max_age(), MaxAge::Seconds(3600));
    }

    #[test]
    fn test_zero_absorbs() {
        let a = CacheMetadata::new().with_tags(["x"]);
        let merged = a.merge(&CacheMetadata::uncacheable());
        assert!(is_uncacheable(&merged));
        assert!(merged.has_tag("x"));
    }

    #[test]
    fn test_merge_all_of_nothing_is_identity() {
        let merged = CacheMetadata::merge_all(std::iter::empty());
        assert_eq!(merged, CacheMetadata::new());
        assert_eq!(merged.max_age(), MaxAge::Permanent);
        assert!(merged.tags().is_empty());
    }

    #[test]
    fn test_serde_uses_integer_max_age() {
        let m = CacheMetadata::new()
            .with_tags(["node:2"])
            .with_contexts(["languages"])
            .with_max_age(MaxAge::Seconds(3600));
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"max-age\":3600"));

        let permanent: CacheMetadata = serde_json::from_str(r#"{"max-age":-1}"#).unwrap();
        assert_eq!(permanent, CacheMetadata::new());

        let invalid = serde_json::from_str::<CacheMetadata>(r#"{"max-age":-7}"#);
        assert!(invalid.is_err());
    }
}
