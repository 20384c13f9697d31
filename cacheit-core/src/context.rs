//! Cache contexts and how the host answers them.
//!
//! A context name such as `languages` or `user.roles` only says *that* output
//! varies; the key needs *how*. A [`ContextResolver`] turns each declared
//! context into its value for the current request.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Resolves context names to their value for the current request.
pub trait ContextResolver: Send + Sync {
    /// `None` when the context is unknown to the host.
    fn resolve(&self, context: &str) -> Option<String>;
}

impl ContextResolver for HashMap<String, String> {
    fn resolve(&self, context: &str) -> Option<String> {
        self.get(context).cloned()
    }
}

impl ContextResolver for BTreeMap<String, String> {
    fn resolve(&self, context: &str) -> Option<String> {
        self.get(context).cloned()
    }
}

/// Fixed set of context values.
///
/// # Examples
///
/// ```
/// use cacheit_core::{ContextResolver, ContextValues};
///
/// let contexts = ContextValues::new()
///     .with("languages", "en")
///     .with("theme", "olivero");
/// assert_eq!(contexts.resolve("languages").as_deref(), Some("en"));
/// assert_eq!(contexts.resolve("user"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextValues {
    values: BTreeMap<String, String>,
}

impl ContextValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, context: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(context.into(), value.into());
        self
    }

    pub fn set(&mut self, context: impl Into<String>, value: impl Into<String>) {
        self.values.insert(context.into(), value.into());
    }
}

impl ContextResolver for ContextValues {
    fn resolve(&self, context: &str) -> Option<String> {
        self.values.get(context).cloned()
    }
}

/// Adapter for closures.
pub struct FnContexts<F>(pub F);

impl<F> ContextResolver for FnContexts<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, context: &str) -> Option<String> {
        (self.0)(context)
    }
}

impl<F> fmt::Debug for FnContexts<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnContexts")
    }
}

/// Outcome of resolving every context of a composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedContexts {
    /// Every context had a value.
    Complete(BTreeMap<String, String>),
    /// These contexts had no value; the composite cannot be keyed.
    Unresolved(Vec<String>),
}

/// Resolve every context, reporting the ones the host could not answer.
pub fn resolve_contexts(
    resolver: &dyn ContextResolver,
    contexts: &BTreeSet<String>,
) -> ResolvedContexts {
    let mut values = BTreeMap::new();
    let mut missing = Vec::new();

    for context in contexts {
        match resolver.resolve(context) {
            Some(value) => {
                values.insert(context.clone(), value);
            }
            None => missing.push(context.clone()),
        }
    }

    if missing.is_empty() {
        ResolvedContexts::Complete(values)
    } else {
        ResolvedContexts::Unresolved(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_contexts_complete() {
        let resolver = ContextValues::new().with("languages", "fr").with("theme", "claro");
        let contexts: BTreeSet<String> = ["languages".to_string()].into_iter().collect();

        match resolve_contexts(&resolver, &contexts) {
            ResolvedContexts::Complete(values) => {
                assert_eq!(values.len(), 1);
                assert_eq!(values["languages"], "fr");
            }
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_contexts_reports_missing() {
        let resolver = FnContexts(|ctx: &str| (ctx == "languages").then(|| "en".to_string()));
        let contexts: BTreeSet<String> = ["languages", "user.roles"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            resolve_contexts(&resolver, &contexts),
            ResolvedContexts::Unresolved(vec!["user.roles".to_string()])
        );
    }

    #[test]
    fn test_set_overwrites_value() {
        let mut values = ContextValues::new().with("languages", "en");
        values.set("languages", "fr");
        values.set("theme", "olivero");
        assert_eq!(values.resolve("languages").as_deref(), Some("fr"));
        assert_eq!(values.resolve("theme").as_deref(), Some("olivero"));
    }

    #[test]
    fn test_hash_map_resolver() {
        let mut map = HashMap::new();
        map.insert("url.query_args:product_id".to_string(), "12".to_string());
        assert_eq!(
            map.resolve("url.query_args:product_id").as_deref(),
            Some("12")
        );
    }
}
