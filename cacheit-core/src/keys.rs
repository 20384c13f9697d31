//! Entry key derivation and tag/key validation.
//!
//! An entry key is built from the cache bin, the caller's view key and the
//! sorted `(context, value)` pairs, e.g.
//! `render:recent_content:[languages]=en:[theme]=olivero`.
//! Every component is escaped, so two different `(bin, view, contexts)`
//! triples never share a key.

use std::collections::BTreeMap;

use crate::error::{CacheError, CacheResult};

/// Build the storage key of a composite view.
///
/// # Examples
///
/// ```
/// use cacheit_core::keys::derive_entry_key;
/// use std::collections::BTreeMap;
///
/// let mut contexts = BTreeMap::new();
/// contexts.insert("languages".to_string(), "en".to_string());
///
/// let key = derive_entry_key("render", "recent_content", &contexts).unwrap();
/// assert_eq!(key, "render:recent_content:[languages]=en");
/// ```
pub fn derive_entry_key(
    bin: &str,
    view_key: &str,
    contexts: &BTreeMap<String, String>,
) -> CacheResult<String> {
    validate_key(view_key)?;

    let mut key = String::with_capacity(bin.len() + view_key.len() + contexts.len() * 16 + 1);
    push_escaped(&mut key, bin);
    key.push(':');
    push_escaped(&mut key, view_key);
    for (context, value) in contexts {
        key.push_str(":[");
        push_escaped(&mut key, context);
        key.push_str("]=");
        push_escaped(&mut key, value);
    }
    Ok(key)
}

/// Escape the separators so no component can impersonate another.
fn push_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\\' | ':' | '[' | ']' | '=' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

/// Reject empty tags and tags containing whitespace or control characters.
pub fn validate_tag(tag: &str) -> CacheResult<()> {
    if tag.is_empty() {
        return Err(CacheError::InvalidTag {
            tag: tag.to_string(),
            reason: "tag is empty",
        });
    }
    if tag.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CacheError::InvalidTag {
            tag: tag.to_string(),
            reason: "tag contains whitespace or control characters",
        });
    }
    Ok(())
}

/// Reject empty keys and keys made only of whitespace.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.trim().is_empty() {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: "key is empty",
        });
    }
    if key.chars().any(char::is_control) {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: "key contains control characters",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contexts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_context_values_change_the_key() {
        let en = derive_entry_key("render", "recent", &contexts(&[("languages", "en")])).unwrap();
        let fr = derive_entry_key("render", "recent", &contexts(&[("languages", "fr")])).unwrap();
        assert_ne!(en, fr);
    }

    #[test]
    fn test_key_is_independent_of_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("theme".to_string(), "olivero".to_string());
        a.insert("languages".to_string(), "en".to_string());
        let b = contexts(&[("languages", "en"), ("theme", "olivero")]);

        assert_eq!(
            derive_entry_key("render", "v", &a).unwrap(),
            derive_entry_key("render", "v", &b).unwrap()
        );
    }

    #[test]
    fn test_separators_in_values_are_escaped() {
        let crafted = derive_entry_key(
            "render",
            "v",
            &contexts(&[("a", "1:[b]=2")]),
        )
        .unwrap();
        let honest = derive_entry_key("render", "v", &contexts(&[("a", "1"), ("b", "2")])).unwrap();
        assert_ne!(crafted, honest);
    }

    #[test]
    fn test_view_key_cannot_forge_contexts() {
        let with_context =
            derive_entry_key("render", "a", &contexts(&[("languages", "en")])).unwrap();
        let forged = derive_entry_key("render", "a:[languages]=en", &BTreeMap::new()).unwrap();
        assert_ne!(with_context, forged);
        assert_eq!(forged, r"render:a\:\[languages\]\=en");
    }

    #[test]
    fn test_bin_and_context_names_are_escaped() {
        let split_bin = derive_entry_key("render:a", "b", &BTreeMap::new()).unwrap();
        let split_view = derive_entry_key("render", "a:b", &BTreeMap::new()).unwrap();
        assert_ne!(split_bin, split_view);

        let odd_name = derive_entry_key("render", "v", &contexts(&[("a]=1:[b", "2")])).unwrap();
        let two = derive_entry_key("render", "v", &contexts(&[("a", "1"), ("b", "2")])).unwrap();
        assert_ne!(odd_name, two);
    }

    #[test]
    fn test_empty_view_key_is_rejected() {
        assert!(matches!(
            derive_entry_key("render", "  ", &BTreeMap::new()),
            Err(CacheError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("node:5").is_ok());
        assert!(validate_tag("cacheit_recent_content").is_ok());
        assert!(matches!(validate_tag(""), Err(CacheError::InvalidTag { .. })));
        assert!(matches!(validate_tag("node 5"), Err(CacheError::InvalidTag { .. })));
        assert!(matches!(validate_tag("node\n5"), Err(CacheError::InvalidTag { .. })));
    }
}
