//! Composite cache configuration.
//!
//! Settings can be built in code or loaded from an optional file layered
//! under `CACHEIT_*` environment variables:
//!
//! ```text
//! CACHEIT_BIN=render
//! CACHEIT_ENABLED=true
//! CACHEIT_MAX_AGE_CEILING=86400
//! CACHEIT_REQUIRED_CONTEXTS=languages,theme
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::CacheResult;
use crate::keys::validate_key;

/// Prefix of the environment variables read by [`CacheConfig::load`].
pub const ENV_PREFIX: &str = "CACHEIT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace prepended to every entry key.
    pub bin: String,
    /// When false, every resolve computes and nothing is stored.
    pub enabled: bool,
    /// Contexts every composite varies by, on top of its own.
    pub required_contexts: Vec<String>,
    /// Longest time any entry is kept, in seconds, permanent ones included.
    pub max_age_ceiling: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            bin: "render".to_string(),
            enabled: true,
            required_contexts: Vec::new(),
            max_age_ceiling: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path` (if given) and `CACHEIT_*` environment variables.
    ///
    /// Environment variables win over the file; unset keys keep their defaults.
    pub fn load(path: Option<&Path>) -> CacheResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("required_contexts"),
        );

        let config: CacheConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        tracing::debug!(?config, "loaded cache configuration");
        Ok(config)
    }

    pub fn validate(&self) -> CacheResult<()> {
        validate_key(&self.bin)
    }

    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_required_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_age_ceiling(mut self, ceiling: Option<Duration>) -> Self {
        self.max_age_ceiling = ceiling.map(|d| d.as_secs());
        self
    }

    pub fn max_age_ceiling(&self) -> Option<Duration> {
        self.max_age_ceiling.map(Duration::from_secs)
    }
}
