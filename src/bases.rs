//! Registry of built-in base rule sets.
//!
//! The packaged configs under `src/enhancement-configs/` are embedded at build
//! time. A file named `common@2019-03-14.txt` becomes the base
//! `common:2019-03-14`. The registry is built once and read-only afterwards;
//! share it by reference.

use crate::cache::ParsedRules;
use crate::error::Result;
use crate::rules::parse_enhancements;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, info};

// Generated at compile time by build.rs
include!(concat!(env!("OUT_DIR"), "/embedded_configs.rs"));

#[derive(Debug, Clone, Default)]
pub struct BaseRegistry {
    entries: FxHashMap<String, Arc<ParsedRules>>,
}

impl BaseRegistry {
    /// Parse every packaged config.
    pub fn builtin() -> Result<Self> {
        let registry = Self::from_sources(
            EMBEDDED_CONFIGS
                .iter()
                .map(|(stem, text)| (stem.replace('@', ":"), *text)),
        )?;
        info!("Loaded {} built-in enhancement bases", registry.len());
        Ok(registry)
    }

    /// Build a registry from `(id, DSL text)` pairs.
    pub fn from_sources<I, S, T>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: AsRef<str>,
    {
        let mut entries = FxHashMap::default();
        for (id, text) in sources {
            let id = id.into();
            let rules = parse_enhancements(text.as_ref())?;
            debug!("Base {} has {} rules", id, rules.len());
            entries.insert(id, Arc::new(ParsedRules::from_text_rules(rules)));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ParsedRules>> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
