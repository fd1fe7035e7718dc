//! Bounded cache of parsed rule sets.
//!
//! Keys are SHA-256 fingerprints of the input (DSL text or encoded blob);
//! values are shared, immutable parse results. Parsing happens outside the
//! lock, so concurrent misses for the same key may parse twice; the first
//! insert wins and later results are dropped.

use crate::codec::LATEST_VERSION;
use crate::error::{EnhancerError, Result};
use crate::rules::Rule;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Where a cached rule set came from; part of the fingerprint so DSL text and
/// an encoded blob with equal bytes never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Text,
    Binary,
}

impl Source {
    fn tag(self) -> &'static [u8] {
        match self {
            Source::Text => b"text\0",
            Source::Binary => b"binary\0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(source: Source, input: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.tag());
        hasher.update(input);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Parse result shared between every enhancement set built from the same input.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRules {
    pub version: u32,
    /// Base references carried by an encoded set; empty for DSL text
    pub bases: Vec<String>,
    pub rules: Vec<Rule>,
}

impl ParsedRules {
    /// Rules parsed from DSL text, which carries no version or bases of its own
    pub fn from_text_rules(rules: Vec<Rule>) -> Self {
        Self { version: LATEST_VERSION, bases: Vec::new(), rules }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

pub struct RuleCache {
    entries: Mutex<LruCache<Fingerprint, Arc<ParsedRules>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RuleCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Like [`RuleCache::new`], rejecting a zero capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        NonZeroUsize::new(capacity)
            .map(Self::new)
            .ok_or_else(|| EnhancerError::configuration("cache capacity must be greater than 0"))
    }

    pub fn get(&self, key: &Fingerprint) -> Option<Arc<ParsedRules>> {
        self.entries.lock().get(key).cloned()
    }

    /// Return the cached value for `key`, or run `parse` and cache its result.
    /// Errors are returned to the caller and never cached.
    pub fn get_or_try_insert<F>(&self, key: Fingerprint, parse: F) -> Result<Arc<ParsedRules>>
    where
        F: FnOnce() -> Result<ParsedRules>,
    {
        if let Some(hit) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Rule cache hit for {}", key);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Rule cache miss for {}", key);

        let parsed = Arc::new(parse()?);
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key) {
            return Ok(Arc::clone(existing));
        }
        entries.put(key, Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

impl fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCache").field("stats", &self.stats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse_enhancements;
    use std::sync::atomic::AtomicUsize;

    fn parsed(dsl: &str) -> Result<ParsedRules> {
        Ok(ParsedRules::from_text_rules(parse_enhancements(dsl)?))
    }

    #[test]
    fn test_fingerprint_depends_on_source() {
        let text = Fingerprint::of(Source::Text, b"abc");
        assert_eq!(text, Fingerprint::of(Source::Text, b"abc"));
        assert_ne!(text, Fingerprint::of(Source::Binary, b"abc"));
        assert_ne!(text, Fingerprint::of(Source::Text, b"abd"));
        assert_eq!(text.to_string().len(), 64);
    }

    #[test]
    fn test_hit_returns_shared_value() {
        let cache = RuleCache::with_capacity(4).unwrap();
        let key = Fingerprint::of(Source::Text, b"function:a +app");
        let first = cache.get_or_try_insert(key, || parsed("function:a +app")).unwrap();
        let second = cache
            .get_or_try_insert(key, || panic!("cached value must be reused"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = RuleCache::with_capacity(4).unwrap();
        let key = Fingerprint::of(Source::Text, b"bogus");
        assert!(cache.get_or_try_insert(key, || parsed("bogus")).is_err());
        assert!(cache.is_empty());
        assert!(cache.get_or_try_insert(key, || parsed("function:x -group")).is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_least_recently_used_entry_is_evicted() {
        let cache = RuleCache::with_capacity(2).unwrap();
        let keys: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|k| Fingerprint::of(Source::Text, k.as_bytes()))
            .collect();
        cache.get_or_try_insert(keys[0], || parsed("")).unwrap();
        cache.get_or_try_insert(keys[1], || parsed("")).unwrap();
        // touch "a" so "b" is the eviction candidate
        assert!(cache.get(&keys[0]).is_some());
        cache.get_or_try_insert(keys[2], || parsed("")).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[0]).is_some());
        assert!(cache.get(&keys[1]).is_none());
        assert!(cache.get(&keys[2]).is_some());
    }

    #[test]
    fn test_evicted_rules_are_released() {
        let cache = RuleCache::with_capacity(1).unwrap();
        let first = Fingerprint::of(Source::Text, b"value:*timeout* +group");
        let stored = cache
            .get_or_try_insert(first, || parsed("value:*timeout* +group"))
            .unwrap();
        let weak = Arc::downgrade(&stored);
        drop(stored);

        let second = Fingerprint::of(Source::Text, b"function:other -group");
        cache
            .get_or_try_insert(second, || parsed("function:other -group"))
            .unwrap();
        // the rules and the globs they compiled go with the evicted entry
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = RuleCache::with_capacity(0).unwrap_err();
        assert!(matches!(err, EnhancerError::Configuration { .. }));
    }

    #[test]
    fn test_concurrent_misses_share_one_entry() {
        let cache = RuleCache::with_capacity(8).unwrap();
        let key = Fingerprint::of(Source::Text, b"function:main +app");
        let parses = AtomicUsize::new(0);

        let results: Vec<Arc<ParsedRules>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        cache
                            .get_or_try_insert(key, || {
                                parses.fetch_add(1, Ordering::SeqCst);
                                parsed("function:main +app")
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.len(), 1);
        assert!(parses.load(Ordering::SeqCst) >= 1);
        let stored = cache.get(&key).unwrap();
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &stored)));
    }
}
