use crate::error::{EnhancerError, Result};
use crate::types::StackDirection;

/// Parsed rule sets kept in memory, as in the hosted service
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
/// Sets whose first base starts with this prefix skip the app-variant overrides
pub const DEFAULT_LEGACY_BASE_PREFIX: &str = "legacy";
/// Base reported as `latest` by `as_dict`
pub const DEFAULT_LATEST_BASE: &str = "newstyle:2023-01-11";

/// Settings for an [`Enhancer`](crate::Enhancer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of parsed rule sets kept in the cache
    pub cache_capacity: usize,
    /// Order of the frames handed to the engine
    pub stack_direction: StackDirection,
    pub legacy_base_prefix: String,
    pub latest_base: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            stack_direction: StackDirection::default(),
            legacy_base_prefix: DEFAULT_LEGACY_BASE_PREFIX.to_string(),
            latest_base: DEFAULT_LATEST_BASE.to_string(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_stack_direction(mut self, direction: StackDirection) -> Self {
        self.stack_direction = direction;
        self
    }

    #[must_use]
    pub fn with_legacy_base_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.legacy_base_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_latest_base<S: Into<String>>(mut self, base: S) -> Self {
        self.latest_base = base.into();
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(EnhancerError::configuration("cache_capacity must be greater than 0"));
        }

        if self.legacy_base_prefix.is_empty() {
            return Err(EnhancerError::configuration("legacy_base_prefix must not be empty"));
        }

        if self.latest_base.trim().is_empty() {
            return Err(EnhancerError::configuration("latest_base must not be empty"));
        }

        Ok(())
    }

    /// Whether a set with these bases runs in legacy mode
    pub fn is_legacy(&self, bases: &[String]) -> bool {
        bases.first().is_some_and(|b| b.starts_with(&self.legacy_base_prefix))
    }
}
