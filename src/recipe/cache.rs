//! Fingerprint-keyed recipe cache.
//! Specializes the generic memory cache: capacity 50, TTL 30 minutes, keys
//! derived from normalized requests so equivalent requests always hit.

use std::time::Duration;

use crate::cache::{CacheConfig, CacheHit, CacheStats, MemoryCache};

use super::{fingerprint, Recipe, RecipeRequest};

/// Default number of cached recipes.
pub const DEFAULT_CAPACITY: usize = 50;
/// Default recipe TTL: 30 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

pub struct RecipeCache {
    inner: MemoryCache<Recipe>,
}

impl RecipeCache {
    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: MemoryCache::new(config),
        }
    }

    pub fn default_config() -> CacheConfig {
        CacheConfig {
            capacity: DEFAULT_CAPACITY,
            default_ttl: DEFAULT_TTL,
            stale_while_revalidate: false,
        }
    }

    /// Store a generated recipe under the request's fingerprint.
    pub fn cache_recipe(&self, request: &RecipeRequest, recipe: Recipe) {
        self.inner.set(fingerprint::generate_key(request), recipe);
    }

    /// Look up a recipe for an equivalent (normalized) request.
    pub fn get_cached(&self, request: &RecipeRequest) -> Option<Recipe> {
        self.inner
            .get(&fingerprint::generate_key(request))
            .map(CacheHit::into_inner)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl Default for RecipeCache {
    fn default() -> Self {
        Self::new()
    }
}
