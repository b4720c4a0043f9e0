//! Tropical Blend: recipe suggestion core.
//! Bounded fingerprint caching, fixed-window rate limiting, remote recipe
//! generation with a local template fallback, and a durable cache mirror.

pub mod cache;
pub mod persist;
pub mod rate_limit;
pub mod recipe;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use persist::PersistentCache;
use rate_limit::RateLimiter;
use recipe::cache::RecipeCache;
use recipe::ollama::{OllamaClient, OllamaConfig};
use recipe::{RecipeService, ServiceConfig};

pub use cache::{CacheConfig, CacheHit, CacheStats, MemoryCache};
pub use recipe::{Recipe, RecipeError, RecipeOutcome, RecipeRequest, RecipeSource, RecipeStyle};

/// Everything needed to build a [`RecipeContext`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub cache: CacheConfig,
    pub service: ServiceConfig,
    /// None disables remote generation; suggestions use local templates.
    pub remote: Option<OllamaConfig>,
    /// None disables the durable mirror.
    pub persist_path: Option<PathBuf>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache: RecipeCache::default_config(),
            service: ServiceConfig::default(),
            remote: Some(OllamaConfig::from_env()),
            persist_path: None,
        }
    }
}

/// Process-wide context holding the cache, limiter, mirror and service.
///
/// Constructed explicitly at startup and shared via `Arc`; nothing here is
/// global, so tests can build as many isolated contexts as they like.
pub struct RecipeContext {
    pub cache: Arc<RecipeCache>,
    pub limiter: Arc<RateLimiter>,
    pub mirror: Option<Arc<PersistentCache>>,
    pub service: Arc<RecipeService>,
}

impl RecipeContext {
    pub fn new(config: ContextConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new());
        let cache = Arc::new(RecipeCache::with_config(config.cache));

        let mirror = config.persist_path.as_deref().and_then(|path| {
            match PersistentCache::open(path) {
                Ok(mirror) => Some(Arc::new(mirror)),
                Err(e) => {
                    warn!(error = %e, "persistent cache open failed, mirror disabled");
                    None
                }
            }
        });

        let remote = config.remote.and_then(|remote_config| {
            match OllamaClient::new(remote_config) {
                Ok(client) => {
                    info!("remote recipe generator initialized");
                    Some(client)
                }
                Err(e) => {
                    warn!(error = %e, "remote generator init failed, using local templates only");
                    None
                }
            }
        });

        let service = Arc::new(RecipeService::new(
            remote,
            Arc::clone(&cache),
            mirror.clone(),
            Arc::clone(&limiter),
            config.service,
        ));

        Self {
            cache,
            limiter,
            mirror,
            service,
        }
    }

    /// Start the periodic background sweeps: rate-limiter records every
    /// minute, mirrored entries hourly.
    pub fn start_cleanup_loops(&self) {
        RateLimiter::start_cleanup_loop(Arc::clone(&self.limiter), Duration::from_secs(60));
        if let Some(mirror) = &self.mirror {
            PersistentCache::start_cleanup_loop(Arc::clone(mirror));
        }
    }
}

/// Initialize tracing. Call once at startup.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tropical_blend=debug".parse().unwrap()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}
