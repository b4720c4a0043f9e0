//! Recipe suggestion pipeline: request/recipe value types, error taxonomy,
//! and the service that wires rate limiting, fingerprint caching, remote
//! generation, parsing, and the local template fallback together.

pub mod cache;
pub mod fingerprint;
pub mod local;
pub mod ollama;
pub mod parser;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::persist::PersistentCache;
use crate::rate_limit::RateLimiter;

use self::cache::RecipeCache;
use self::ollama::OllamaClient;

/// The closed set of recipe styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeStyle {
    Smoothie,
    Detox,
    Energy,
    Immunity,
    Digestive,
    Beauty,
}

impl RecipeStyle {
    pub const ALL: [RecipeStyle; 6] = [
        RecipeStyle::Smoothie,
        RecipeStyle::Detox,
        RecipeStyle::Energy,
        RecipeStyle::Immunity,
        RecipeStyle::Digestive,
        RecipeStyle::Beauty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeStyle::Smoothie => "smoothie",
            RecipeStyle::Detox => "detox",
            RecipeStyle::Energy => "energy",
            RecipeStyle::Immunity => "immunity",
            RecipeStyle::Digestive => "digestive",
            RecipeStyle::Beauty => "beauty",
        }
    }
}

impl std::fmt::Display for RecipeStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipeStyle {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smoothie" => Ok(RecipeStyle::Smoothie),
            "detox" => Ok(RecipeStyle::Detox),
            "energy" => Ok(RecipeStyle::Energy),
            "immunity" => Ok(RecipeStyle::Immunity),
            "digestive" => Ok(RecipeStyle::Digestive),
            "beauty" => Ok(RecipeStyle::Beauty),
            other => Err(RecipeError::InvalidInput(format!(
                "unknown recipe style: {other}"
            ))),
        }
    }
}

/// What the UI asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRequest {
    pub fruit: String,
    pub style: RecipeStyle,
    pub vegetables: Option<String>,
    pub dietary_restrictions: Option<String>,
}

/// A generated recipe. Immutable value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub nutritional_benefits: Vec<String>,
    pub tips: Vec<String>,
    pub prep_time: String,
    pub servings: String,
}

#[derive(Debug)]
pub enum RecipeError {
    ApiError(String),
    RateLimited { retry_after_ms: u64 },
    Timeout,
    InvalidInput(String),
}

impl std::fmt::Display for RecipeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipeError::ApiError(msg) => write!(f, "API error: {msg}"),
            RecipeError::RateLimited { retry_after_ms } => {
                write!(f, "rate limited, retry after {retry_after_ms}ms")
            }
            RecipeError::Timeout => write!(f, "generation timeout"),
            RecipeError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for RecipeError {}

/// Where a suggested recipe came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeSource {
    /// Served from the memory cache, the persistent mirror, or an in-flight
    /// generation another caller started.
    Cache,
    /// Freshly generated by the remote endpoint.
    Remote,
    /// Built from local templates (remote unavailable or failed).
    Fallback,
}

/// Suggestion result handed back to the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeOutcome {
    pub request_id: String,
    pub recipe: Recipe,
    pub source: RecipeSource,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Requests allowed per caller key per window.
    pub rate_limit: u32,
    pub rate_window: Duration,
    /// TTL for entries mirrored into durable storage.
    pub persist_ttl: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rate_limit: 10,
            rate_window: Duration::from_secs(60),
            persist_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

/// Orchestrates one suggestion: rate limit, cache layers, in-flight
/// de-duplication, remote generation with local fallback, write-back.
pub struct RecipeService {
    remote: Option<OllamaClient>,
    cache: Arc<RecipeCache>,
    mirror: Option<Arc<PersistentCache>>,
    limiter: Arc<RateLimiter>,
    /// One watch channel per fingerprint currently being generated.
    /// Later requests for the same key await the leader instead of paying
    /// generation cost again.
    pending: Mutex<HashMap<String, watch::Receiver<Option<Recipe>>>>,
    config: ServiceConfig,
}

/// Removes the in-flight record even if the leading request is dropped
/// mid-generation, so followers fall back instead of waiting forever.
struct FlightGuard<'a> {
    service: &'a RecipeService,
    key: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.service.pending.lock().remove(&self.key);
    }
}

enum Flight {
    Leader(watch::Sender<Option<Recipe>>),
    Follower(watch::Receiver<Option<Recipe>>),
}

impl RecipeService {
    pub fn new(
        remote: Option<OllamaClient>,
        cache: Arc<RecipeCache>,
        mirror: Option<Arc<PersistentCache>>,
        limiter: Arc<RateLimiter>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            remote,
            cache,
            mirror,
            limiter,
            pending: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Suggest a recipe for `request` on behalf of `caller`.
    ///
    /// Over-budget callers get [`RecipeError::RateLimited`] with a wait hint.
    /// Everything else resolves to a recipe: cache hit, remote generation,
    /// or the local template fallback, which never fails.
    pub async fn suggest(
        &self,
        caller: &str,
        request: &RecipeRequest,
    ) -> Result<RecipeOutcome, RecipeError> {
        let start = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();

        let decision = self
            .limiter
            .check(caller, self.config.rate_limit, self.config.rate_window);
        if !decision.allowed {
            let retry_after_ms = decision.retry_after(Instant::now()).as_millis() as u64;
            warn!(caller, request_id = %request_id, retry_after_ms, "rate limit exceeded");
            return Err(RecipeError::RateLimited { retry_after_ms });
        }

        let key = fingerprint::generate_key(request);

        if let Some(recipe) = self.cache.get_cached(request) {
            debug!(request_id = %request_id, "recipe cache hit");
            return Ok(outcome(request_id, recipe, RecipeSource::Cache, start));
        }

        if let Some(mirror) = &self.mirror {
            if let Some(recipe) = mirror.get::<Recipe>(&key) {
                debug!(request_id = %request_id, "persistent mirror hit, warming memory cache");
                self.cache.cache_recipe(request, recipe.clone());
                return Ok(outcome(request_id, recipe, RecipeSource::Cache, start));
            }
        }

        let flight = {
            let mut pending = self.pending.lock();
            match pending.get(&key) {
                Some(rx) => Flight::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    pending.insert(key.clone(), rx);
                    Flight::Leader(tx)
                }
            }
        };

        match flight {
            Flight::Follower(mut rx) => {
                debug!(request_id = %request_id, "joining in-flight generation");
                let recipe = loop {
                    {
                        let value = rx.borrow_and_update();
                        if let Some(recipe) = value.as_ref() {
                            break recipe.clone();
                        }
                    }
                    if rx.changed().await.is_err() {
                        warn!(request_id = %request_id, "in-flight generation abandoned, using local templates");
                        break local::generate_locally(request);
                    }
                };
                Ok(outcome(request_id, recipe, RecipeSource::Cache, start))
            }
            Flight::Leader(tx) => {
                let _guard = FlightGuard {
                    service: self,
                    key: key.clone(),
                };
                let (recipe, source) = self.generate(request, &request_id).await;
                // Commit before publishing so followers and later callers
                // observe the cached entry.
                self.cache.cache_recipe(request, recipe.clone());
                if let Some(mirror) = &self.mirror {
                    mirror.set(&key, &recipe, self.config.persist_ttl);
                }
                let _ = tx.send(Some(recipe.clone()));
                Ok(outcome(request_id, recipe, source, start))
            }
        }
    }

    async fn generate(&self, request: &RecipeRequest, request_id: &str) -> (Recipe, RecipeSource) {
        let Some(remote) = &self.remote else {
            return (local::generate_locally(request), RecipeSource::Fallback);
        };
        let prompt = ollama::build_prompt(request);
        match remote.generate(&prompt).await {
            Ok(text) => {
                let recipe = parser::parse_recipe_text(&text);
                if recipe.ingredients.is_empty() && recipe.instructions.is_empty() {
                    warn!(request_id, "remote text had no usable structure, using local templates");
                    (local::generate_locally(request), RecipeSource::Fallback)
                } else {
                    (recipe, RecipeSource::Remote)
                }
            }
            Err(e) => {
                warn!(error = %e, request_id, "remote generation failed, using local templates");
                (local::generate_locally(request), RecipeSource::Fallback)
            }
        }
    }
}

fn outcome(request_id: String, recipe: Recipe, source: RecipeSource, start: Instant) -> RecipeOutcome {
    RecipeOutcome {
        request_id,
        recipe,
        source,
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}
