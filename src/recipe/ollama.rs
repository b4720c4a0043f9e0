//! Ollama text-generation client.
//! One best-effort POST per generation: no retry, no backoff. Failures
//! propagate to the service, which falls back to local templates.

use std::time::Duration;

use serde::Deserialize;

use super::{RecipeError, RecipeRequest};

/// Endpoint and generation parameters. `OLLAMA_BASE_URL` and `OLLAMA_MODEL`
/// override the defaults.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.1".into(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            config.model = model;
        }
        config
    }
}

pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, RecipeError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RecipeError::ApiError(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Generate free text for a prompt. Single attempt; the caller owns any
    /// fallback decision.
    pub async fn generate(&self, prompt: &str) -> Result<String, RecipeError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens
            }
        });

        let response = self
            .http
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecipeError::Timeout
                } else {
                    RecipeError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            return Err(RecipeError::ApiError(format!(
                "unexpected status {}: {}",
                status,
                body_text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RecipeError::ApiError(e.to_string()))?;
        Ok(parsed.response)
    }
}

/// Build the generation prompt. The requested output structure matches what
/// [`super::parser::parse_recipe_text`] understands.
pub fn build_prompt(request: &RecipeRequest) -> String {
    let mut prompt = format!(
        "Create a {} recipe featuring {}.",
        request.style,
        request.fruit.trim()
    );
    if let Some(vegetables) = request.vegetables.as_deref().filter(|v| !v.trim().is_empty()) {
        prompt.push_str(&format!(" Include {}.", vegetables.trim()));
    }
    if let Some(diet) = request
        .dietary_restrictions
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    {
        prompt.push_str(&format!(" The recipe must be {}.", diet.trim()));
    }
    prompt.push_str(
        "\n\nRespond in exactly this markdown format:\n\
         # <recipe title>\n\
         ## Ingredients:\n\
         - <ingredient with quantity>\n\
         ## Instructions:\n\
         1. <step>\n\
         ## Nutritional Benefits:\n\
         - <benefit>\n\
         ## Tips:\n\
         - <tip>\n\
         Prep Time: <minutes>\n\
         Servings: <count>\n",
    );
    prompt
}

// --- Response types ---

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}
