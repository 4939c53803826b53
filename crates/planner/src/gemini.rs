//! Command planner backed by the Gemini `generateContent` REST API.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::error::PlannerError;
use crate::plan::{CommandPlanner, DronePlan};
use crate::prompt::{build_prompt, load_template};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Models tried after the configured one, in order.
const FALLBACK_MODELS: [&str; 5] = [
    "gemini-2.5-flash-lite",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-1.5-flash-001",
    "gemini-1.5-pro-001",
];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model tried first (default: [`DEFAULT_MODEL`]).
    pub model: String,
    /// Prompt template file; the built-in template is used when unset.
    pub prompt_path: Option<PathBuf>,
    pub api_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            prompt_path: None,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

pub struct GeminiPlanner {
    client: reqwest::Client,
    config: GeminiConfig,
    template: String,
    model: OnceCell<String>,
}

// ---- wire types ----

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiPlanner {
    /// Build a planner, reading the prompt template up front.
    pub fn new(config: GeminiConfig) -> Result<Self, PlannerError> {
        let template = load_template(config.prompt_path.as_deref())?;
        Ok(Self {
            client: reqwest::Client::new(),
            config,
            template,
            model: OnceCell::new(),
        })
    }

    /// The configured model followed by the built-in fallbacks.
    fn candidates(&self) -> Vec<&str> {
        std::iter::once(self.config.model.as_str())
            .chain(FALLBACK_MODELS)
            .filter(|m| !m.is_empty())
            .collect()
    }

    /// Resolve the model once and reuse it for every later call.
    async fn model(&self) -> Result<&str, PlannerError> {
        let name = self
            .model
            .get_or_try_init(|| async {
                let available = self.list_generate_models().await?;
                let chosen = pick_model(&self.candidates(), &available)
                    .ok_or(PlannerError::NoModelAvailable)?;
                tracing::info!(model = %chosen, "selected planner model");
                Ok::<_, PlannerError>(chosen)
            })
            .await?;
        Ok(name.as_str())
    }

    async fn list_generate_models(&self) -> Result<Vec<String>, PlannerError> {
        let response = self
            .client
            .get(format!("{}/models", self.config.api_url))
            .query(&[("pageSize", "1000")])
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await?;
        let list: ModelList = parse_response(response).await?;

        Ok(list
            .models
            .into_iter()
            .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
            .map(|m| short_model_name(&m.name).to_string())
            .collect())
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, PlannerError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        let response = self
            .client
            .post(format!("{}/models/{model}:generateContent", self.config.api_url))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let generated: GenerateResponse = parse_response(response).await?;
        Ok(generated.text())
    }
}

#[async_trait]
impl CommandPlanner for GeminiPlanner {
    async fn plan(&self, text: &str) -> Result<DronePlan, PlannerError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(DronePlan::empty());
        }

        let model = self.model().await?;
        let prompt = build_prompt(&self.template, text);
        let raw = self.generate(model, &prompt).await?;
        tracing::debug!(model, response_len = raw.len(), "planner response");

        DronePlan::from_model_output(&raw)
    }
}

/// First candidate present in `available`, else the alphabetically first
/// available model.
pub fn pick_model(candidates: &[&str], available: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|c| available.iter().any(|a| a == *c))
        .map(|c| c.to_string())
        .or_else(|| available.iter().min().cloned())
}

/// `models/gemini-2.5-flash` → `gemini-2.5-flash`.
fn short_model_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

// ---- private helpers ----

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PlannerError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(PlannerError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}
