
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::QaError;
use crate::config::Config;
use crate::embeddings::{Embedder, Embedding};
use crate::retry::{Attempt, RetryPolicy};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_policy: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ModelDetails {
    pub format: Option<String>,
    pub family: Option<String>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// POST a JSON body and classify the outcome for the retry driver
pub(crate) fn post_json(agent: &ureq::Agent, url: &Url, body: &str) -> Attempt<String> {
    let response = agent
        .post(url.as_str())
        .header("Content-Type", "application/json")
        .send(body)
        .and_then(|mut resp| resp.body_mut().read_to_string());

    match response {
        Ok(text) => Attempt::Success(text),
        Err(error) => Attempt::from_ureq_error(&error),
    }
}

/// Whether `available` names the same Ollama model as `wanted`, allowing for the implicit `:latest` tag
pub(crate) fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted
        || (!wanted.contains(':') && available.strip_suffix(":latest") == Some(wanted))
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: config.ollama.embedding_model.clone(),
            batch_size: config.ollama.batch_size,
            agent: build_agent(config.ollama.timeout()),
            retry_policy: config.ollama.retry_policy(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Test connection to Ollama server and verify the embedding model is available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;
        ensure_model_available(&models, &self.model).context("Model validation failed")?;

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .retry_policy
            .run(|_| {
                match self
                    .agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
                {
                    Ok(text) => Attempt::Success(text),
                    Err(error) => Attempt::from_ureq_error(&error),
                }
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Generate embeddings for multiple text inputs, batched by the configured batch size
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Process in batches to avoid overwhelming the server
        for chunk in texts.chunks(self.batch_size.max(1) as usize) {
            let batch_results = self
                .generate_embeddings_single_batch(chunk)
                .with_context(|| format!("Failed to process batch of {} texts", chunk.len()))?;

            results.extend(batch_results);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn generate_embeddings_single_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build embedding URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let response_text = self
            .retry_policy
            .run(|_| post_json(&self.agent, &url, &request_json))
            .context("Failed to generate embeddings")?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        Ok(response.embeddings)
    }
}

pub(crate) fn ensure_model_available(models: &[ModelInfo], wanted: &str) -> Result<()> {
    if models.iter().any(|m| model_matches(&m.name, wanted)) {
        debug!("Model {} is available", wanted);
        return Ok(());
    }

    let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    warn!(
        "Model {} not found. Available models: {:?}",
        wanted, available_models
    );
    Err(anyhow::anyhow!(
        "Model '{}' is not available. Available models: {:?}",
        wanted,
        available_models
    ))
}

impl Embedder for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed_documents(&self, texts: &[String]) -> crate::Result<Vec<Embedding>> {
        self.generate_embeddings_batch(texts)
            .map_err(|e| QaError::Embedding(format!("{:#}", e)))
    }

    fn embed_query(&self, text: &str) -> crate::Result<Embedding> {
        self.generate_embeddings_single_batch(&[text.to_string()])
            .map_err(|e| QaError::Embedding(format!("{:#}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| QaError::Embedding("model returned no embeddings".to_string()))
    }
}
