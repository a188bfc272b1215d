
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::LanguageModel;
use crate::config::Config;
use crate::embeddings::ollama::{build_agent, post_json};
use crate::retry::Attempt;

/// Text generation through Ollama's `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    base_url: Url,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: config.ollama.generation_model.clone(),
            agent: build_agent(config.ollama.timeout()),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    fn generate_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join("/api/generate")
    }
}

impl LanguageModel for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn invoke(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Attempt<String> {
        let url = match self.generate_url() {
            Ok(url) => url,
            Err(e) => return Attempt::Terminal(format!("Failed to build generate URL: {}", e)),
        };

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: max_tokens,
            },
        };
        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(e) => return Attempt::Terminal(format!("Failed to serialize request: {}", e)),
        };

        debug!("Requesting completion from {} at {}", self.model, url);
        match post_json(&self.agent, &url, &body) {
            Attempt::Success(text) => match serde_json::from_str::<GenerateResponse>(&text) {
                Ok(parsed) => Attempt::Success(parsed.response),
                Err(e) => Attempt::Terminal(format!("Failed to parse generate response: {}", e)),
            },
            Attempt::Transient(reason) => Attempt::Transient(reason),
            Attempt::Terminal(reason) => Attempt::Terminal(reason),
        }
    }
}
