// Shared wiremock stand-in for the Ollama HTTP API
#![allow(dead_code, reason = "each integration test binary uses a different subset")]

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;

use football_qa::config::Config;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const EMBED_MODEL: &str = "all-minilm:latest";
pub const GENERATE_MODEL: &str = "mistral:7b-instruct";
pub const DIMENSION: usize = 32;

/// Deterministic hashed bag-of-words vector, unit length
pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() % DIMENSION as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Answers `/api/embed` with one vector per input string
pub struct EmbedResponder;

impl Respond for EmbedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = request.body_json::<Value>() else {
            return ResponseTemplate::new(400);
        };
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| inputs.iter().filter_map(Value::as_str).map(embed_text).collect())
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(json!({
            "model": body["model"],
            "embeddings": embeddings,
        }))
    }
}

pub fn config_for(server: &MockServer, base_dir: &Path) -> Config {
    let mut config = Config::with_base_dir(base_dir);
    config.ollama.host = server.address().ip().to_string();
    config.ollama.port = server.address().port();
    config.ollama.embedding_model = EMBED_MODEL.to_string();
    config.ollama.generation_model = GENERATE_MODEL.to_string();
    config.ollama.backoff_base_ms = 1;
    config.generation.backoff_base_ms = 1;
    config
}

pub async fn mount_tags(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": EMBED_MODEL, "size": 45_960_996, "digest": "1b226e2802db"},
                {"name": GENERATE_MODEL, "size": 4_113_301_824_u64, "digest": "f974a74358d6"}
            ]
        })))
        .mount(server)
        .await;
}

pub async fn mount_embed(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(EmbedResponder)
        .mount(server)
        .await;
}

pub async fn mount_generate(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": GENERATE_MODEL,
            "response": answer,
            "done": true,
        })))
        .mount(server)
        .await;
}

/// Prompts sent to `/api/generate`, in order
pub async fn received_prompts(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/api/generate")
        .filter_map(|request| request.body_json::<Value>().ok())
        .filter_map(|body| body["prompt"].as_str().map(str::to_string))
        .collect()
}

pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}
