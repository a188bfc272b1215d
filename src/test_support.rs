// Deterministic stand-ins for the model server used across unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embeddings::{Embedder, Embedding};
use crate::generation::LanguageModel;
use crate::retrieval::PassageSource;
use crate::retry::Attempt;
use crate::{QaError, Result};

pub(crate) const FAKE_DIMENSION: usize = 64;

/// Hashed bag-of-words embedder; texts sharing words land close together
pub(crate) struct FakeEmbedder {
    model: String,
    fail: bool,
    pub(crate) calls: AtomicUsize,
}

impl FakeEmbedder {
    pub(crate) fn new() -> Self {
        Self::named("fake-embedder")
    }

    pub(crate) fn named(model: &str) -> Self {
        Self {
            model: model.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn embed(text: &str) -> Embedding {
        let mut vector = vec![0.0_f32; FAKE_DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % FAKE_DIMENSION as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(QaError::Embedding("model server unavailable".to_string()));
        }
        Ok(texts.iter().map(|text| Self::embed(text)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(QaError::Embedding("model server unavailable".to_string()));
        }
        Ok(Self::embed(text))
    }
}

/// Replays scripted outcomes and records every prompt and its sampling settings; clones share state
#[derive(Clone)]
pub(crate) struct ScriptedModel {
    outcomes: Arc<Mutex<VecDeque<Attempt<String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    sampling: Arc<Mutex<Vec<(f32, u32)>>>,
}

impl ScriptedModel {
    pub(crate) fn new(outcomes: Vec<Attempt<String>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            sampling: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn answering(text: &str) -> Self {
        Self::new(vec![Attempt::Success(text.to_string())])
    }

    pub(crate) fn call_count(&self) -> usize {
        self.prompts.lock().expect("prompt log poisoned").len()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }

    /// `(temperature, max_tokens)` of every call, in order
    pub(crate) fn sampling(&self) -> Vec<(f32, u32)> {
        self.sampling.lock().expect("sampling log poisoned").clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted-model"
    }

    fn invoke(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Attempt<String> {
        self.sampling
            .lock()
            .expect("sampling log poisoned")
            .push((temperature, max_tokens));
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        self.outcomes
            .lock()
            .expect("outcome script poisoned")
            .pop_front()
            .unwrap_or_else(|| Attempt::Terminal("script exhausted".to_string()))
    }
}

/// Returns the same passages for every question, or fails every time; clones share state
#[derive(Clone)]
pub(crate) struct FixedPassages {
    passages: Option<Vec<String>>,
    requested_top_k: Arc<Mutex<Vec<usize>>>,
}

impl FixedPassages {
    pub(crate) fn new(passages: &[&str]) -> Self {
        Self {
            passages: Some(passages.iter().map(|p| (*p).to_string()).collect()),
            requested_top_k: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            passages: None,
            requested_top_k: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn requested_top_k(&self) -> Vec<usize> {
        self.requested_top_k
            .lock()
            .expect("top_k log poisoned")
            .clone()
    }
}

#[async_trait]
impl PassageSource for FixedPassages {
    async fn retrieve(&self, _query: &str, top_k: usize) -> Result<Vec<String>> {
        self.requested_top_k
            .lock()
            .expect("top_k log poisoned")
            .push(top_k);
        match &self.passages {
            Some(passages) => Ok(passages.iter().take(top_k).cloned().collect()),
            None => Err(QaError::Database("index unavailable".to_string())),
        }
    }
}
