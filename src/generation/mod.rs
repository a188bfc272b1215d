// Generation module
// Grounded answer generation over retrieved passages with bounded retries


pub mod ollama;
pub mod prompt;

use tracing::{debug, error, info, warn};

use crate::config::{Config, GenerationConfig};
use crate::interaction_log::InteractionLog;
use crate::retrieval::PassageSource;
use crate::retry::Attempt;

pub use ollama::OllamaGenerator;
pub use prompt::{build_context, build_prompt};

/// Returned verbatim when no passage supports an answer
pub const NO_INFORMATION_ANSWER: &str = "I don't have enough information.";

/// Returned when retrieval fails or the model cannot produce an answer
pub const GENERATION_FAILED_ANSWER: &str =
    "Unable to generate an answer right now. Please try again later.";

/// A text-completion backend.
///
/// One call is one attempt; retrying is up to the caller.
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    fn invoke(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Attempt<String>;
}

/// Answers questions from retrieved context and records each answered exchange
pub struct AnswerGenerator {
    source: Box<dyn PassageSource>,
    model: Box<dyn LanguageModel>,
    log: Option<InteractionLog>,
    settings: GenerationConfig,
    top_k: usize,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(
        config: &Config,
        source: Box<dyn PassageSource>,
        model: Box<dyn LanguageModel>,
    ) -> Self {
        Self {
            source,
            model,
            log: None,
            settings: config.generation,
            top_k: config.retrieval.top_k,
        }
    }

    #[inline]
    pub fn with_log(mut self, log: InteractionLog) -> Self {
        self.log = Some(log);
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question`, always producing text.
    ///
    /// The result is a grounded answer, [`NO_INFORMATION_ANSWER`] when nothing
    /// was retrieved, or [`GENERATION_FAILED_ANSWER`] when retrieval or the model fails.
    /// Only grounded answers are written to the interaction log.
    #[inline]
    pub async fn generate_answer(&self, question: &str) -> String {
        let passages = match self.source.retrieve(question, self.top_k).await {
            Ok(passages) => passages,
            Err(e) => {
                error!("Retrieval failed for question {:?}: {}", question, e);
                return GENERATION_FAILED_ANSWER.to_string();
            }
        };

        if passages.is_empty() {
            info!("No passages retrieved, answering without the model");
            return NO_INFORMATION_ANSWER.to_string();
        }

        let prompt = build_prompt(&build_context(&passages), question);
        debug!(
            "Prompting {} with {} passages ({} chars)",
            self.model.model_name(),
            passages.len(),
            prompt.len()
        );

        let answer = match self.invoke_with_retry(&prompt) {
            Ok(raw) => raw.trim().to_string(),
            Err(reason) => {
                error!("Answer generation failed: {}", reason);
                return GENERATION_FAILED_ANSWER.to_string();
            }
        };

        if let Some(log) = &self.log {
            if let Err(e) = log.append(question, &answer) {
                warn!("Failed to record interaction: {}", e);
            }
        }

        answer
    }

    fn invoke_with_retry(&self, prompt: &str) -> Result<String, String> {
        self.settings
            .retry_policy()
            .run(|attempt| {
                debug!("Model call attempt {}", attempt);
                self.model
                    .invoke(prompt, self.settings.temperature, self.settings.max_tokens)
            })
            .map_err(|e| e.to_string())
    }
}
