// Test case synthesis
// The generation model writes question/answer pairs from scraped articles


use anyhow::Context;
use fancy_regex::Regex;
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::{TestCase, load_test_cases};
use crate::articles::Article;
use crate::config::{Config, GenerationConfig};
use crate::generation::LanguageModel;
use crate::store::NO_TITLE;

/// Question styles rotated across requests
pub const QUESTION_TYPES: [&str; 5] = [
    "factual",
    "comparative",
    "fact-checking",
    "multi-step",
    "hypothetical",
];

const ARTICLE_EXCERPT_CHARS: usize = 700;
const ATTEMPTS_PER_CASE: usize = 3;

static TEST_CASE_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)\{\s*"question"\s*:\s*"(?:[^"\\]|\\.)*"\s*,\s*"answer"\s*:\s*"(?:[^"\\]|\\.)*"\s*\}"#,
    )
    .expect("valid regex")
});

/// Prompt asking for one test case grounded in the start of `article`
#[inline]
pub fn build_test_case_prompt(article: &Article, question_type: &str) -> String {
    let title = article.title.as_deref().unwrap_or(NO_TITLE);
    let excerpt: String = article
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(ARTICLE_EXCERPT_CHARS)
        .collect();

    format!(
        r#"### Football Test Case Generator

You write high-quality football test cases that check whether a retrieval system understands news articles.

## Rules:
- The question must require detailed knowledge of the article, not common trivia.
- The answer must be factual, precise and unique.
- Output a single JSON object and nothing else.
- Question type: {question_type}

## Article Title: {title}
## Article Content:
{excerpt}

Example JSON format:
{{"question": "Which club has the longest unbeaten streak in Premier League history?", "answer": "Arsenal, with 49 unbeaten games from 2003 to 2004."}}

Generate one test case based on the article."#
    )
}

/// Extract a `{question, answer}` object from a model response.
///
/// Accepts a bare JSON object or one embedded in surrounding prose or code fences.
#[inline]
pub fn parse_test_case(response: &str) -> Option<TestCase> {
    let trimmed = response.trim();
    let case = serde_json::from_str::<TestCase>(trimmed).ok().or_else(|| {
        let found = TEST_CASE_OBJECT.find(trimmed).ok().flatten()?;
        serde_json::from_str::<TestCase>(found.as_str()).ok()
    })?;

    (!case.question.trim().is_empty() && !case.answer.trim().is_empty()).then_some(case)
}

/// Test cases already on disk; a missing file is empty, a malformed one is an error
#[inline]
pub fn load_existing_test_cases(path: &Path) -> anyhow::Result<Vec<TestCase>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    load_test_cases(path)
}

/// Append `fresh` to the test case file, returning the new total
#[inline]
pub fn append_test_cases(path: &Path, fresh: &[TestCase]) -> anyhow::Result<usize> {
    let mut cases = load_existing_test_cases(path)?;
    cases.extend_from_slice(fresh);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_string_pretty(&cases)?)
        .with_context(|| format!("Failed to write test cases to {}", path.display()))?;
    Ok(cases.len())
}

fn question_key(question: &str) -> String {
    question.trim().to_lowercase()
}

pub struct TestCaseGenerator<'a> {
    model: &'a dyn LanguageModel,
    settings: GenerationConfig,
    progress: ProgressBar,
}

impl<'a> TestCaseGenerator<'a> {
    #[inline]
    pub fn new(config: &Config, model: &'a dyn LanguageModel) -> Self {
        Self {
            model,
            settings: config.generation,
            progress: ProgressBar::hidden(),
        }
    }

    #[inline]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Ask the model for up to `count` new test cases.
    ///
    /// Articles with content are used in turn. Questions already in `existing`,
    /// or produced earlier in this run, are skipped. Gives up after
    /// three requests per wanted case.
    #[inline]
    pub fn generate(
        &self,
        articles: &[Article],
        existing: &[TestCase],
        count: usize,
    ) -> Vec<TestCase> {
        let sources: Vec<&Article> = articles
            .iter()
            .filter(|a| a.content.as_deref().is_some_and(|c| !c.trim().is_empty()))
            .collect();
        if sources.is_empty() || count == 0 {
            warn!("No articles with content to generate test cases from");
            return Vec::new();
        }

        let mut seen: HashSet<String> = existing.iter().map(|c| question_key(&c.question)).collect();
        let mut fresh = Vec::with_capacity(count);
        let policy = self.settings.retry_policy();
        self.progress.set_length(count as u64);

        for request in 0..count.saturating_mul(ATTEMPTS_PER_CASE) {
            if fresh.len() >= count {
                break;
            }

            let article = sources[request % sources.len()];
            let title = article.title.as_deref().unwrap_or(NO_TITLE);
            let prompt = build_test_case_prompt(article, QUESTION_TYPES[request % QUESTION_TYPES.len()]);
            debug!("Requesting test case {} from {:?}", fresh.len() + 1, title);

            let response = match policy.run(|_| {
                self.model
                    .invoke(&prompt, self.settings.temperature, self.settings.max_tokens)
            }) {
                Ok(response) => response,
                Err(e) => {
                    warn!("Test case request for {:?} failed: {}", title, e);
                    continue;
                }
            };

            let Some(case) = parse_test_case(&response) else {
                warn!("Response for {:?} held no question/answer object", title);
                continue;
            };
            if !seen.insert(question_key(&case.question)) {
                debug!("Skipping duplicate question {:?}", case.question);
                continue;
            }

            fresh.push(case);
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        info!("Generated {} of {} requested test cases", fresh.len(), count);
        fresh
    }
}
