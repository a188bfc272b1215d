// Evaluation module
// Scores generated answers against reference answers with token-set F1


pub mod test_cases;

use anyhow::Context;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::Result;
use crate::generation::AnswerGenerator;

pub use test_cases::{
    TestCaseGenerator, append_test_cases, load_existing_test_cases, parse_test_case,
};

pub const DEFAULT_LOW_SCORE_THRESHOLD: f64 = 0.1;

/// A question with its reference answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub question: String,
    pub ground_truth: String,
    pub generated_answer: String,
    pub f1_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    pub cases: usize,
    pub mean_f1: f64,
    pub low_scoring: usize,
    pub threshold: f64,
}

/// Load test cases from a JSON array of `{question, answer}` objects
#[inline]
pub fn load_test_cases(path: &Path) -> anyhow::Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read test cases from {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse test cases")
}

/// F1 over the sets of lower-cased whitespace-separated tokens
#[inline]
pub fn token_f1(reference: &str, candidate: &str) -> f64 {
    let reference_tokens: HashSet<String> =
        reference.split_whitespace().map(str::to_lowercase).collect();
    let candidate_tokens: HashSet<String> =
        candidate.split_whitespace().map(str::to_lowercase).collect();

    if reference_tokens.is_empty() || candidate_tokens.is_empty() {
        return 0.0;
    }

    let common = reference_tokens.intersection(&candidate_tokens).count() as f64;
    if common == 0.0 {
        return 0.0;
    }

    let precision = common / candidate_tokens.len() as f64;
    let recall = common / reference_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Previously stored results; missing or malformed files read as empty
#[inline]
pub fn load_results(path: &Path) -> Vec<EvaluationResult> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Evaluation results {} are malformed, starting fresh: {}", path.display(), e);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

/// Stored results scoring below `threshold`, turned back into test cases
#[inline]
pub fn low_scoring_cases(results: &[EvaluationResult], threshold: f64) -> Vec<TestCase> {
    results
        .iter()
        .filter(|r| r.f1_score < threshold)
        .map(|r| TestCase {
            question: r.question.clone(),
            answer: r.ground_truth.clone(),
        })
        .collect()
}

pub struct Evaluator<'a> {
    generator: &'a AnswerGenerator,
    results_path: PathBuf,
    threshold: f64,
    progress: ProgressBar,
}

impl<'a> Evaluator<'a> {
    #[inline]
    pub fn new<P: AsRef<Path>>(generator: &'a AnswerGenerator, results_path: P) -> Self {
        Self {
            generator,
            results_path: results_path.as_ref().to_path_buf(),
            threshold: DEFAULT_LOW_SCORE_THRESHOLD,
            progress: ProgressBar::hidden(),
        }
    }

    #[inline]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    #[inline]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Answer every case, merge the scores into the results file and summarise.
    ///
    /// A stored result for the same question is replaced; others are kept.
    #[inline]
    pub async fn run(&self, cases: &[TestCase]) -> Result<EvaluationSummary> {
        self.progress.set_length(cases.len() as u64);

        let mut fresh = Vec::with_capacity(cases.len());
        for case in cases {
            self.progress.set_message(case.question.clone());
            let generated_answer = self.generator.generate_answer(&case.question).await;
            let f1_score = token_f1(&case.answer, &generated_answer);

            fresh.push(EvaluationResult {
                question: case.question.clone(),
                ground_truth: case.answer.clone(),
                generated_answer,
                f1_score,
            });
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        let summary = self.summarise(&fresh);
        self.store(fresh)?;

        info!(
            "Evaluated {} cases: mean F1 {:.3}, {} below {}",
            summary.cases, summary.mean_f1, summary.low_scoring, summary.threshold
        );
        Ok(summary)
    }

    /// Answer again only the stored results below the threshold and merge them back
    #[inline]
    pub async fn rerun_low_scoring(&self) -> Result<EvaluationSummary> {
        let cases = low_scoring_cases(&load_results(&self.results_path), self.threshold);
        info!(
            "Re-evaluating {} stored results below {}",
            cases.len(),
            self.threshold
        );
        self.run(&cases).await
    }

    fn summarise(&self, results: &[EvaluationResult]) -> EvaluationSummary {
        let mean_f1 = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.f1_score).sum::<f64>() / results.len() as f64
        };

        EvaluationSummary {
            cases: results.len(),
            mean_f1,
            low_scoring: results
                .iter()
                .filter(|r| r.f1_score < self.threshold)
                .count(),
            threshold: self.threshold,
        }
    }

    fn store(&self, fresh: Vec<EvaluationResult>) -> Result<()> {
        let mut results = load_results(&self.results_path);
        for result in fresh {
            match results.iter_mut().find(|r| r.question == result.question) {
                Some(existing) => *existing = result,
                None => results.push(result),
            }
        }

        if let Some(parent) = self.results_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.results_path, serde_json::to_string_pretty(&results)?)?;
        Ok(())
    }
}
