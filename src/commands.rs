
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::articles::load_articles;
use crate::config::Config;
use crate::embeddings::chunking::chunk_articles;
use crate::embeddings::ollama::{OllamaClient, model_matches};
use crate::evaluation::{
    EvaluationSummary, Evaluator, TestCaseGenerator, append_test_cases, load_existing_test_cases,
    load_test_cases,
};
use crate::generation::{AnswerGenerator, OllamaGenerator};
use crate::index::{IndexManifest, VectorStore};
use crate::indexer::{ConsistencyReport, Indexer};
use crate::interaction_log::InteractionLog;
use crate::retrieval::Retriever;
use crate::store::ChunkStore;

fn progress_bar(template: &str) -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template(template).expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    }
}

/// Split scraped articles into the persisted chunk store
#[inline]
pub fn chunk_corpus(config: &Config, input: Option<&Path>) -> Result<ChunkStore> {
    let articles_path = input.map_or_else(|| config.articles_path(), Path::to_path_buf);
    info!("Chunking articles from {}", articles_path.display());

    let articles = load_articles(&articles_path)?;
    let outcome = chunk_articles(&articles, &config.chunking);

    let store = ChunkStore::new(outcome.chunks);
    store
        .save(&config.chunk_store_path())
        .context("Failed to save chunk store")?;

    println!(
        "Chunked {} articles into {} chunks",
        articles.len() - outcome.skipped.len(),
        store.len()
    );
    if !outcome.skipped.is_empty() {
        println!("Skipped {} articles without content:", outcome.skipped.len());
        for title in &outcome.skipped {
            println!("   - {}", title);
        }
    }
    println!("Chunk store: {}", config.chunk_store_path().display());

    Ok(store)
}

/// Embed the chunk store and rebuild the vector index
#[inline]
pub async fn build_index(config: &Config) -> Result<()> {
    let store = ChunkStore::load(&config.chunk_store_path())?;

    let client = OllamaClient::new(config).context("Failed to initialize Ollama client")?;
    client
        .health_check()
        .context("Ollama is not ready for embedding")?;

    let report = Indexer::new(config, &client)
        .with_progress(progress_bar("{bar:40} [{pos}/{len}] Embedding chunks"))
        .build(&store)
        .await?;

    println!(
        "Indexed {} chunks ({} dimensions, {}) in {:.1?}",
        report.vector_count, report.dimension, report.embedding_model, report.elapsed
    );
    Ok(())
}

/// Wire retrieval, the generation model and the interaction log together
#[inline]
pub async fn open_answer_generator(config: &Config) -> Result<AnswerGenerator> {
    let embedder = OllamaClient::new(config).context("Failed to initialize Ollama client")?;
    let retriever = Retriever::open(config, Box::new(embedder)).await?;
    let model = OllamaGenerator::new(config).context("Failed to initialize generation model")?;

    Ok(
        AnswerGenerator::new(config, Box::new(retriever), Box::new(model))
            .with_log(InteractionLog::new(config.interaction_log_path())),
    )
}

/// Answer a single question
#[inline]
pub async fn ask(config: &Config, question: &str, top_k: Option<usize>) -> Result<()> {
    let mut generator = open_answer_generator(config).await?;
    if let Some(top_k) = top_k {
        generator = generator.with_top_k(top_k);
    }

    println!("{}", generator.generate_answer(question).await);
    Ok(())
}

/// Answer questions read line by line until `exit` or end of input
#[inline]
pub async fn chat(config: &Config) -> Result<()> {
    let generator = open_answer_generator(config).await?;
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        eprint!("Ask a football question (or type 'exit' to quit): ");
        std::io::stderr().flush().ok();

        let Some(line) = lines.next() else {
            break;
        };
        let question = line.context("Failed to read question")?;
        let question = question.trim();

        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        println!("\nAnswer: {}\n", generator.generate_answer(question).await);
    }

    Ok(())
}

/// Print the most recent interactions, oldest first
#[inline]
pub fn show_history(config: &Config, last: usize) -> Result<()> {
    let log = InteractionLog::new(config.interaction_log_path());
    let entries = log.recent(last);

    if entries.is_empty() {
        println!("No questions have been answered yet.");
        println!("Use 'football-qa ask <question>' to ask one.");
        return Ok(());
    }

    println!("Recent questions ({} shown):", entries.len());
    println!();
    for entry in &entries {
        println!("🕒 {}", entry.timestamp);
        println!("   Q: {}", entry.question);
        println!("   A: {}", entry.generated_answer);
        println!();
    }
    Ok(())
}

/// Run the evaluation suite and report aggregate scores
#[inline]
pub async fn evaluate(
    config: &Config,
    test_cases: Option<&Path>,
    threshold: Option<f64>,
) -> Result<()> {
    let test_cases = test_cases.map_or_else(|| config.test_cases_path(), Path::to_path_buf);
    let cases = load_test_cases(&test_cases)?;
    let generator = open_answer_generator(config).await?;

    let summary = evaluator(config, &generator, threshold).run(&cases).await?;

    println!("Evaluated {} test cases", summary.cases);
    print_summary(config, &summary);
    Ok(())
}

/// Answer again only the stored results that scored below the threshold
#[inline]
pub async fn reevaluate_low_scoring(config: &Config, threshold: Option<f64>) -> Result<()> {
    let generator = open_answer_generator(config).await?;

    let summary = evaluator(config, &generator, threshold)
        .rerun_low_scoring()
        .await?;

    if summary.cases == 0 {
        println!("No stored results below {:.2}", summary.threshold);
        return Ok(());
    }
    println!("Re-evaluated {} low-scoring test cases", summary.cases);
    print_summary(config, &summary);
    Ok(())
}

fn evaluator<'a>(
    config: &Config,
    generator: &'a AnswerGenerator,
    threshold: Option<f64>,
) -> Evaluator<'a> {
    let evaluator = Evaluator::new(generator, config.evaluation_results_path())
        .with_progress(progress_bar("{bar:40} [{pos}/{len}] {msg}"));
    match threshold {
        Some(threshold) => evaluator.with_threshold(threshold),
        None => evaluator,
    }
}

fn print_summary(config: &Config, summary: &EvaluationSummary) {
    println!("   Mean F1: {:.3}", summary.mean_f1);
    println!(
        "   Below {:.2}: {}",
        summary.threshold, summary.low_scoring
    );
    println!("Results: {}", config.evaluation_results_path().display());
}

/// Have the generation model write new test cases from the scraped articles
#[inline]
pub fn generate_tests(config: &Config, count: usize, output: Option<&Path>) -> Result<()> {
    let output = output.map_or_else(|| config.test_cases_path(), Path::to_path_buf);
    let articles = load_articles(&config.articles_path())?;
    let existing = load_existing_test_cases(&output)?;
    let model = OllamaGenerator::new(config).context("Failed to initialize generation model")?;

    let fresh = TestCaseGenerator::new(config, &model)
        .with_progress(progress_bar("{bar:40} [{pos}/{len}] Generating test cases"))
        .generate(&articles, &existing, count);

    if fresh.is_empty() {
        println!("No new test cases were generated.");
        return Ok(());
    }

    let total = append_test_cases(&output, &fresh)?;
    println!(
        "Added {} new test cases ({} total)",
        fresh.len(),
        total
    );
    println!("Test cases: {}", output.display());
    Ok(())
}

/// Show detailed status of the question-answering pipeline
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Football QA Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📁 Data Directory: {}", config.get_base_dir().display());
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(config).and_then(|client| client.list_models()) {
        Ok(models) => {
            println!(
                "   ✅ Ollama: Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
            for (role, wanted) in [
                ("Embedding", &config.ollama.embedding_model),
                ("Generation", &config.ollama.generation_model),
            ] {
                if models.iter().any(|m| model_matches(&m.name, wanted)) {
                    println!("   ✅ {} model: {}", role, wanted);
                } else {
                    println!("   ⚠️  {} model not pulled: {}", role, wanted);
                }
            }
        }
        Err(e) => {
            println!("   ❌ Ollama: Failed to connect - {:#}", e);
        }
    }

    println!();
    println!("📚 Chunk Store:");
    let store = match ChunkStore::load(&config.chunk_store_path()) {
        Ok(store) => {
            println!("   📊 Chunks: {}", store.len());
            Some(store)
        }
        Err(e) => {
            println!("   ❌ {}", e);
            None
        }
    };

    println!();
    println!("🔍 Vector Index:");
    match IndexManifest::load(config.index_manifest_path()) {
        Ok(manifest) => {
            println!("   📋 Model: {}", manifest.embedding_model);
            println!("   🔢 Dimension: {}", manifest.dimension);
            println!("   📊 Vectors: {}", manifest.vector_count);
            println!(
                "   🕒 Built: {}",
                manifest.built_at.format("%Y-%m-%d %H:%M:%S")
            );
            if manifest.embedding_model != config.ollama.embedding_model {
                println!(
                    "   ⚠️  Configured embedding model is {}, re-run `football-qa index`",
                    config.ollama.embedding_model
                );
            }
        }
        Err(e) => println!("   ❌ {}", e),
    }

    if let Some(store) = store {
        match VectorStore::open(&config.vector_database_path()).await {
            Ok(index) => match ConsistencyReport::check(&store, &index).await {
                Ok(report) if report.is_consistent => {
                    println!("   ✅ {}", report.summary());
                }
                Ok(report) => {
                    println!("   ⚠️  {}", report.summary());
                    println!("   Re-run `football-qa index` to rebuild the index");
                }
                Err(e) => println!("   ⚠️  Consistency check failed - {}", e),
            },
            Err(e) => warn!("Skipping consistency check: {}", e),
        }
    }

    println!();
    println!("💬 Interactions:");
    let log = InteractionLog::new(config.interaction_log_path());
    println!("   📊 Logged answers: {}", log.entries().len());

    Ok(())
}
