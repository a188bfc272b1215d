#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end: articles -> chunks -> index -> retrieval -> answers, against a mocked Ollama

mod common;

use common::{
    config_for, init_test_tracing, mount_embed, mount_generate, mount_tags, received_prompts,
};
use football_qa::QaError;
use football_qa::articles::Article;
use football_qa::commands::{
    build_index, chunk_corpus, evaluate, generate_tests, open_answer_generator,
    reevaluate_low_scoring,
};
use football_qa::config::Config;
use football_qa::embeddings::OllamaClient;
use football_qa::evaluation::{load_existing_test_cases, load_results};
use football_qa::generation::NO_INFORMATION_ANSWER;
use football_qa::index::IndexManifest;
use football_qa::interaction_log::InteractionLog;
use football_qa::retrieval::{PassageSource, Retriever};
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_articles(config: &Config, articles: &[Article]) {
    std::fs::write(
        config.articles_path(),
        serde_json::to_string_pretty(articles).expect("articles serialize"),
    )
    .expect("should write articles");
}

fn write_chunk_store(config: &Config, json: &str) {
    std::fs::write(config.chunk_store_path(), json).expect("should write chunk store");
}

async fn mocked_ollama(answer: &str) -> MockServer {
    let server = MockServer::start().await;
    mount_tags(&server).await;
    mount_embed(&server).await;
    mount_generate(&server, answer).await;
    server
}

fn football_articles() -> Vec<Article> {
    vec![
        Article::new(
            "World Cup final",
            "https://example.com/wc",
            "Argentina beat France on penalties to win the 2022 World Cup final in Qatar.",
        ),
        Article::new(
            "Transfer news",
            "https://example.com/transfer",
            "Liverpool signed a new goalkeeper from Brazil for a record fee.",
        ),
        Article::new(
            "Bundesliga",
            "https://example.com/bundesliga",
            "Bayern Munich lifted the Bundesliga trophy for the twelfth season in a row.",
        ),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn question_is_answered_from_indexed_articles() {
    init_test_tracing();
    let server = mocked_ollama("  Argentina won the 2022 World Cup.  ").await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, temp_dir.path());
    write_articles(&config, &football_articles());

    let store = chunk_corpus(&config, None).expect("chunking should succeed");
    assert_eq!(store.len(), 3);
    build_index(&config).await.expect("indexing should succeed");

    let manifest =
        IndexManifest::load(config.index_manifest_path()).expect("manifest should exist");
    assert_eq!(manifest.vector_count, store.len());
    assert_eq!(manifest.embedding_model, common::EMBED_MODEL);

    let generator = open_answer_generator(&config)
        .await
        .expect("generator should open");
    let answer = generator
        .generate_answer("Who won the 2022 World Cup final?")
        .await;
    assert_eq!(answer, "Argentina won the 2022 World Cup.");

    let prompts = received_prompts(&server).await;
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Argentina beat France on penalties"));
    assert!(prompts[0].contains("Who won the 2022 World Cup final?"));

    let entries = InteractionLog::new(config.interaction_log_path()).entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].question, "Who won the 2022 World Cup final?");
    assert_eq!(entries[0].generated_answer, answer);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn single_chunk_store_returns_that_chunk() {
    let server = mocked_ollama("unused").await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, temp_dir.path());
    write_chunk_store(&config, r#"[{"content": "Arsenal won the match."}]"#);

    build_index(&config).await.expect("indexing should succeed");

    let embedder = OllamaClient::new(&config).expect("Failed to create Ollama client");
    let retriever = Retriever::open(&config, Box::new(embedder))
        .await
        .expect("retriever should open");
    let passages = retriever
        .retrieve("Which club won?", 1)
        .await
        .expect("retrieval should succeed");

    assert_eq!(passages, vec!["Arsenal won the match.".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn empty_store_answers_with_sentinel_and_no_model_call() {
    let server = MockServer::start().await;
    mount_tags(&server).await;
    mount_embed(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, temp_dir.path());
    write_chunk_store(&config, "[]");

    let indexing = build_index(&config).await;
    assert!(indexing.is_err(), "an empty store cannot be indexed");

    let generator = open_answer_generator(&config)
        .await
        .expect("empty store needs no index");
    let answer = generator.generate_answer("Who won the league?").await;

    assert_eq!(answer, NO_INFORMATION_ANSWER);
    assert!(InteractionLog::new(config.interaction_log_path()).entries().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn asking_before_indexing_reports_missing_index() {
    let server = mocked_ollama("unused").await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, temp_dir.path());
    write_articles(&config, &football_articles());
    chunk_corpus(&config, None).expect("chunking should succeed");

    let error = match open_answer_generator(&config).await {
        Ok(_) => panic!("opening without an index must fail"),
        Err(e) => e,
    };
    assert!(matches!(
        error.downcast_ref::<QaError>(),
        Some(QaError::IndexNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn reindexing_keeps_rankings() {
    let server = mocked_ollama("unused").await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, temp_dir.path());
    write_articles(&config, &football_articles());
    chunk_corpus(&config, None).expect("chunking should succeed");

    let query = "Which goalkeeper did Liverpool sign?";
    let mut rankings = Vec::new();
    for _ in 0..2 {
        build_index(&config).await.expect("indexing should succeed");
        let embedder = OllamaClient::new(&config).expect("Failed to create Ollama client");
        let retriever = Retriever::open(&config, Box::new(embedder))
            .await
            .expect("retriever should open");
        rankings.push(
            retriever
                .retrieve(query, 3)
                .await
                .expect("retrieval should succeed"),
        );
    }

    assert_eq!(rankings[0].len(), 3);
    assert_eq!(rankings[0], rankings[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn evaluation_writes_scored_results() {
    let server = mocked_ollama("Argentina won the World Cup").await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, temp_dir.path());
    write_articles(&config, &football_articles());
    chunk_corpus(&config, None).expect("chunking should succeed");
    build_index(&config).await.expect("indexing should succeed");

    let cases_path = temp_dir.path().join("cases.json");
    std::fs::write(
        &cases_path,
        r#"[
            {"question": "Who won the 2022 World Cup?", "answer": "Argentina won the World Cup"},
            {"question": "Who won the Bundesliga?", "answer": "Bayern Munich"}
        ]"#,
    )
    .expect("should write test cases");

    evaluate(&config, Some(&cases_path), Some(0.5))
        .await
        .expect("evaluation should succeed");

    let results = load_results(&config.evaluation_results_path());
    assert_eq!(results.len(), 2);
    assert!((results[0].f1_score - 1.0).abs() < f64::EPSILON);
    assert!(results[1].f1_score < 0.5);
    assert_eq!(received_prompts(&server).await.len(), 2);

    reevaluate_low_scoring(&config, Some(0.5))
        .await
        .expect("re-evaluation should succeed");

    let prompts = received_prompts(&server).await;
    assert_eq!(prompts.len(), 3);
    assert!(prompts[2].contains("Who won the Bundesliga?"));
    let rerun = load_results(&config.evaluation_results_path());
    assert_eq!(rerun.len(), 2);
    assert_eq!(rerun[0], results[0]);
    assert_eq!(rerun[1].question, "Who won the Bundesliga?");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn generated_test_cases_are_appended_without_duplicates() {
    let server =
        mocked_ollama(r#"{"question": "Who won the 2022 World Cup?", "answer": "Argentina"}"#).await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, temp_dir.path());
    write_articles(&config, &football_articles());

    let run_config = config.clone();
    tokio::task::spawn_blocking(move || generate_tests(&run_config, 2, None))
        .await
        .expect("generation task should finish")
        .expect("test case generation should succeed");

    let cases = load_existing_test_cases(&config.test_cases_path()).expect("cases should load");
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].question, "Who won the 2022 World Cup?");
    assert_eq!(cases[0].answer, "Argentina");

    let prompts = received_prompts(&server).await;
    assert_eq!(prompts.len(), 6);
    assert!(prompts[0].contains("World Cup final"));
    assert!(prompts[1].contains("Transfer news"));

    let run_config = config.clone();
    tokio::task::spawn_blocking(move || generate_tests(&run_config, 1, None))
        .await
        .expect("generation task should finish")
        .expect("a run without new cases still succeeds");

    let cases = load_existing_test_cases(&config.test_cases_path()).expect("cases should load");
    assert_eq!(cases.len(), 1);
}
