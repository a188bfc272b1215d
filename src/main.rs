use std::path::PathBuf;

use clap::{Parser, Subcommand};
use football_qa::commands::{
    ask, build_index, chat, chunk_corpus, evaluate, generate_tests, reevaluate_low_scoring,
    show_history, show_status,
};
use football_qa::config::{Config, resolve_data_dir, run_interactive_config, show_config};
use football_qa::{QaError, Result};

#[derive(Parser)]
#[command(name = "football-qa")]
#[command(about = "Retrieval-augmented question answering over football news articles")]
#[command(version)]
struct Cli {
    /// Data directory holding config, articles, chunks, index and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and answering settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Split scraped articles into the chunk store
    Chunk {
        /// Articles JSON file, defaults to articles.json in the data directory
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Embed the chunk store and rebuild the vector index
    Index,
    /// Answer a single question
    Ask {
        question: String,
        /// Number of passages to retrieve as context
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Answer questions interactively until "exit"
    Chat,
    /// Show recently answered questions
    History {
        /// Number of entries to show
        #[arg(long, default_value_t = 5)]
        last: usize,
    },
    /// Show detailed status of the pipeline
    Status,
    /// Score answers against a JSON file of test cases
    Evaluate {
        /// JSON array of {"question", "answer"} objects, defaults to test_cases.json in the data directory
        test_cases: Option<PathBuf>,
        /// F1 score below which an answer counts as low-scoring
        #[arg(long)]
        threshold: Option<f64>,
        /// Only answer again the stored results that scored below the threshold
        #[arg(long, conflicts_with = "test_cases")]
        low_scoring_only: bool,
    },
    /// Have the generation model write new test cases from the scraped articles
    GenerateTests {
        /// Number of new test cases to add
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Test case file to append to, defaults to test_cases.json in the data directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir).map_err(|e| QaError::Config(e.to_string()))?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&data_dir)?;
        } else {
            run_interactive_config(&data_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&data_dir)?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Chunk { input } => {
            chunk_corpus(&config, input.as_deref())?;
        }
        Commands::Index => {
            build_index(&config).await?;
        }
        Commands::Ask { question, top_k } => {
            ask(&config, &question, top_k).await?;
        }
        Commands::Chat => {
            chat(&config).await?;
        }
        Commands::History { last } => {
            show_history(&config, last)?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Evaluate {
            test_cases,
            threshold,
            low_scoring_only,
        } => {
            if low_scoring_only {
                reevaluate_low_scoring(&config, threshold).await?;
            } else {
                evaluate(&config, test_cases.as_deref(), threshold).await?;
            }
        }
        Commands::GenerateTests { count, output } => {
            generate_tests(&config, count, output.as_deref())?;
        }
    }

    Ok(())
}
