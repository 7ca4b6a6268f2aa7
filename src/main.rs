//! askql CLI - ask a database questions in natural language

use anyhow::Context;
use askql::config::{self, Config};
use askql::controller::{ControllerSettings, CycleEvent, CycleOutcome, RetryController};
use askql::database::{Database, SqliteDatabase};
use askql::exemplar::{self, CorpusReport, ExampleStore, MemoryExampleStore};
use askql::llm::{self, QueryGenerator};
use askql::ui::{self, Icons, Spinner, TerminalSink};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "askql")]
#[command(version)]
#[command(about = "Ask questions in natural language, get SQL and results back")]
#[command(long_about = r#"
askql turns a question into SQL with a language model, runs it, and feeds
any failure back into the next attempt until the query works or the retry
budget is spent.

Example usage:
  askql init
  askql ask "每個類別的平均銷售額是多少？"
  askql chat
  askql serve --port 8080
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./askql.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question and exit
    Ask {
        /// The question, in natural language
        question: String,

        /// Print events and outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop on stdin
    Chat,

    /// Serve the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show the schema description sent to the model
    Schema,

    /// Inspect the exemplar corpus
    Exemplars {
        /// Rank exemplars against this question instead of listing the corpus report
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum number of ranked exemplars
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Write a config template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct JsonReport<'a> {
    events: &'a [CycleEvent],
    outcome: Option<&'a CycleOutcome>,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with results
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("askql=debug,tower_http=debug")
        } else {
            EnvFilter::new("askql=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            let path = cli.config.clone().unwrap_or_else(config::default_config_path);
            config::write_config(&path, &config::FileConfig::template(), force)?;
            ui::success(&format!("Wrote {}", path.display()));
        }

        Commands::Schema => {
            let config = Config::load(config_path)?;
            let database = SqliteDatabase::connect(&config.database_url, config.sample_rows)?;
            let schema = database.describe_schema()?;
            if schema.is_empty() {
                ui::warn("The database has no tables");
            }
            println!("{}", schema.render().trim());
        }

        Commands::Exemplars { query, limit } => {
            let config = Config::load(config_path)?;
            let (store, report) = build_store(&config).await?;
            match query {
                Some(q) => {
                    let ranked = store.nearest(&q, limit).await?;
                    if ranked.is_empty() {
                        ui::warn("No exemplars indexed");
                    } else {
                        println!("{}", ui::exemplar_table(&ranked));
                    }
                }
                None => {
                    ui::status(Icons::STATS, "Corpus", &config.corpus_dir.display().to_string());
                    println!("{}", ui::stats_table(&corpus_stats(&report, store.len())));
                }
            }
        }

        Commands::Ask { question, json } => {
            let config = Config::load(config_path)?;
            let controller = build_controller(&config).await?;

            if json {
                let mut events = Vec::new();
                let result = controller.ask(&question, &mut events).await;
                let report = JsonReport {
                    events: &events,
                    outcome: result.as_ref().ok(),
                    error: result.as_ref().err().map(|e| e.to_string()),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
                if !matches!(result, Ok(CycleOutcome::Answered { .. })) {
                    std::process::exit(1);
                }
            } else {
                let mut sink = TerminalSink::new();
                let result = controller.ask(&question, &mut sink).await;
                sink.finish();
                // failures were already shown through the sink
                if !matches!(result, Ok(CycleOutcome::Answered { .. })) {
                    std::process::exit(1);
                }
            }
        }

        Commands::Chat => {
            let config = Config::load(config_path)?;
            let controller = build_controller(&config).await?;
            run_chat(&controller).await?;
        }

        Commands::Serve { port } => {
            let config = Config::load(config_path)?;
            let controller = build_controller(&config).await?;
            askql::server::start_server(port, controller).await?;
        }
    }

    Ok(())
}

/// Load the corpus and index it with the configured embedder
async fn build_store(config: &Config) -> anyhow::Result<(Arc<dyn ExampleStore>, CorpusReport)> {
    let embedder = exemplar::embedding::from_config(&config.embedding, config.request_timeout)?;
    let (corpus, report) = exemplar::load_corpus(&config.corpus_dir)?;
    tracing::info!("Corpus {}: {}", config.corpus_dir.display(), report);
    if report.skipped_documents > 0 || report.skipped_entries > 0 {
        ui::warn(&format!("Some exemplars were skipped: {}", report));
    }

    let mut store = MemoryExampleStore::new(embedder);
    if !corpus.is_empty() {
        let spinner = Spinner::new(&format!("Indexing {} exemplars...", corpus.len()));
        let added = store
            .index(corpus)
            .await
            .context("failed to embed the exemplar corpus")?;
        spinner.finish_and_clear();
        tracing::info!("Indexed {} exemplars", added);
    }
    Ok((Arc::new(store), report))
}

fn corpus_stats(report: &CorpusReport, indexed: usize) -> Vec<(&'static str, String)> {
    vec![
        ("Documents", report.documents.to_string()),
        ("Entries", report.entries.to_string()),
        ("Skipped entries", report.skipped_entries.to_string()),
        ("Skipped documents", report.skipped_documents.to_string()),
        ("Indexed", indexed.to_string()),
    ]
}

async fn build_controller(config: &Config) -> anyhow::Result<RetryController> {
    let database = SqliteDatabase::connect(&config.database_url, config.sample_rows)?;
    let schema = database.describe_schema()?;
    if schema.is_empty() {
        ui::warn("The database has no tables; every question will fail");
    }

    let model = llm::from_config(&config.llm, config.request_timeout)?;
    let (examples, _) = build_store(config).await?;
    tracing::info!(
        "Using {} ({}) with {} exemplars",
        config.llm.kind(),
        config.llm.model(),
        examples.len()
    );

    Ok(RetryController::new(
        Arc::new(schema),
        examples,
        QueryGenerator::new(model),
        Arc::new(database),
        ControllerSettings::from(config),
    ))
}

async fn run_chat(controller: &RetryController) -> anyhow::Result<()> {
    ui::header("askql chat");
    ui::summary_row("Model:", controller.provider_name());
    ui::summary_row("Exemplars:", &controller.examples().len().to_string());
    println!("{}", ui::muted("Type a question, or `exit` to quit."));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let mut sink = TerminalSink::new();
        if let Err(e) = controller.ask(question, &mut sink).await {
            tracing::debug!("Cycle ended with error: {}", e);
        }
        sink.finish();
    }

    Ok(())
}
