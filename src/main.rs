//! CLI entry point for `replydraft`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use replydraft::config::{self, Config};
use replydraft::corpus::extract::{self, ExtractOptions};
use replydraft::corpus::Corpus;
use replydraft::embedding::{self, EmbeddingProvider};
use replydraft::generation::{GenerationClient, OllamaBackend, PromptTemplate};
use replydraft::index::builder::{self, IndexOrigin};
use replydraft::index::VectorIndex;
use replydraft::pipeline::DraftPipeline;
use replydraft::poll::PollLoop;
use replydraft::retrieval::{ContextStrategy, RecentContext, VectorContext};
use replydraft::store::{MailStore, MaildirStore};

#[derive(Parser)]
#[command(
    name = "replydraft",
    version,
    about = "Draft replies to unread mail, grounded in your sent mail"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Maildir root (overrides mail.root)
    #[arg(long, global = true, value_name = "DIR", env = "REPLYDRAFT_MAILDIR")]
    maildir: Option<PathBuf>,

    /// Corpus JSON file (overrides corpus.path)
    #[arg(long, global = true, value_name = "FILE")]
    corpus: Option<PathBuf>,

    /// Address drafts are sent as (overrides mail.send_as)
    #[arg(long, global = true, value_name = "ADDRESS")]
    send_as: Option<String>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the inbox and draft replies until interrupted
    Run,
    /// Run a single poll cycle and exit
    Once,
    /// Build or refresh the vector index over the corpus
    Index {
        /// Rebuild even if the stored index matches the corpus
        #[arg(short, long)]
        force: bool,
    },
    /// Build the corpus from an MBOX export of sent mail
    Extract {
        /// MBOX file with sent messages
        mbox: PathBuf,
        /// Output file (defaults to the configured corpus path)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep at most this many messages
        #[arg(long, default_value_t = 50)]
        max_items: usize,
        /// Only keep messages from the last N days
        #[arg(long, default_value_t = 30)]
        days_back: i64,
    },
    /// Show the corpus items nearest to a query
    Search {
        query: String,
        /// Number of results (defaults to retrieval.k)
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();
    if let Some(dir) = cli.maildir {
        config.mail.root = Some(dir);
    }
    if let Some(path) = cli.corpus {
        config.corpus.path = Some(path);
    }
    if let Some(address) = cli.send_as {
        config.mail.send_as = address;
    }

    // Configure logging: stderr + log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Run => cmd_run(&config).await,
        Commands::Once => cmd_once(&config).await,
        Commands::Index { force } => cmd_index(&config, force).await,
        Commands::Extract {
            mbox,
            output,
            max_items,
            days_back,
        } => cmd_extract(&config, &mbox, output, max_items, days_back),
        Commands::Search { query, k, json } => cmd_search(&config, &query, k, json).await,
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = log_path.parent().unwrap_or(Path::new("."));
    let log_name = log_path.file_name().unwrap_or_default();
    if std::fs::create_dir_all(log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Poll until Ctrl-C.
async fn cmd_run(config: &Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping after the current step");
                cancel.cancel();
            }
        }
    });

    let summary = PollLoop::new(config.poll.delay_policy(), cancel)
        .run(&pipeline)
        .await;

    println!();
    println!("  {:<20} {}", "Cycles", summary.cycles);
    println!("  {:<20} {}", "Failed cycles", summary.failed_cycles);
    println!("  {:<20} {}", "Drafts written", summary.processed);
    println!("  {:<20} {}", "Items failed", summary.failed);
    println!();
    Ok(())
}

/// Run one cycle and report.
async fn cmd_once(config: &Config) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config).await?;
    let report = pipeline.run_cycle().await?;

    println!();
    println!("  {:<20} {}", "Drafts written", report.processed);
    println!("  {:<20} {}", "Items failed", report.failed);
    println!();
    Ok(())
}

/// Reconcile or rebuild the index and print statistics.
async fn cmd_index(config: &Config, force: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let corpus_path = config::corpus_path(config);
    let index_path = config::index_path(config);
    let corpus = Corpus::load(&corpus_path)?;
    let provider = build_provider(config)?;

    let start = Instant::now();
    let (index, origin) = open_index(config, &corpus, provider.as_ref(), force).await?;
    let elapsed = start.elapsed();

    let origin = match origin {
        IndexOrigin::Loaded => "loaded, up to date".to_string(),
        IndexOrigin::Extended { added } => format!("extended by {added} item(s)"),
        IndexOrigin::Built { reason } => format!("built ({reason})"),
    };

    println!();
    println!("  {:<20} {}", "Corpus", corpus_path.display());
    println!("  {:<20} {}", "Items", corpus.len());
    println!("  {:<20} {}", "Provider", provider.name());
    println!("  {:<20} {}", "Dimension", index.dimension());
    println!("  {:<20} {}", "Index", index_path.display());
    println!(
        "  {:<20} {}",
        "Index size",
        format_size(builder::index_file_size(&index_path), BINARY)
    );
    println!("  {:<20} {}", "Status", origin);
    println!("  {:<20} {:.2?}", "Time", elapsed);
    println!();
    Ok(())
}

/// Extract sent mail from an MBOX file into the corpus file.
fn cmd_extract(
    config: &Config,
    mbox: &Path,
    output: Option<PathBuf>,
    max_items: usize,
    days_back: i64,
) -> anyhow::Result<()> {
    if !mbox.exists() {
        anyhow::bail!("File not found: {}", mbox.display());
    }

    let items = extract::extract_sent(
        mbox,
        ExtractOptions {
            max_items,
            days_back,
        },
        chrono::Utc::now(),
    )?;
    let corpus = Corpus::new(items);

    let output = output.unwrap_or_else(|| config::corpus_path(config));
    corpus.save(&output)?;

    println!(
        "  Extracted {} message(s) to {}",
        corpus.len(),
        output.display()
    );
    Ok(())
}

/// Print the corpus items nearest to `query`.
async fn cmd_search(config: &Config, query: &str, k: Option<usize>, json: bool) -> anyhow::Result<()> {
    let corpus = Corpus::load(&config::corpus_path(config))?;
    let provider = build_provider(config)?;
    let (index, _) = open_index(config, &corpus, provider.as_ref(), false).await?;

    let k = k.unwrap_or(config.retrieval.k);
    let context = VectorContext::new(corpus, index, provider, k, config.retrieval.excerpt_chars)?;
    let retrieved = context.retrieve(query).await?;

    if json {
        let results: Vec<serde_json::Value> = retrieved
            .hits
            .iter()
            .enumerate()
            .map(|(rank, (item, distance))| {
                serde_json::json!({
                    "rank": rank + 1,
                    "id": item.id,
                    "distance": distance,
                    "subject": item.subject,
                    "recipient": item.recipient,
                    "sent_at": item.sent_at,
                })
            })
            .collect();
        let output = serde_json::json!({
            "result_count": results.len(),
            "results": results,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {} result(s)", retrieved.len());
    println!();
    if retrieved.is_empty() {
        return Ok(());
    }
    println!(
        "  {:<4} {:>9} {:<19} {:<25} {:<40}",
        "#", "Distance", "Sent", "To", "Subject"
    );
    println!("  {}", "-".repeat(101));
    for (rank, (item, distance)) in retrieved.hits.iter().enumerate() {
        let to: String = item.recipient.chars().take(24).collect();
        let subject: String = item.subject.chars().take(39).collect();
        let sent: String = item.sent_at.chars().take(19).collect();
        println!(
            "  {:<4} {:>9.4} {:<19} {:<25} {:<40}",
            rank + 1,
            distance,
            sent,
            to,
            subject
        );
    }
    println!();
    Ok(())
}

// ── Wiring ──────────────────────────────────────────────────────

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::from(embedding::from_config(&config.embedding)?))
}

/// Load or build the index with a progress bar for the embedding pass.
async fn open_index(
    config: &Config,
    corpus: &Corpus,
    provider: &dyn EmbeddingProvider,
    force: bool,
) -> anyhow::Result<(VectorIndex, IndexOrigin)> {
    let pb = ProgressBar::new(corpus.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Embedding corpus [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let result = builder::open_or_build(
        &config::index_path(config),
        corpus,
        provider,
        force,
        Some(&|done, total| {
            pb.set_length(total);
            pb.set_position(done);
        }),
    )
    .await;
    pb.finish_and_clear();

    Ok(result?)
}

async fn build_context(
    config: &Config,
    corpus: Corpus,
) -> anyhow::Result<Box<dyn ContextStrategy>> {
    let retrieval = &config.retrieval;
    match retrieval.strategy.as_str() {
        "vector" => {
            let provider = build_provider(config)?;
            let (index, _) = open_index(config, &corpus, provider.as_ref(), false).await?;
            Ok(Box::new(VectorContext::new(
                corpus,
                index,
                provider,
                retrieval.k,
                retrieval.excerpt_chars,
            )?))
        }
        "recent" => Ok(Box::new(RecentContext::new(
            corpus,
            retrieval.k,
            retrieval.excerpt_chars,
        ))),
        other => anyhow::bail!("Unknown retrieval strategy '{other}'. Supported: vector, recent"),
    }
}

async fn build_generator(config: &Config) -> anyhow::Result<GenerationClient> {
    let generation = &config.generation;
    let backend = OllamaBackend::new(
        &generation.base_url,
        Duration::from_secs(generation.timeout_secs),
    )?;

    if let Some(base_model) = &generation.base_model {
        if let Err(e) = backend
            .create_model(&generation.model, base_model, &generation.system_prompt)
            .await
        {
            tracing::warn!(error = %e, model = %generation.model, "Could not create assistant model");
        }
    }

    Ok(GenerationClient::new(Box::new(backend), generation.model.clone()))
}

async fn build_pipeline(config: &Config) -> anyhow::Result<DraftPipeline> {
    if config.mail.send_as.is_empty() {
        anyhow::bail!("No sender identity configured: set mail.send_as or pass --send-as");
    }

    let root = config::mail_root(config);
    let store: Arc<dyn MailStore> = Arc::new(
        MaildirStore::open(&root, &config.mail.drafts_folder, config.mail.max_body_chars)
            .with_context(|| format!("Cannot open mail store at {}", root.display()))?,
    );

    let corpus_path = config::corpus_path(config);
    let corpus = Corpus::load(&corpus_path)?;
    if corpus.is_empty() {
        tracing::warn!(path = %corpus_path.display(), "Corpus is empty, replies will have no context");
    }

    let context = build_context(config, corpus).await?;
    let generator = build_generator(config).await?;
    let template = PromptTemplate {
        system: config.generation.system_prompt.clone(),
        instructions: config.generation.instructions.clone(),
        send_as: config.mail.send_as.clone(),
    };

    tracing::info!(
        maildir = %root.display(),
        inbox = %config.mail.inbox_folder,
        strategy = context.name(),
        model = generator.model(),
        "Pipeline ready"
    );

    Ok(DraftPipeline::new(
        store,
        context,
        generator,
        template,
        config.mail.inbox_folder.clone(),
    ))
}
