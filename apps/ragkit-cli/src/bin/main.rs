//! `ragkit`: ingest text into a local corpus and answer questions over it.
//!
//! ```bash
//! ragkit init
//! ragkit post p1 "The sky is blue."
//! ragkit load ./docs
//! ragkit retrieve "what color is the sky" -k 3
//! ragkit ask "What color is the sky?" --json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use ragkit_core::config::{Config, Settings};
use ragkit_core::data_processor::DataProcessor;
use ragkit_core::splitter::TextSplitter;
use ragkit_pipeline::{ChatResponse, Pipeline, PostId, PostRequest, PostResponse, PostStatus};

#[derive(Parser)]
#[command(name = "ragkit", version, about = "Retrieval-augmented question answering over a local corpus")]
struct Cli {
    /// TOML config file. Defaults to config.toml + config.<RUST_ENV>.toml + APP_* env vars.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `data_dir`.
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the data directory to an empty index and corpus.
    Init,
    /// Ingest one post and persist.
    Post { id: String, text: String },
    /// Ingest every *.txt file under a directory, chunked, then persist.
    Load {
        dir: PathBuf,
        /// Stop after this many files.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the passages closest to a query.
    Retrieve {
        query: String,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Answer a question from the corpus.
    Ask {
        query: String,
        #[arg(short)]
        k: Option<usize>,
        /// Print the chat response envelope as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = &cli.data_dir {
        config = config.with_override("data_dir", dir);
    }
    Ok(config.settings()?)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match cli.command {
        Commands::Init => {
            Pipeline::create(&settings)?;
            println!("Initialized empty corpus in {}", settings.data_dir().display());
        }
        Commands::Post { id, text } => {
            let pipeline = Pipeline::open(&settings)?;
            let receipt = pipeline.handle_post(PostRequest { post_id: PostId::Text(id), post_text: text });
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            ensure_posted(&receipt)?;
        }
        Commands::Load { dir, limit } => {
            let pipeline = Pipeline::open(&settings)?;
            let processor = DataProcessor::new();
            let docs = match limit {
                Some(n) => processor.load_directory_limited(&dir, n)?,
                None => processor.load_directory(&dir)?,
            };
            let splitter = TextSplitter::from_settings(&settings.chunking);

            let pb = ProgressBar::new(docs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")?
                    .progress_chars("#>-"),
            );
            let mut chunks = 0;
            for doc in &docs {
                pb.set_message(doc.id.clone());
                chunks += pipeline.ingest_chunked(&doc.id, &doc.text, &splitter)?;
                pb.inc(1);
            }
            pipeline.persist()?;
            pb.finish_with_message("done");
            info!(files = docs.len(), chunks, "load finished");
            println!("Loaded {} files ({} chunks) from {}", docs.len(), chunks, dir.display());
        }
        Commands::Retrieve { query, k } => {
            let pipeline = Pipeline::open(&settings)?;
            let k = k.unwrap_or(pipeline.default_k());
            for (rank, p) in pipeline.retrieve(&query, k)?.iter().enumerate() {
                println!("{:>2}. [{}] distance={:.4}", rank + 1, p.id, p.distance);
                println!("    {}", ragkit_pipeline::preview(&p.text, settings.retrieval.preview_chars, &settings.retrieval.preview_suffix));
            }
        }
        Commands::Ask { query, k, json } => {
            let pipeline = Pipeline::open_with_generator(&settings)?;
            let k = k.unwrap_or(pipeline.default_k());
            let envelope = pipeline.answer(&query, k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ChatResponse::new(&query, envelope))?);
            } else {
                println!("{}\n", envelope.answer);
                println!("Sources:");
                for source in &envelope.sources {
                    println!("- {source}");
                }
            }
        }
    }
    Ok(())
}

/// An error receipt becomes a non-zero exit.
fn ensure_posted(receipt: &PostResponse) -> Result<()> {
    if receipt.status == PostStatus::Error {
        anyhow::bail!("post failed: {}", receipt.message);
    }
    Ok(())
}
