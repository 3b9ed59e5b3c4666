use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tfidf_core::corpus::{CorpusLocation, CorpusSizeProbe};
use tfidf_core::persist::StagePaths;
use tfidf_core::stages::{rank, search, term_frequency, tfidf, word_count};
use tfidf_core::{CorpusSize, DocumentScore, Engine, Pipeline, PipelineConfig, Query};
use tracing_subscriber::{fmt, EnvFilter};

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tfidf")]
#[command(about = "Batch TF-IDF indexing and ranked search over a text corpus", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// JSON config file; flags given on the command line win
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Worker threads
    #[arg(long, global = true, env = "TFIDF_WORKERS")]
    workers: Option<usize>,
    /// Reduce partitions (part files per stage output)
    #[arg(long, global = true, env = "TFIDF_PARTITIONS")]
    partitions: Option<usize>,
    /// Replace existing stage outputs
    #[arg(long, global = true, default_value_t = false)]
    overwrite: bool,
    /// Also read documents from subdirectories of the corpus
    #[arg(long, global = true, default_value_t = false)]
    recursive: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Raw per-document word counts (not part of the scoring pipeline)
    WordCount {
        /// Corpus directory or file
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Log-scaled term frequency per (term, document)
    TermFrequency {
        /// Corpus directory or file
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the number of documents in a corpus
    CorpusSize {
        #[arg(long)]
        input: PathBuf,
    },
    /// TF-IDF scores from a term-frequency output
    TfIdf {
        /// Term-frequency output directory
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Corpus size N, as printed by `corpus-size`
        #[arg(long)]
        num_docs: u64,
    },
    /// Per-document scores for a query from a TF-IDF output
    Search {
        /// TF-IDF output directory
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// Order search results by descending score
    Rank {
        /// Search output directory
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Run every stage and print the ranked documents
    Run {
        /// Corpus directory or file
        #[arg(long)]
        input: PathBuf,
        /// Directory receiving one output directory per stage
        #[arg(long)]
        work_dir: PathBuf,
        #[arg(long)]
        top_k: Option<usize>,
        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();
    let mut config = load_config(&cli.global)?;

    match cli.command {
        Commands::WordCount { input, output } => {
            let engine = Engine::new(&config.engine)?;
            let corpus = CorpusLocation::new(input).recursive(config.recursive);
            let manifest = word_count::run(&engine, &corpus, &StagePaths::new(output), config.overwrite)?;
            tracing::info!(records = manifest.records, "word count complete");
        }
        Commands::TermFrequency { input, output } => {
            let engine = Engine::new(&config.engine)?;
            let corpus = CorpusLocation::new(input).recursive(config.recursive);
            let manifest = term_frequency::run(&engine, &corpus, &StagePaths::new(output), config.overwrite)?;
            tracing::info!(records = manifest.records, "term frequency complete");
        }
        Commands::CorpusSize { input } => {
            let corpus = CorpusLocation::new(input).recursive(config.recursive);
            let n = CorpusSizeProbe::probe(&corpus).context("corpus-size stage failed")?;
            println!("{}", n.get());
        }
        Commands::TfIdf { input, output, num_docs } => {
            let engine = Engine::new(&config.engine)?;
            let manifest =
                tfidf::run(&engine, &StagePaths::new(input), &StagePaths::new(output), CorpusSize(num_docs), config.overwrite)?;
            tracing::info!(records = manifest.records, num_docs, "tf-idf complete");
        }
        Commands::Search { input, output, terms } => {
            let query = Query::parse(&terms)?;
            let engine = Engine::new(&config.engine)?;
            let manifest = search::run(&engine, &StagePaths::new(input), &StagePaths::new(output), &query, config.overwrite)?;
            tracing::info!(documents = manifest.records, "search complete");
        }
        Commands::Rank { input, output, top_k } => {
            let engine = Engine::new(&config.engine)?;
            let top_k = top_k.or(config.top_k);
            let ranked = rank::run(&engine, &StagePaths::new(input), &StagePaths::new(output), top_k, config.overwrite)?;
            tracing::info!(documents = ranked.len(), "rank complete");
        }
        Commands::Run { input, work_dir, top_k, terms } => {
            let query = Query::parse(&terms)?;
            if top_k.is_some() {
                config.top_k = top_k;
            }
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.run(&input, &work_dir, &query)?;
            tracing::info!(num_docs = report.num_docs.get(), work_dir = %report.work_dir.display(), "pipeline complete");
            print_ranked(&report.ranked)?;
        }
    }
    Ok(())
}

fn load_config(args: &GlobalArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.engine.workers = workers;
    }
    if let Some(partitions) = args.partitions {
        config.engine.partitions = partitions;
    }
    config.overwrite |= args.overwrite;
    config.recursive |= args.recursive;
    config.validate()?;
    Ok(config)
}

fn print_ranked(ranked: &[DocumentScore]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for doc in ranked {
        writeln!(out, "{doc}")?;
    }
    out.flush()?;
    Ok(())
}
