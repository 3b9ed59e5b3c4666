//! Whole-run orchestration.
//!
//! Phase 1 computes term frequencies. The corpus-size probe then runs to
//! completion and its `N` is handed to phase 2 (TF-IDF, search, rank) as a
//! plain value. Any failure ends the run with the failing stage named.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::corpus::{CorpusLocation, CorpusSize, CorpusSizeProbe};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::persist::StagePaths;
use crate::record::DocumentScore;
use crate::stages::search::Query;
use crate::stages::{rank, search, term_frequency, tfidf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    WordCount,
    TermFrequency,
    CorpusSize,
    TfIdf,
    Search,
    Rank,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::WordCount => "word-count",
            Stage::TermFrequency => "term-frequency",
            Stage::CorpusSize => "corpus-size",
            Stage::TfIdf => "tf-idf",
            Stage::Search => "search",
            Stage::Rank => "rank",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output directories of one run, all below a work directory.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub term_frequency: StagePaths,
    pub tfidf: StagePaths,
    pub search: StagePaths,
    pub rank: StagePaths,
}

impl RunPaths {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Self {
        let dir = |stage: Stage| StagePaths::new(work_dir.as_ref().join(stage.as_str()));
        Self {
            term_frequency: dir(Stage::TermFrequency),
            tfidf: dir(Stage::TfIdf),
            search: dir(Stage::Search),
            rank: dir(Stage::Rank),
        }
    }
}

#[derive(Debug)]
pub struct PipelineReport {
    pub num_docs: CorpusSize,
    pub ranked: Vec<DocumentScore>,
    pub work_dir: PathBuf,
}

pub struct Pipeline {
    engine: Engine,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let engine = Engine::new(&config.engine)?;
        Ok(Self { engine, config })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Runs every stage over the corpus at `corpus_root` for `query`.
    pub fn run<P: AsRef<Path>, W: AsRef<Path>>(&self, corpus_root: P, work_dir: W, query: &Query) -> Result<PipelineReport> {
        let corpus = CorpusLocation::new(corpus_root).recursive(self.config.recursive);
        let paths = RunPaths::new(&work_dir);
        let overwrite = self.config.overwrite;
        tracing::info!(corpus = %corpus.root.display(), work_dir = %work_dir.as_ref().display(), "pipeline started");

        term_frequency::run(&self.engine, &corpus, &paths.term_frequency, overwrite)?;

        let n = CorpusSizeProbe::probe(&corpus).map_err(|e| Error::from(e).in_stage(Stage::CorpusSize))?;

        tfidf::run(&self.engine, &paths.term_frequency, &paths.tfidf, n, overwrite)?;
        search::run(&self.engine, &paths.tfidf, &paths.search, query, overwrite)?;
        let ranked = rank::run(&self.engine, &paths.search, &paths.rank, self.config.top_k, overwrite)?;

        tracing::info!(num_docs = n.get(), hits = ranked.len(), "pipeline complete");
        Ok(PipelineReport { num_docs: n, ranked, work_dir: work_dir.as_ref().to_path_buf() })
    }
}
