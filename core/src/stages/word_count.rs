//! Standalone word counter: raw `(term, document) -> count`, no scoring.
//!
//! Not part of the scoring pipeline; it shares the tokenizer and mapper with
//! the term-frequency stage so both agree on what a word is.

use crate::corpus::{self, CorpusLocation, Document};
use crate::engine::Engine;
use crate::error::Result;
use crate::persist::{prepare_output, write_stage, Manifest, StagePaths};
use crate::pipeline::Stage;
use crate::record::TermCount;
use crate::stages::term_frequency::CountTerms;

pub fn word_counts(engine: &Engine, docs: Vec<Document>) -> Result<Vec<Vec<TermCount>>> {
    engine.run(&CountTerms, docs)
}

pub fn run(engine: &Engine, corpus: &CorpusLocation, output: &StagePaths, overwrite: bool) -> Result<Manifest> {
    let stage = Stage::WordCount;
    let execute = || -> Result<Manifest> {
        let docs = corpus::load(corpus)?;
        prepare_output(output, overwrite)?;
        tracing::info!(%stage, documents = docs.len(), "stage started");
        let partitions = word_counts(engine, docs)?;
        write_stage(output, stage, &partitions)
    };
    execute().map_err(|e| e.in_stage(stage))
}
