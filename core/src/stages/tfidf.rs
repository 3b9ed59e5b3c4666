//! TF-IDF scoring, grouped by term.
//!
//! Grouping by term puts every document of a term in one reduce call, so the
//! document frequency is just the size of the group and no second pass over
//! the data is needed. `N` comes from the corpus-size barrier and is owned by
//! the job, which every worker reads.

use crate::corpus::CorpusSize;
use crate::engine::{Emitter, Engine, Job};
use crate::error::{RecordError, Result};
use crate::persist::{prepare_output, read_records, write_stage, Manifest, StagePaths};
use crate::pipeline::Stage;
use crate::record::{DocTermKey, DocumentId, TermFrequency, TfIdfScore};

/// `log10(1 + N / df)`, defined as `0` for an empty corpus.
///
/// Strictly positive whenever `N >= df >= 1`; a term found in every document
/// still gets `log10(2)`.
pub fn idf(n: CorpusSize, df: u64) -> f64 {
    if n.get() == 0 || df == 0 {
        return 0.0;
    }
    (1.0 + n.get() as f64 / df as f64).log10()
}

pub struct TfIdfStage {
    n: CorpusSize,
}

impl TfIdfStage {
    pub fn new(n: CorpusSize) -> Self {
        Self { n }
    }
}

impl Job for TfIdfStage {
    type Input = TermFrequency;
    type Key = String;
    type Value = (DocumentId, f64);
    type Output = TfIdfScore;

    fn map(&self, record: TermFrequency, emit: &mut Emitter<String, (DocumentId, f64)>) -> Result<()> {
        let DocTermKey { term, document } = record.key;
        emit.emit(term, (document, record.tf));
        Ok(())
    }

    fn reduce(&self, term: String, mut docs: Vec<(DocumentId, f64)>, out: &mut Vec<TfIdfScore>) -> Result<()> {
        docs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        if let Some(w) = docs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(RecordError::Duplicate { term, document: w[0].0.clone() }.into());
        }

        let df = docs.len() as u64;
        if self.n.get() > 0 && df > self.n.get() {
            return Err(RecordError::DocumentFrequencyExceedsCorpus { term, df, n: self.n.get() }.into());
        }
        let idf = idf(self.n, df);
        out.reserve(docs.len());
        for (document, tf) in docs {
            out.push(TfIdfScore { key: DocTermKey { term: term.clone(), document }, score: idf * tf });
        }
        Ok(())
    }
}

pub fn tfidf_scores(engine: &Engine, records: Vec<TermFrequency>, n: CorpusSize) -> Result<Vec<Vec<TfIdfScore>>> {
    if n.get() == 0 {
        tracing::warn!("corpus size is zero, every idf is 0");
    }
    engine.run(&TfIdfStage::new(n), records)
}

/// Scores a committed term-frequency output. `n` must already be known.
pub fn run(engine: &Engine, input: &StagePaths, output: &StagePaths, n: CorpusSize, overwrite: bool) -> Result<Manifest> {
    let stage = Stage::TfIdf;
    let execute = || -> Result<Manifest> {
        let records: Vec<TermFrequency> = read_records(engine, input)?;
        prepare_output(output, overwrite)?;
        tracing::info!(%stage, records = records.len(), num_docs = n.get(), "stage started");
        let partitions = tfidf_scores(engine, records, n)?;
        write_stage(output, stage, &partitions)
    };
    execute().map_err(|e| e.in_stage(stage))
}
