//! Per-document term frequency.
//!
//! Each mapper tallies one document in a local map and emits one value per
//! distinct term, so the shuffle only ever sees `(term, document)` keys once
//! per document. The reducer sums and applies `1 + log10(count)`.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::corpus::{self, CorpusLocation, Document};
use crate::engine::{Emitter, Engine, Job};
use crate::error::{CorpusError, Result};
use crate::persist::{prepare_output, write_stage, Manifest, StagePaths};
use crate::pipeline::Stage;
use crate::record::{DocTermKey, TermCount, TermFrequency};
use crate::tokenizer::tokenize;

/// Log-scaled term frequency. Zero only for a zero count, which is never emitted.
pub fn log_tf(count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        1.0 + (count as f64).log10()
    }
}

/// Shared mapper: emits `(term, document) -> occurrences` for every distinct term of a document.
pub(crate) fn map_document(doc: Document, emit: &mut Emitter<DocTermKey, u64>) -> Result<()> {
    let mut counts: FxHashMap<String, u64> = FxHashMap::default();
    doc.for_each_line(|line| {
        for token in tokenize(line) {
            *counts.entry(token).or_insert(0) += 1;
        }
    })
    .map_err(|e| CorpusError::Unreadable {
        path: doc.path().map_or_else(|| PathBuf::from(&doc.id), Path::to_path_buf),
        reason: e.to_string(),
    })?;

    for (term, count) in counts {
        emit.emit(DocTermKey::new(term, doc.id.as_str())?, count);
    }
    Ok(())
}

/// Raw counts, the intermediate shape shared with the word counter.
pub struct CountTerms;

impl Job for CountTerms {
    type Input = Document;
    type Key = DocTermKey;
    type Value = u64;
    type Output = TermCount;

    fn map(&self, doc: Document, emit: &mut Emitter<DocTermKey, u64>) -> Result<()> {
        map_document(doc, emit)
    }

    fn reduce(&self, key: DocTermKey, values: Vec<u64>, out: &mut Vec<TermCount>) -> Result<()> {
        out.push(TermCount { key, count: values.into_iter().sum() });
        Ok(())
    }
}

pub struct TermFrequencyStage;

impl Job for TermFrequencyStage {
    type Input = Document;
    type Key = DocTermKey;
    type Value = u64;
    type Output = TermFrequency;

    fn map(&self, doc: Document, emit: &mut Emitter<DocTermKey, u64>) -> Result<()> {
        map_document(doc, emit)
    }

    fn reduce(&self, key: DocTermKey, values: Vec<u64>, out: &mut Vec<TermFrequency>) -> Result<()> {
        let count: u64 = values.into_iter().sum();
        if count > 0 {
            out.push(TermFrequency { key, tf: log_tf(count) });
        }
        Ok(())
    }
}

pub fn term_frequencies(engine: &Engine, docs: Vec<Document>) -> Result<Vec<Vec<TermFrequency>>> {
    engine.run(&TermFrequencyStage, docs)
}

/// Reads the corpus and commits the term-frequency output.
pub fn run(engine: &Engine, corpus: &CorpusLocation, output: &StagePaths, overwrite: bool) -> Result<Manifest> {
    let stage = Stage::TermFrequency;
    let execute = || -> Result<Manifest> {
        let docs = corpus::load(corpus)?;
        prepare_output(output, overwrite)?;
        tracing::info!(%stage, documents = docs.len(), "stage started");
        let partitions = term_frequencies(engine, docs)?;
        write_stage(output, stage, &partitions)
    };
    execute().map_err(|e| e.in_stage(stage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn engine() -> Engine {
        Engine::new(&EngineConfig { workers: 2, partitions: 3 }).unwrap()
    }

    #[test]
    fn log_tf_values() {
        assert_eq!(log_tf(1), 1.0);
        assert_eq!(log_tf(10), 2.0);
        assert_eq!(log_tf(0), 0.0);
    }

    #[test]
    fn counts_across_lines_of_a_document() {
        let docs = vec![
            Document::from_text("d1", "Rust rust\nRUST and more").unwrap(),
            Document::from_text("d2", "rust").unwrap(),
        ];
        let mut counts: Vec<TermCount> = engine().run(&CountTerms, docs).unwrap().into_iter().flatten().collect();
        counts.sort_by(|a, b| a.key.cmp(&b.key));
        let got: Vec<(String, String, u64)> =
            counts.into_iter().map(|c| (c.key.term, c.key.document, c.count)).collect();
        assert_eq!(
            got,
            vec![
                ("and".to_string(), "d1".to_string(), 1),
                ("more".into(), "d1".into(), 1),
                ("rust".into(), "d1".into(), 3),
                ("rust".into(), "d2".into(), 1),
            ]
        );
    }

    #[test]
    fn term_frequency_is_log_scaled() {
        let text = "x ".repeat(100);
        let docs = vec![Document::from_text("d", text).unwrap()];
        let tf: Vec<TermFrequency> = term_frequencies(&engine(), docs).unwrap().into_iter().flatten().collect();
        assert_eq!(tf.len(), 1);
        assert!((tf[0].tf - 3.0).abs() < 1e-12);
    }

    #[test]
    fn unreadable_document_reports_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("gone.txt");
        let docs = vec![Document::from_file("nested/gone.txt", &file).unwrap()];
        match engine().run(&CountTerms, docs) {
            Err(crate::error::Error::Corpus(CorpusError::Unreadable { path, .. })) => assert_eq!(path, file),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn empty_document_emits_nothing() {
        let docs = vec![Document::from_text("empty", "\n  \n").unwrap()];
        let tf = term_frequencies(&engine(), docs).unwrap();
        assert!(tf.iter().all(Vec::is_empty));
    }
}
