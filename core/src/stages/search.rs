//! Query scoring: keep the query's terms, re-key by document, sum.

use rustc_hash::FxHashSet;

use crate::engine::{Emitter, Engine, Job};
use crate::error::{QueryError, Result};
use crate::persist::{prepare_output, read_records, write_stage, Manifest, StagePaths};
use crate::pipeline::Stage;
use crate::record::{DocumentId, DocumentScore, TfIdfScore};
use crate::tokenizer::fold_query_terms;

/// Folded query terms. Built once per run and shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct Query {
    terms: Vec<String>,
    lookup: FxHashSet<String>,
}

impl Query {
    /// Folds raw arguments with the corpus tokenizer. Fails if nothing searchable remains.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, QueryError> {
        let terms = fold_query_terms(raw);
        if terms.is_empty() {
            return Err(QueryError::Empty);
        }
        let lookup = terms.iter().cloned().collect();
        Ok(Self { terms, lookup })
    }

    /// Terms in first-seen order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn contains(&self, term: &str) -> bool {
        self.lookup.contains(term)
    }
}

pub struct SearchStage {
    query: Query,
}

impl SearchStage {
    pub fn new(query: Query) -> Self {
        Self { query }
    }
}

impl Job for SearchStage {
    type Input = TfIdfScore;
    type Key = DocumentId;
    type Value = f64;
    type Output = DocumentScore;

    fn map(&self, record: TfIdfScore, emit: &mut Emitter<DocumentId, f64>) -> Result<()> {
        if self.query.contains(&record.key.term) {
            emit.emit(record.key.document, record.score);
        }
        Ok(())
    }

    fn reduce(&self, document: DocumentId, mut scores: Vec<f64>, out: &mut Vec<DocumentScore>) -> Result<()> {
        // Arrival order depends on the partitioning; summing sorted values keeps the bits stable.
        scores.sort_unstable_by(f64::total_cmp);
        out.push(DocumentScore { document, score: scores.into_iter().sum() });
        Ok(())
    }
}

/// Documents matching at least one query term with their summed scores.
pub fn score_documents(engine: &Engine, records: Vec<TfIdfScore>, query: &Query) -> Result<Vec<Vec<DocumentScore>>> {
    engine.run(&SearchStage::new(query.clone()), records)
}

pub fn run(engine: &Engine, input: &StagePaths, output: &StagePaths, query: &Query, overwrite: bool) -> Result<Manifest> {
    let stage = Stage::Search;
    let execute = || -> Result<Manifest> {
        let records: Vec<TfIdfScore> = read_records(engine, input)?;
        prepare_output(output, overwrite)?;
        tracing::info!(%stage, records = records.len(), terms = ?query.terms(), "stage started");
        let partitions = score_documents(engine, records, query)?;
        write_stage(output, stage, &partitions)
    };
    execute().map_err(|e| e.in_stage(stage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::record::DocTermKey;

    fn engine() -> Engine {
        Engine::new(&EngineConfig { workers: 3, partitions: 2 }).unwrap()
    }

    fn rec(term: &str, doc: &str, score: f64) -> TfIdfScore {
        TfIdfScore { key: DocTermKey::new(term, doc).unwrap(), score }
    }

    fn scored(records: Vec<TfIdfScore>, query: &[&str]) -> Vec<DocumentScore> {
        let query = Query::parse(query).unwrap();
        let mut out: Vec<DocumentScore> =
            score_documents(&engine(), records, &query).unwrap().into_iter().flatten().collect();
        out.sort_by(|a, b| a.document.cmp(&b.document));
        out
    }

    #[test]
    fn sums_only_matched_terms() {
        let records = vec![
            rec("cat", "a", 0.5),
            rec("dog", "a", 0.25),
            rec("fish", "a", 10.0),
            rec("dog", "b", 0.75),
            rec("fish", "c", 1.0),
        ];
        let out = scored(records, &["cat", "dog"]);
        assert_eq!(
            out,
            vec![
                DocumentScore { document: "a".into(), score: 0.75 },
                DocumentScore { document: "b".into(), score: 0.75 },
            ]
        );
    }

    #[test]
    fn sum_does_not_depend_on_record_order() {
        let forward = vec![rec("a", "d", 0.1), rec("b", "d", 0.2), rec("c", "d", 0.3), rec("e", "d", 0.7)];
        let mut reversed = forward.clone();
        reversed.reverse();
        let mut rotated = forward.clone();
        rotated.rotate_left(2);

        let query = ["a", "b", "c", "e"];
        let expected = scored(forward, &query)[0].score.to_bits();
        assert_eq!(scored(reversed, &query)[0].score.to_bits(), expected);
        assert_eq!(scored(rotated, &query)[0].score.to_bits(), expected);
    }

    #[test]
    fn query_terms_are_case_folded() {
        let out = scored(vec![rec("cat", "a", 0.5)], &["CAT"]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn no_match_means_no_output() {
        assert!(scored(vec![rec("cat", "a", 0.5)], &["zebra"]).is_empty());
    }

    #[test]
    fn empty_query_is_rejected() {
        assert_eq!(Query::parse(&["  ", "!!"]).unwrap_err(), QueryError::Empty);
        let none: [&str; 0] = [];
        assert_eq!(Query::parse(&none).unwrap_err(), QueryError::Empty);
    }

    #[test]
    fn query_keeps_first_seen_order() {
        let q = Query::parse(&["dog", "Cat", "dog"]).unwrap();
        assert_eq!(q.terms(), &["dog".to_string(), "cat".to_string()]);
    }
}
