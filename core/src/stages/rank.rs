//! Total order over scored documents: score descending, then document ascending.

use std::cmp::Ordering;

use rustc_hash::FxHashSet;

use crate::engine::Engine;
use crate::error::{RecordError, Result};
use crate::persist::{prepare_output, read_records, write_stage, StagePaths};
use crate::pipeline::Stage;
use crate::record::DocumentScore;

/// Ranking order. Equal scores fall back to the document identifier so reruns are identical.
pub fn ranking_order(a: &DocumentScore, b: &DocumentScore) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.document.cmp(&b.document))
}

/// Sorts scored documents into rank order, optionally keeping only the first `top_k`.
pub fn rank(mut scores: Vec<DocumentScore>, top_k: Option<usize>) -> Result<Vec<DocumentScore>> {
    let mut seen = FxHashSet::default();
    for s in &scores {
        if !seen.insert(s.document.as_str()) {
            return Err(RecordError::DuplicateDocument(s.document.clone()).into());
        }
    }
    scores.sort_unstable_by(ranking_order);
    if let Some(k) = top_k {
        scores.truncate(k);
    }
    Ok(scores)
}

/// Ranks a committed search output into a single partition.
pub fn run(
    engine: &Engine,
    input: &StagePaths,
    output: &StagePaths,
    top_k: Option<usize>,
    overwrite: bool,
) -> Result<Vec<DocumentScore>> {
    let stage = Stage::Rank;
    let execute = || -> Result<Vec<DocumentScore>> {
        let scores: Vec<DocumentScore> = read_records(engine, input)?;
        prepare_output(output, overwrite)?;
        tracing::info!(%stage, documents = scores.len(), ?top_k, "stage started");
        let ranked = rank(scores, top_k)?;
        write_stage(output, stage, std::slice::from_ref(&ranked))?;
        Ok(ranked)
    };
    execute().map_err(|e| e.in_stage(stage))
}
