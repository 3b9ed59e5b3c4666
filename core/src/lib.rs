//! Batch TF-IDF indexing and ranked search.
//!
//! A corpus goes through four grouped aggregations run by the in-process
//! [`engine`]: term frequency, TF-IDF (after the corpus size barrier), query
//! scoring and ranking. Stages talk to each other through committed output
//! directories of flat text records, see [`record`] and [`persist`].

pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod record;
pub mod stages;
pub mod tokenizer;

pub use config::{EngineConfig, PipelineConfig};
pub use corpus::{CorpusLocation, CorpusSize, CorpusSizeProbe, Document};
pub use engine::Engine;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineReport, Stage};
pub use record::{DocTermKey, DocumentScore, TermCount, TermFrequency, TfIdfScore};
pub use stages::search::Query;
