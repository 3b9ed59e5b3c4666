//! Error types for the TF-IDF pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("corpus size probe failed: {0}")]
    Probe(#[from] ProbeError),

    /// A record that could not be decoded, with where it came from.
    #[error("{}:{line}: {source}", .path.display())]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: RecordError,
    },

    /// A record rejected while grouping or encoding, before it touched a file.
    #[error("malformed record: {0}")]
    Malformed(#[from] RecordError),

    #[error("stage output error: {0}")]
    Output(#[from] OutputError),

    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Any failure raised while a pipeline stage was running.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attributes the error to a pipeline stage. Already attributed errors are kept as is.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage { stage, source: Box::new(other) },
        }
    }
}

/// Failures accessing the input corpus.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("corpus location does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("cannot read corpus entry {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("document identifier {id:?} is not encodable: {reason}")]
    InvalidDocumentId { id: String, reason: &'static str },

    #[error("duplicate document identifier {0:?}")]
    DuplicateDocument(String),
}

/// Failures decoding or validating a single stage record.
#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("key {key:?} is malformed: {reason}")]
    MalformedKey { key: String, reason: &'static str },

    #[error("record has no value field: {0:?}")]
    MissingValue(String),

    #[error("cannot parse value {value:?} as a number")]
    BadNumber { value: String },

    #[error("duplicate record for term {term:?} in document {document:?}")]
    Duplicate { term: String, document: String },

    #[error("duplicate score for document {0:?}")]
    DuplicateDocument(String),

    #[error("document frequency {df} of term {term:?} exceeds corpus size {n}")]
    DocumentFrequencyExceedsCorpus { term: String, df: u64, n: u64 },
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("corpus location does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("cannot list {}: {reason}", .path.display())]
    Unlistable { path: PathBuf, reason: String },
}

/// Failures around stage output directories.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("output directory already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("stage input {} is incomplete (no _SUCCESS manifest)", .0.display())]
    Incomplete(PathBuf),

    #[error("stage input {} does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("manifest {} is unreadable: {reason}", .path.display())]
    BadManifest { path: PathBuf, reason: String },
}

#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("query contains no searchable terms")]
    Empty,
}
