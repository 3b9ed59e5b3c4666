//! The pipeline stages, each a [`Job`](crate::engine::Job) plus a `run` that
//! reads its input and commits its output directory.

pub mod rank;
pub mod search;
pub mod term_frequency;
pub mod tfidf;
pub mod word_count;
