//! Stage record types and their flat text encoding.
//!
//! Every record travels between stages as one line: a key, a tab, a value.
//! Term/document keys are flattened as `term#####document`. Encoding checks
//! that both halves can be recovered from the flattened form, decoding checks
//! the same rules, so a key that decodes is always the key that was written.

use std::fmt;
use std::str::FromStr;

use crate::error::RecordError;

/// Literal placed between the term and the document of a composite key.
pub const SEPARATOR: &str = "#####";

const SEPARATOR_CHAR: char = '#';

pub type Term = String;
pub type DocumentId = String;

/// Composite `(term, document)` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocTermKey {
    pub term: Term,
    pub document: DocumentId,
}

impl DocTermKey {
    /// Builds a key, rejecting halves that would not survive a round trip.
    pub fn new(term: impl Into<Term>, document: impl Into<DocumentId>) -> Result<Self, RecordError> {
        let key = DocTermKey { term: term.into(), document: document.into() };
        if let Err(reason) = validate_term(&key.term) {
            return Err(RecordError::MalformedKey { key: key.term, reason });
        }
        if let Err(reason) = validate_document(&key.document) {
            return Err(RecordError::MalformedKey { key: key.document, reason });
        }
        Ok(key)
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(encoded: &str) -> Result<Self, RecordError> {
        let malformed = |reason| RecordError::MalformedKey { key: encoded.to_string(), reason };
        let (term, document) = encoded.split_once(SEPARATOR).ok_or_else(|| malformed("missing separator"))?;
        validate_term(term).map_err(malformed)?;
        validate_document(document).map_err(malformed)?;
        Ok(DocTermKey { term: term.to_string(), document: document.to_string() })
    }
}

impl fmt::Display for DocTermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.term, SEPARATOR, self.document)
    }
}

fn validate_common(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("empty component");
    }
    if value.contains(SEPARATOR) {
        return Err("component contains the separator");
    }
    if value.contains(['\t', '\n', '\r']) {
        return Err("component contains a tab or line break");
    }
    Ok(())
}

pub fn validate_term(term: &str) -> Result<(), &'static str> {
    validate_common(term)?;
    if term.ends_with(SEPARATOR_CHAR) {
        return Err("term ends with '#'");
    }
    Ok(())
}

pub fn validate_document(document: &str) -> Result<(), &'static str> {
    validate_common(document)?;
    if document.starts_with(SEPARATOR_CHAR) {
        return Err("document identifier starts with '#'");
    }
    Ok(())
}

fn split_line(line: &str) -> Result<(&str, &str), RecordError> {
    line.split_once('\t').ok_or_else(|| RecordError::MissingValue(line.to_string()))
}

fn parse_score(value: &str) -> Result<f64, RecordError> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RecordError::BadNumber { value: value.to_string() }),
    }
}

fn parse_count(value: &str) -> Result<u64, RecordError> {
    match value.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(RecordError::BadNumber { value: value.to_string() }),
    }
}

/// Raw number of occurrences of a term in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct TermCount {
    pub key: DocTermKey,
    pub count: u64,
}

/// Log-scaled term frequency, `1 + log10(count)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TermFrequency {
    pub key: DocTermKey,
    pub tf: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TfIdfScore {
    pub key: DocTermKey,
    pub score: f64,
}

/// A document with its accumulated query score. Also the shape of ranked results.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentScore {
    pub document: DocumentId,
    pub score: f64,
}

impl fmt::Display for TermCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.count)
    }
}

impl FromStr for TermCount {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (key, value) = split_line(line)?;
        Ok(TermCount { key: DocTermKey::decode(key)?, count: parse_count(value)? })
    }
}

impl fmt::Display for TermFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.tf)
    }
}

impl FromStr for TermFrequency {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (key, value) = split_line(line)?;
        Ok(TermFrequency { key: DocTermKey::decode(key)?, tf: parse_score(value)? })
    }
}

impl fmt::Display for TfIdfScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.score)
    }
}

impl FromStr for TfIdfScore {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (key, value) = split_line(line)?;
        Ok(TfIdfScore { key: DocTermKey::decode(key)?, score: parse_score(value)? })
    }
}

impl fmt::Display for DocumentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.document, self.score)
    }
}

impl FromStr for DocumentScore {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (document, value) = split_line(line)?;
        if let Err(reason) = validate_document(document) {
            return Err(RecordError::MalformedKey { key: document.to_string(), reason });
        }
        Ok(DocumentScore { document: document.to_string(), score: parse_score(value)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips() {
        let key = DocTermKey::new("café", "chapter 1.txt").unwrap();
        assert_eq!(key.encode(), "café#####chapter 1.txt");
        assert_eq!(key.encode(), key.to_string());
        assert_eq!(DocTermKey::decode(&key.encode()).unwrap(), key);
    }

    #[test]
    fn key_round_trips_with_inner_hashes() {
        let key = DocTermKey::new("c#sharp", "notes#2").unwrap();
        assert_eq!(DocTermKey::decode(&key.encode()).unwrap(), key);
    }

    #[test]
    fn rejects_components_that_blur_the_separator() {
        assert!(DocTermKey::new("a#####b", "doc").is_err());
        assert!(DocTermKey::new("a#", "doc").is_err());
        assert!(DocTermKey::new("a", "#doc").is_err());
        assert!(DocTermKey::new("a", "do\tc").is_err());
        assert!(DocTermKey::new("", "doc").is_err());
    }

    #[test]
    fn ambiguous_encoded_key_is_not_silently_split() {
        let err = DocTermKey::decode("a######b").unwrap_err();
        assert!(matches!(err, RecordError::MalformedKey { .. }));
        assert!(DocTermKey::decode("no-separator").is_err());
    }

    #[test]
    fn parses_record_lines() {
        let tf: TermFrequency = "cat#####docA\t1".parse().unwrap();
        assert_eq!(tf.key, DocTermKey::new("cat", "docA").unwrap());
        assert_eq!(tf.tf, 1.0);

        let s: DocumentScore = "docA\t0.4771212547196624".parse().unwrap();
        assert_eq!(s.to_string(), "docA\t0.4771212547196624");
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            "cat#####docA".parse::<TfIdfScore>().unwrap_err(),
            RecordError::MissingValue("cat#####docA".into())
        );
        assert!(matches!("cat#####docA\tabc".parse::<TfIdfScore>(), Err(RecordError::BadNumber { .. })));
        assert!(matches!("cat#####docA\tNaN".parse::<TfIdfScore>(), Err(RecordError::BadNumber { .. })));
        assert!(matches!("cat#####docA\t0".parse::<TermCount>(), Err(RecordError::BadNumber { .. })));
        assert!(matches!("cat#####docA\t1\t2".parse::<TermCount>(), Err(RecordError::BadNumber { .. })));
    }

    #[test]
    fn float_values_survive_text_encoding() {
        let score = TfIdfScore { key: DocTermKey::new("the", "d").unwrap(), score: 2f64.log10() * 1.3 };
        let back: TfIdfScore = score.to_string().parse().unwrap();
        assert_eq!(back, score);
    }
}
