//! Corpus discovery and document access.
//!
//! A corpus location is either a single file or a directory of files. Hidden
//! entries (names starting with `.` or `_`) are not documents, which also keeps
//! stage output markers like `_SUCCESS` out of a corpus.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{CorpusError, ProbeError};
use crate::record::{validate_document, DocumentId};

#[derive(Debug, Clone)]
pub struct CorpusLocation {
    pub root: PathBuf,
    /// Descend into subdirectories; identifiers become `/`-joined relative paths.
    pub recursive: bool,
}

impl CorpusLocation {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), recursive: false }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Text(String),
}

/// A document of the corpus: an identifier plus where its lines come from.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    source: Source,
}

impl Document {
    pub fn from_file(id: impl Into<DocumentId>, path: impl Into<PathBuf>) -> Result<Self, CorpusError> {
        let id = checked_id(id.into())?;
        Ok(Self { id, source: Source::File(path.into()) })
    }

    /// In-memory document, mostly useful for tests and embedding.
    pub fn from_text(id: impl Into<DocumentId>, text: impl Into<String>) -> Result<Self, CorpusError> {
        let id = checked_id(id.into())?;
        Ok(Self { id, source: Source::Text(text.into()) })
    }

    /// File backing the document, `None` for in-memory text.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(path) => Some(path.as_path()),
            Source::Text(_) => None,
        }
    }

    /// Calls `f` for every line. Invalid UTF-8 is replaced, never an error.
    pub fn for_each_line<F: FnMut(&str)>(&self, mut f: F) -> io::Result<()> {
        match &self.source {
            Source::Text(text) => {
                text.lines().for_each(f);
                Ok(())
            }
            Source::File(path) => {
                let mut reader = BufReader::new(File::open(path)?);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    if reader.read_until(b'\n', &mut buf)? == 0 {
                        return Ok(());
                    }
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    f(String::from_utf8_lossy(&buf).as_ref());
                }
            }
        }
    }
}

fn checked_id(id: DocumentId) -> Result<DocumentId, CorpusError> {
    match validate_document(&id) {
        Ok(()) => Ok(id),
        Err(reason) => Err(CorpusError::InvalidDocumentId { id, reason }),
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Lists `(identifier, path)` for every document under the location, sorted by identifier.
pub fn discover(location: &CorpusLocation) -> Result<Vec<(DocumentId, PathBuf)>, CorpusError> {
    let root = &location.root;
    if !root.exists() {
        return Err(CorpusError::Missing(root.clone()));
    }
    if root.is_file() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CorpusError::Unreadable { path: root.clone(), reason: "no file name".into() })?;
        return Ok(vec![(name, root.clone())]);
    }

    let max_depth = if location.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()));

    let mut docs = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| CorpusError::Unreadable {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
            reason: e.to_string(),
        })?;
        let p = entry.path();
        if !p.is_file() {
            continue;
        }
        let rel = p.strip_prefix(root).unwrap_or(p);
        let id = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        docs.push((id, p.to_path_buf()));
    }
    docs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(docs)
}

/// Discovers and validates every document of the corpus.
pub fn load(location: &CorpusLocation) -> Result<Vec<Document>, CorpusError> {
    let found = discover(location)?;
    let mut docs: Vec<Document> = Vec::with_capacity(found.len());
    for (id, path) in found {
        if docs.last().is_some_and(|d| d.id == id) {
            return Err(CorpusError::DuplicateDocument(id));
        }
        docs.push(Document::from_file(id, path)?);
    }
    tracing::debug!(root = %location.root.display(), documents = docs.len(), "loaded corpus");
    Ok(docs)
}

/// Total number of documents in the corpus, `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CorpusSize(pub u64);

impl CorpusSize {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Counts the documents of a corpus. Runs to completion before TF-IDF scoring starts.
pub struct CorpusSizeProbe;

impl CorpusSizeProbe {
    pub fn probe(location: &CorpusLocation) -> Result<CorpusSize, ProbeError> {
        let docs = discover(location).map_err(|e| match e {
            CorpusError::Missing(path) => ProbeError::Missing(path),
            other => ProbeError::Unlistable { path: location.root.clone(), reason: other.to_string() },
        })?;
        let n = CorpusSize(docs.len() as u64);
        tracing::info!(root = %location.root.display(), num_docs = n.get(), "probed corpus size");
        Ok(n)
    }
}
