//! Stage output directories.
//!
//! A stage writes one `part-NNNNN` file per reduce partition and finally a
//! `_SUCCESS` manifest. Readers refuse directories without a manifest, so the
//! output of a stage that died halfway is never consumed.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::engine::Engine;
use crate::error::{Error, OutputError, RecordError, Result};
use crate::pipeline::Stage;

pub const MANIFEST_FILE: &str = "_SUCCESS";
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub stage: String,
    pub records: u64,
    pub partitions: usize,
    pub created_at: String,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct StagePaths {
    pub root: PathBuf,
}

impl StagePaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn part(&self, index: usize) -> PathBuf { self.root.join(format!("part-{index:05}")) }
    fn manifest(&self) -> PathBuf { self.root.join(MANIFEST_FILE) }
}

/// Makes sure the output directory is fresh. Call before the stage computes anything.
pub fn prepare_output(paths: &StagePaths, overwrite: bool) -> Result<()> {
    if paths.root.exists() {
        if !overwrite {
            return Err(OutputError::AlreadyExists(paths.root.clone()).into());
        }
        tracing::warn!(output = %paths.root.display(), "removing existing stage output");
        if paths.root.is_dir() {
            fs::remove_dir_all(&paths.root)?;
        } else {
            fs::remove_file(&paths.root)?;
        }
    }
    fs::create_dir_all(&paths.root)?;
    Ok(())
}

/// Writes every partition as a part file, then the manifest.
pub fn write_stage<T: Display>(paths: &StagePaths, stage: Stage, partitions: &[Vec<T>]) -> Result<Manifest> {
    fs::create_dir_all(&paths.root)?;
    let mut records = 0u64;
    for (i, partition) in partitions.iter().enumerate() {
        let mut w = BufWriter::new(File::create(paths.part(i))?);
        for record in partition {
            writeln!(w, "{record}")?;
        }
        w.flush()?;
        records += partition.len() as u64;
    }
    let manifest = Manifest {
        stage: stage.to_string(),
        records,
        partitions: partitions.len(),
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: MANIFEST_VERSION,
    };
    save_manifest(paths, &manifest)?;
    tracing::info!(%stage, records, output = %paths.root.display(), "stage output committed");
    Ok(manifest)
}

pub fn save_manifest(paths: &StagePaths, manifest: &Manifest) -> Result<()> {
    let mut f = File::create(paths.manifest())?;
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| OutputError::BadManifest { path: paths.manifest(), reason: e.to_string() })?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_manifest(paths: &StagePaths) -> Result<Manifest> {
    if !paths.root.is_dir() {
        return Err(OutputError::MissingInput(paths.root.clone()).into());
    }
    let path = paths.manifest();
    if !path.is_file() {
        return Err(OutputError::Incomplete(paths.root.clone()).into());
    }
    let text = fs::read_to_string(&path)?;
    let manifest = serde_json::from_str(&text)
        .map_err(|e| OutputError::BadManifest { path: path.clone(), reason: e.to_string() })?;
    Ok(manifest)
}

fn part_files(paths: &StagePaths) -> Result<Vec<PathBuf>> {
    let mut parts = Vec::new();
    for entry in fs::read_dir(&paths.root)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') || !entry.file_type()?.is_file() {
            continue;
        }
        parts.push(entry.path());
    }
    parts.sort();
    Ok(parts)
}

fn read_part<T: FromStr<Err = RecordError>>(path: PathBuf) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(&path)?);
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = line
            .parse::<T>()
            .map_err(|source| Error::Record { path: path.clone(), line: i + 1, source })?;
        records.push(record);
    }
    Ok(records)
}

/// Reads all records of a committed stage output, part files in parallel.
pub fn read_records<T>(engine: &Engine, paths: &StagePaths) -> Result<Vec<T>>
where
    T: FromStr<Err = RecordError> + Send,
{
    let manifest = load_manifest(paths)?;
    let parts = part_files(paths)?;
    let records: Vec<T> = engine.map_all(parts, read_part::<T>)?.into_iter().flatten().collect();
    if records.len() as u64 != manifest.records {
        return Err(OutputError::BadManifest {
            path: paths.manifest(),
            reason: format!("manifest lists {} records, found {}", manifest.records, records.len()),
        }
        .into());
    }
    tracing::debug!(input = %paths.root.display(), records = records.len(), "read stage input");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::record::DocumentScore;

    fn engine() -> Engine {
        Engine::new(&EngineConfig { workers: 2, partitions: 2 }).unwrap()
    }

    fn score(doc: &str, score: f64) -> DocumentScore {
        DocumentScore { document: doc.into(), score }
    }

    #[test]
    fn committed_output_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StagePaths::new(dir.path().join("out"));
        prepare_output(&paths, false).unwrap();
        let parts = vec![vec![score("a", 1.5)], vec![score("b", 0.25), score("c", 2.0)]];
        let manifest = write_stage(&paths, Stage::Search, &parts).unwrap();
        assert_eq!(manifest.records, 3);
        assert_eq!(manifest.partitions, 2);
        assert_eq!(load_manifest(&paths).unwrap(), manifest);

        let back: Vec<DocumentScore> = read_records(&engine(), &paths).unwrap();
        assert_eq!(back, vec![score("a", 1.5), score("b", 0.25), score("c", 2.0)]);
    }

    #[test]
    fn output_without_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StagePaths::new(dir.path());
        fs::write(dir.path().join("part-00000"), "a\t1\n").unwrap();
        let err = read_records::<DocumentScore>(&engine(), &paths).unwrap_err();
        assert!(matches!(err, Error::Output(OutputError::Incomplete(_))));
    }

    #[test]
    fn existing_output_needs_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StagePaths::new(dir.path());
        fs::write(dir.path().join("part-00000"), "stale").unwrap();
        assert!(matches!(prepare_output(&paths, false), Err(Error::Output(OutputError::AlreadyExists(_)))));
        prepare_output(&paths, true).unwrap();
        assert!(!dir.path().join("part-00000").exists());
    }

    #[test]
    fn bad_line_reports_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StagePaths::new(dir.path());
        write_stage(&paths, Stage::Search, &[vec![score("a", 1.0)]]).unwrap();
        fs::write(dir.path().join("part-00000"), "a\t1\nb\tnope\n").unwrap();
        match read_records::<DocumentScore>(&engine(), &paths).unwrap_err() {
            Error::Record { line, source, .. } => {
                assert_eq!(line, 2);
                assert!(matches!(source, RecordError::BadNumber { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
