//! On-disk cache for a built index.
//!
//! The index is stored as four bincode artifacts inside one cache directory.
//! Each artifact starts with a small header naming the format, version and
//! artifact kind, so a stray or truncated file is detected on load. The
//! header also carries a generation stamp shared by the four files of one
//! save, so a set mixing artifacts from two saves is rejected as well.

use crate::error::{Error, Result};
use crate::index::{DocLengths, DocumentStore, InvertedIndex, Postings, TermFrequencies};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const FORMAT_MAGIC: [u8; 4] = *b"KWSI";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Artifact {
    Documents,
    Postings,
    TermFrequencies,
    DocLengths,
}

impl Artifact {
    const ALL: [Artifact; 4] = [
        Artifact::Documents,
        Artifact::Postings,
        Artifact::TermFrequencies,
        Artifact::DocLengths,
    ];

    fn file_name(self) -> &'static str {
        match self {
            Artifact::Documents => "documents.bin",
            Artifact::Postings => "postings.bin",
            Artifact::TermFrequencies => "term_frequencies.bin",
            Artifact::DocLengths => "doc_lengths.bin",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u32,
    artifact: Artifact,
    /// Shared by the four artifacts written by one save
    generation: u64,
    entries: u64,
}

/// Artifacts written next to their final names, removed on drop unless committed
struct PendingFiles {
    files: Vec<(PathBuf, PathBuf)>,
    committed: bool,
}

impl PendingFiles {
    fn new() -> Self {
        Self {
            files: Vec::with_capacity(Artifact::ALL.len()),
            committed: false,
        }
    }

    fn push(&mut self, temp: PathBuf, target: PathBuf) {
        self.files.push((temp, target));
    }

    /// Rename every pending file over its target
    fn commit(mut self) -> Result<()> {
        for (temp, target) in &self.files {
            fs::rename(temp, target)?;
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingFiles {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (temp, _) in &self.files {
            if temp.exists() {
                if let Err(e) = fs::remove_file(temp) {
                    tracing::warn!("Failed to clean up {}: {}", temp.display(), e);
                }
            }
        }
    }
}

pub struct Storage {
    cache_dir: PathBuf,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.cache_dir
    }

    /// True when every artifact is present
    pub fn exists(&self) -> bool {
        self.missing_artifacts().is_empty()
    }

    fn artifact_path(&self, artifact: Artifact) -> PathBuf {
        self.cache_dir.join(artifact.file_name())
    }

    fn temp_path(&self, artifact: Artifact) -> PathBuf {
        self.cache_dir.join(format!("{}.tmp", artifact.file_name()))
    }

    fn missing_artifacts(&self) -> Vec<&'static str> {
        Artifact::ALL
            .iter()
            .filter(|a| !self.artifact_path(**a).is_file())
            .map(|a| a.file_name())
            .collect()
    }

    /// Persist all four tables.
    ///
    /// Only the artifact files are replaced; anything else in the cache
    /// directory is left alone. Each artifact is written and synced under a
    /// `.tmp` name first, and nothing is renamed until all four are on disk.
    pub fn save(&self, index: &InvertedIndex) -> Result<()> {
        let start = Instant::now();
        let (documents, postings, term_frequencies, doc_lengths) = index.tables();
        let generation = next_generation();

        fs::create_dir_all(&self.cache_dir)?;

        let mut pending = PendingFiles::new();
        self.stage(&mut pending, Artifact::Documents, generation, documents.len(), documents)?;
        self.stage(&mut pending, Artifact::Postings, generation, postings.len(), postings)?;
        self.stage(
            &mut pending,
            Artifact::TermFrequencies,
            generation,
            term_frequencies.len(),
            term_frequencies,
        )?;
        self.stage(&mut pending, Artifact::DocLengths, generation, doc_lengths.len(), doc_lengths)?;
        pending.commit()?;
        sync_dir(&self.cache_dir);

        tracing::info!(
            "Saved index ({} documents) to {} in {:?}",
            documents.len(),
            self.cache_dir.display(),
            start.elapsed()
        );
        Ok(())
    }

    fn stage<T: Serialize>(
        &self,
        pending: &mut PendingFiles,
        artifact: Artifact,
        generation: u64,
        entries: usize,
        table: &T,
    ) -> Result<()> {
        let temp = self.temp_path(artifact);
        pending.push(temp.clone(), self.artifact_path(artifact));
        let header = Header {
            magic: FORMAT_MAGIC,
            version: FORMAT_VERSION,
            artifact,
            generation,
            entries: entries as u64,
        };
        write_artifact(&temp, &header, table)
    }

    /// Load all four tables or fail without returning a partial index
    pub fn load(&self) -> Result<InvertedIndex> {
        let start = Instant::now();

        let missing = self.missing_artifacts();
        if !missing.is_empty() {
            return Err(Error::corrupt(
                &self.cache_dir,
                format!("missing {}", missing.join(", ")),
            ));
        }

        let (documents, generation) = self.read_table(Artifact::Documents, |t: &DocumentStore| t.len())?;
        let (postings, postings_gen) = self.read_table(Artifact::Postings, |t: &Postings| t.len())?;
        let (term_frequencies, tfs_gen) =
            self.read_table(Artifact::TermFrequencies, |t: &TermFrequencies| t.len())?;
        let (doc_lengths, lengths_gen) = self.read_table(Artifact::DocLengths, |t: &DocLengths| t.len())?;

        if [postings_gen, tfs_gen, lengths_gen].iter().any(|&g| g != generation) {
            return Err(Error::corrupt(
                &self.cache_dir,
                "artifacts were written by different saves",
            ));
        }

        let index = InvertedIndex::from_parts(documents, postings, term_frequencies, doc_lengths)
            .map_err(|reason| Error::corrupt(&self.cache_dir, reason))?;

        tracing::info!(
            "Loaded index ({} documents) from {} in {:?}",
            index.total_documents(),
            self.cache_dir.display(),
            start.elapsed()
        );
        Ok(index)
    }

    fn read_table<T, F>(&self, artifact: Artifact, len: F) -> Result<(T, u64)>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> usize,
    {
        let path = self.artifact_path(artifact);
        let (table, header) = read_artifact::<T>(&path, artifact)?;
        if len(&table) as u64 != header.entries {
            return Err(Error::corrupt(
                path,
                format!("header announces {} entries, found {}", header.entries, len(&table)),
            ));
        }
        Ok((table, header.generation))
    }
}

/// Clock-based stamp, strictly increasing within the process
fn next_generation() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let next = |last: u64| now.max(last.wrapping_add(1));
    match LAST.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| Some(next(last))) {
        Ok(last) | Err(last) => next(last),
    }
}

/// Flush the directory entry so the renames survive a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::warn!("Failed to sync {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn write_artifact<T: Serialize>(path: &Path, header: &Header, table: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::DefaultOptions::new().serialize_into(&mut writer, header)?;
    bincode::DefaultOptions::new().serialize_into(&mut writer, table)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(path: &Path, artifact: Artifact) -> Result<(T, Header)> {
    let file = File::open(path).map_err(|e| Error::corrupt(path, format!("cannot open: {}", e)))?;
    // Bound allocations by the file size so a damaged length prefix cannot
    // request more memory than the file could describe.
    let limit = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let header: Header = bincode::DefaultOptions::new()
        .with_limit(limit)
        .deserialize_from(&mut reader)
        .map_err(|e| Error::corrupt(path, format!("unreadable header: {}", e)))?;
    if header.magic != FORMAT_MAGIC {
        return Err(Error::corrupt(path, "not an index artifact"));
    }
    if header.version != FORMAT_VERSION {
        return Err(Error::corrupt(
            path,
            format!("unsupported format version {}", header.version),
        ));
    }
    if header.artifact != artifact {
        return Err(Error::corrupt(
            path,
            format!("expected {:?} artifact, found {:?}", artifact, header.artifact),
        ));
    }

    let table: T = bincode::DefaultOptions::new()
        .with_limit(limit)
        .deserialize_from(&mut reader)
        .map_err(|e| Error::corrupt(path, format!("unreadable payload: {}", e)))?;

    if reader.read(&mut [0u8; 1])? != 0 {
        return Err(Error::corrupt(path, "trailing bytes after payload"));
    }

    Ok((table, header))
}
