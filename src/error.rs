use crate::document::DocId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the tokenizer, index, scorer and cache.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("expected exactly one term in {text:?}, got {terms}")]
    InvalidQuery { text: String, terms: usize },

    #[error("document {0} is not indexed")]
    UnknownDocument(DocId),

    #[error("term {0:?} is not in the vocabulary")]
    UnknownTerm(String),

    #[error("document id {0} appears more than once in the collection")]
    DuplicateDocument(DocId),

    #[error("corrupt or missing cache at {path}: {reason}")]
    CorruptOrMissingCache { path: PathBuf, reason: String },

    #[error("stop word file not found: {0}")]
    MissingStopWordFile(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptOrMissingCache {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
