//! Keyword search over a small document collection: an inverted index with
//! TF, IDF and BM25 scoring, cached on disk between runs.

pub mod api;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod loader;
pub mod ranking;
pub mod storage;
pub mod tokenizer;

// Re-export commonly used types
pub use config::Config;
pub use document::{DocId, Document};
pub use engine::{SearchEngine, SearchResult};
pub use error::{Error, Result};
pub use index::{IndexStats, InvertedIndex};
pub use ranking::{Bm25Params, Scorer};
pub use storage::Storage;
pub use tokenizer::{StopWords, Tokenizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
