use crate::document::{DocId, Document};
use crate::error::{Error, Result};
use crate::index::{IndexStats, InvertedIndex};
use crate::ranking::{rank_documents, Bm25Params, Scorer};
use crate::storage::Storage;
use crate::tokenizer::Tokenizer;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document: Document,
    pub score: f64,
}

/// Main search engine
///
/// The published index is immutable: readers clone the `Arc` and work on that
/// snapshot, while `build` and `load` construct a replacement off to the side
/// and publish it with a single swap. A failed build or load leaves the
/// previous index in place.
pub struct SearchEngine {
    tokenizer: Tokenizer,
    params: Bm25Params,
    index: RwLock<Arc<InvertedIndex>>,
    writer: Mutex<()>,
}

impl SearchEngine {
    /// Create an engine with an empty index
    pub fn new(tokenizer: Tokenizer, params: Bm25Params) -> Self {
        Self::with_index(tokenizer, params, InvertedIndex::new())
    }

    pub fn with_index(tokenizer: Tokenizer, params: Bm25Params, index: InvertedIndex) -> Self {
        Self {
            tokenizer,
            params,
            index: RwLock::new(Arc::new(index)),
            writer: Mutex::new(()),
        }
    }

    /// Current index; stays valid even if a new one is published meanwhile
    pub fn snapshot(&self) -> Arc<InvertedIndex> {
        Arc::clone(&self.index.read())
    }

    fn publish(&self, index: InvertedIndex) {
        *self.index.write() = Arc::new(index);
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Build a fresh index from a document collection and publish it
    pub fn build<I>(&self, documents: I) -> Result<IndexStats>
    where
        I: IntoIterator<Item = Document>,
    {
        let _guard = self.writer.lock();
        let index = InvertedIndex::build(documents, &self.tokenizer)?;
        let stats = index.stats();
        self.publish(index);
        Ok(stats)
    }

    /// Replace the published index with the cached one
    pub fn load(&self, storage: &Storage) -> Result<IndexStats> {
        let _guard = self.writer.lock();
        let index = storage.load()?;
        let stats = index.stats();
        self.publish(index);
        Ok(stats)
    }

    pub fn save(&self, storage: &Storage) -> Result<()> {
        let _guard = self.writer.lock();
        storage.save(&self.snapshot())
    }

    /// Search for documents ranked by BM25
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query_terms = self.tokenizer.tokenize(query);
        tracing::debug!("Query {:?} -> terms {:?}", query, query_terms);

        if query_terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let index = self.snapshot();
        let scorer = Scorer::new(&index, self.params);
        let ranked = rank_documents(&scorer, &query_terms, limit)?;

        ranked
            .into_iter()
            .map(|scored| {
                let document = index
                    .document(scored.doc_id)
                    .cloned()
                    .ok_or(Error::UnknownDocument(scored.doc_id))?;
                Ok(SearchResult {
                    document,
                    score: scored.score,
                })
            })
            .collect()
    }

    /// Get a document by ID
    pub fn get_document(&self, doc_id: DocId) -> Option<Document> {
        self.snapshot().document(doc_id).cloned()
    }

    /// Sorted ids of the documents containing `term`
    pub fn get_documents(&self, term: &str) -> Result<Vec<DocId>> {
        let term = self.tokenizer.single_term(term)?;
        Ok(self.snapshot().get_documents(&term))
    }

    pub fn tf(&self, doc_id: DocId, term: &str) -> Result<u32> {
        let term = self.tokenizer.single_term(term)?;
        let index = self.snapshot();
        Scorer::new(&index, self.params).tf(doc_id, &term)
    }

    pub fn idf(&self, term: &str) -> Result<f64> {
        let term = self.tokenizer.single_term(term)?;
        let index = self.snapshot();
        Ok(Scorer::new(&index, self.params).idf(&term))
    }

    pub fn bm25_idf(&self, term: &str) -> Result<f64> {
        let term = self.tokenizer.single_term(term)?;
        let index = self.snapshot();
        Scorer::new(&index, self.params).bm25_idf(&term)
    }

    /// BM25 term-frequency component; `None` falls back to the engine's tunables
    pub fn bm25_tf(&self, doc_id: DocId, term: &str, k1: Option<f64>, b: Option<f64>) -> Result<f64> {
        let params = Bm25Params::new(k1.unwrap_or(self.params.k1), b.unwrap_or(self.params.b));
        params.validate()?;

        let term = self.tokenizer.single_term(term)?;
        let index = self.snapshot();
        Scorer::new(&index, self.params).bm25_tf(doc_id, &term, params.k1, params.b)
    }

    pub fn tf_idf(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let term = self.tokenizer.single_term(term)?;
        let index = self.snapshot();
        Scorer::new(&index, self.params).tf_idf(doc_id, &term)
    }

    pub fn bm25(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let term = self.tokenizer.single_term(term)?;
        let index = self.snapshot();
        Scorer::new(&index, self.params).bm25(doc_id, &term)
    }

    /// Get index statistics
    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats()
    }
}
