use crate::document::{DocId, Document};
use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Term -> ids of the documents containing it, in first-seen order
pub type Postings = HashMap<String, Vec<DocId>>;
/// Document -> (term -> raw occurrence count)
pub type TermFrequencies = BTreeMap<DocId, HashMap<String, u32>>;
/// Document -> token count after normalization
pub type DocLengths = BTreeMap<DocId, usize>;
pub type DocumentStore = BTreeMap<DocId, Document>;

/// Inverted index over a fixed document collection.
///
/// The four tables are only ever populated together, by [`InvertedIndex::build`]
/// or [`InvertedIndex::from_parts`], so every published index satisfies the
/// invariants checked in `validate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    documents: DocumentStore,
    postings: Postings,
    term_frequencies: TermFrequencies,
    doc_lengths: DocLengths,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk build from a document collection
    pub fn build<I>(documents: I, tokenizer: &Tokenizer) -> Result<Self>
    where
        I: IntoIterator<Item = Document>,
    {
        let start = Instant::now();
        let mut index = Self::new();

        for doc in documents {
            if index.documents.contains_key(&doc.id) {
                return Err(Error::DuplicateDocument(doc.id));
            }
            let tokens = tokenizer.tokenize(&doc.searchable_text());
            index.add_document(doc, tokens);
        }

        tracing::info!(
            "Indexed {} documents ({} terms) in {:?}",
            index.total_documents(),
            index.postings.len(),
            start.elapsed()
        );
        Ok(index)
    }

    fn add_document(&mut self, doc: Document, tokens: Vec<String>) {
        let doc_id = doc.id;
        let mut counts: HashMap<String, u32> = HashMap::new();

        self.doc_lengths.insert(doc_id, tokens.len());
        for token in tokens {
            let count = counts.entry(token.clone()).or_insert(0);
            if *count == 0 {
                self.postings.entry(token).or_default().push(doc_id);
            }
            *count += 1;
        }

        self.term_frequencies.insert(doc_id, counts);
        self.documents.insert(doc_id, doc);
    }

    /// Reassemble an index from persisted tables, rejecting inconsistent sets
    pub fn from_parts(
        documents: DocumentStore,
        postings: Postings,
        term_frequencies: TermFrequencies,
        doc_lengths: DocLengths,
    ) -> std::result::Result<Self, String> {
        let index = Self {
            documents,
            postings,
            term_frequencies,
            doc_lengths,
        };
        index.validate()?;
        Ok(index)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.documents.keys().eq(self.term_frequencies.keys())
            || !self.documents.keys().eq(self.doc_lengths.keys())
        {
            return Err("document store, term frequencies and lengths disagree on ids".to_string());
        }

        if let Some((id, doc)) = self.documents.iter().find(|(id, doc)| **id != doc.id) {
            return Err(format!("document stored under {} has id {}", id, doc.id));
        }

        let mut expected: HashMap<&str, usize> = HashMap::new();
        for (doc_id, counts) in &self.term_frequencies {
            let length: u64 = counts.values().map(|&c| u64::from(c)).sum();
            if self.doc_lengths.get(doc_id).map(|&l| l as u64) != Some(length) {
                return Err(format!("length of document {} does not match its term counts", doc_id));
            }

            for (term, &count) in counts {
                if count == 0 {
                    return Err(format!("zero count for {:?} in document {}", term, doc_id));
                }
                let listed = self
                    .postings
                    .get(term)
                    .map_or(false, |ids| ids.contains(doc_id));
                if !listed {
                    return Err(format!("document {} missing from postings of {:?}", doc_id, term));
                }
                *expected.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        for (term, ids) in &self.postings {
            if expected.get(term.as_str()) != Some(&ids.len()) {
                return Err(format!("postings of {:?} do not match term frequencies", term));
            }
        }

        Ok(())
    }

    /// Get sorted ids of documents containing a term
    pub fn get_documents(&self, term: &str) -> Vec<DocId> {
        let mut ids = self.postings.get(term).cloned().unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Postings list in build order
    pub fn postings(&self, term: &str) -> Option<&[DocId]> {
        self.postings.get(term).map(Vec::as_slice)
    }

    /// Get number of documents containing a term (for IDF calculation)
    pub fn doc_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.postings.contains_key(term)
    }

    /// Every indexed document id, ascending
    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.documents.keys().copied()
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.documents.get(&doc_id)
    }

    /// Raw count of a term in a document, `None` when the document is not indexed
    pub fn term_count(&self, doc_id: DocId, term: &str) -> Option<u32> {
        self.term_frequencies
            .get(&doc_id)
            .map(|counts| counts.get(term).copied().unwrap_or(0))
    }

    pub fn doc_length(&self, doc_id: DocId) -> Option<usize> {
        self.doc_lengths.get(&doc_id).copied()
    }

    /// Get total number of indexed documents
    pub fn total_documents(&self) -> usize {
        self.documents.len()
    }

    /// Average token count per document, recomputed on every call
    pub fn avg_doc_length(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        let total: usize = self.doc_lengths.values().sum();
        total as f64 / self.doc_lengths.len() as f64
    }

    pub(crate) fn tables(&self) -> (&DocumentStore, &Postings, &TermFrequencies, &DocLengths) {
        (
            &self.documents,
            &self.postings,
            &self.term_frequencies,
            &self.doc_lengths,
        )
    }

    /// Get index statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_documents: self.total_documents(),
            total_terms: self.postings.len(),
            avg_doc_length: self.avg_doc_length(),
            avg_docs_per_term: if self.postings.is_empty() {
                0.0
            } else {
                self.postings.values().map(Vec::len).sum::<usize>() as f64 / self.postings.len() as f64
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub total_terms: usize,
    pub avg_doc_length: f64,
    pub avg_docs_per_term: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::StopWords;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(StopWords::from_words(["the", "a", "in"]))
    }

    fn sample() -> InvertedIndex {
        let docs = vec![
            Document::new(3, "Bear Story", "A bear, a bear and the forest"),
            Document::new(1, "Brave", "bear in the forest"),
            Document::new(2, "Knight", "castle"),
        ];
        InvertedIndex::build(docs, &tokenizer()).unwrap()
    }

    #[test]
    fn test_build_tables() {
        let index = sample();

        assert_eq!(index.total_documents(), 3);
        assert_eq!(index.doc_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(index.term_count(3, "bear"), Some(3));
        assert_eq!(index.term_count(3, "knight"), Some(0));
        assert_eq!(index.term_count(9, "bear"), None);
        assert_eq!(index.doc_length(3), Some(6));
        assert_eq!(index.doc_length(2), Some(2));
    }

    #[test]
    fn test_postings_keep_build_order_without_duplicates() {
        let index = sample();

        assert_eq!(index.postings("bear"), Some(&[3, 1][..]));
        assert_eq!(index.get_documents("bear"), vec![1, 3]);
        assert_eq!(index.doc_frequency("bear"), 2);
        assert_eq!(index.doc_frequency("dragon"), 0);
        assert!(index.get_documents("dragon").is_empty());
    }

    #[test]
    fn test_avg_doc_length() {
        let index = sample();
        assert!((index.avg_doc_length() - 11.0 / 3.0).abs() < 1e-12);
        assert_eq!(InvertedIndex::new().avg_doc_length(), 0.0);
    }

    #[test]
    fn test_duplicate_document_rejected() {
        let docs = vec![Document::new(1, "a", "b"), Document::new(1, "c", "d")];
        let result = InvertedIndex::build(docs, &tokenizer());
        assert!(matches!(result, Err(Error::DuplicateDocument(1))));
    }

    #[test]
    fn test_empty_document_is_indexed() {
        let index = InvertedIndex::build(vec![Document::new(5, "The", "a")], &tokenizer()).unwrap();
        assert_eq!(index.doc_length(5), Some(0));
        assert_eq!(index.term_count(5, "anything"), Some(0));
        assert_eq!(index.stats().total_terms, 0);
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_tables() {
        let index = sample();
        let (documents, postings, tfs, lengths) = index.tables();

        let rebuilt = InvertedIndex::from_parts(
            documents.clone(),
            postings.clone(),
            tfs.clone(),
            lengths.clone(),
        );
        assert_eq!(rebuilt.unwrap(), index);

        let mut bad_postings = postings.clone();
        bad_postings.insert("ghost".to_string(), vec![1]);
        assert!(InvertedIndex::from_parts(documents.clone(), bad_postings, tfs.clone(), lengths.clone()).is_err());

        let mut bad_lengths = lengths.clone();
        bad_lengths.remove(&2);
        assert!(InvertedIndex::from_parts(documents.clone(), postings.clone(), tfs.clone(), bad_lengths).is_err());
    }
}
