use crate::document::DocId;
use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5, // Term frequency saturation parameter
            b: 0.75, // Length normalization parameter
        }
    }
}

impl Bm25Params {
    pub fn new(k1: f64, b: f64) -> Self {
        Self { k1, b }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::Config(format!("k1 must be a finite value >= 0, got {}", self.k1)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(Error::Config(format!("b must lie in [0, 1], got {}", self.b)));
        }
        Ok(())
    }
}

/// Statistical scores over a built index.
///
/// Every method takes an already normalized term. `idf` treats an unknown
/// term as carrying no evidence, while `bm25_idf` (and so `bm25`) rejects it.
pub struct Scorer<'a> {
    index: &'a InvertedIndex,
    params: Bm25Params,
}

impl<'a> Scorer<'a> {
    pub fn new(index: &'a InvertedIndex, params: Bm25Params) -> Self {
        Self { index, params }
    }

    /// Raw occurrence count of `term` in `doc_id`
    pub fn tf(&self, doc_id: DocId, term: &str) -> Result<u32> {
        self.index
            .term_count(doc_id, term)
            .ok_or(Error::UnknownDocument(doc_id))
    }

    /// `ln((N + 1) / (df + 1))`, zero for terms outside the vocabulary
    pub fn idf(&self, term: &str) -> f64 {
        let df = self.index.doc_frequency(term);
        if df == 0 {
            return 0.0;
        }
        let n = self.index.total_documents() as f64;
        ((n + 1.0) / (df as f64 + 1.0)).ln()
    }

    /// `ln((N - df + 0.5) / (df + 0.5) + 1)`
    pub fn bm25_idf(&self, term: &str) -> Result<f64> {
        let df = self.index.doc_frequency(term);
        if df == 0 {
            return Err(Error::UnknownTerm(term.to_string()));
        }
        let n = self.index.total_documents() as f64;
        let df = df as f64;
        Ok(((n - df + 0.5) / (df + 0.5) + 1.0).ln())
    }

    /// Saturated, length-normalized term frequency
    pub fn bm25_tf(&self, doc_id: DocId, term: &str, k1: f64, b: f64) -> Result<f64> {
        let tf = self.tf(doc_id, term)? as f64;
        let doc_length = self
            .index
            .doc_length(doc_id)
            .ok_or(Error::UnknownDocument(doc_id))? as f64;
        let avg_doc_length = self.index.avg_doc_length();

        let length_norm = if avg_doc_length > 0.0 {
            1.0 - b + b * (doc_length / avg_doc_length)
        } else {
            1.0
        };

        let denominator = tf + k1 * length_norm;
        if denominator == 0.0 {
            return Ok(0.0);
        }
        Ok(tf * (k1 + 1.0) / denominator)
    }

    pub fn tf_idf(&self, doc_id: DocId, term: &str) -> Result<f64> {
        Ok(self.tf(doc_id, term)? as f64 * self.idf(term))
    }

    pub fn bm25(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let idf = self.bm25_idf(term)?;
        let tf = self.bm25_tf(doc_id, term, self.params.k1, self.params.b)?;
        Ok(idf * tf)
    }
}

/// Ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: f64,
}

impl ScoredDocument {
    pub fn new(doc_id: DocId, score: f64) -> Self {
        Self { doc_id, score }
    }
}

/// Rank documents using BM25 summed over the query terms.
///
/// Every indexed document is scored, so documents sharing no term with the
/// query still rank with a score of zero. Terms outside the vocabulary add
/// nothing to any score.
pub fn rank_documents(scorer: &Scorer<'_>, query_terms: &[String], limit: usize) -> Result<Vec<ScoredDocument>> {
    if limit == 0 || query_terms.is_empty() {
        return Ok(Vec::new());
    }

    let known_terms: Vec<&str> = query_terms
        .iter()
        .map(String::as_str)
        .filter(|term| scorer.index.contains_term(term))
        .collect();

    let mut scored_docs = Vec::with_capacity(scorer.index.total_documents());
    for doc_id in scorer.index.doc_ids() {
        let mut score = 0.0;
        for term in &known_terms {
            score += scorer.bm25(doc_id, term)?;
        }
        scored_docs.push(ScoredDocument::new(doc_id, score));
    }

    // Sort by score descending, then id ascending
    scored_docs.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.doc_id.cmp(&b.doc_id),
        other => other,
    });
    scored_docs.truncate(limit);

    Ok(scored_docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::tokenizer::{StopWords, Tokenizer};

    fn index(docs: Vec<Document>) -> InvertedIndex {
        let tokenizer = Tokenizer::new(StopWords::from_words(["the", "a"]));
        InvertedIndex::build(docs, &tokenizer).unwrap()
    }

    fn brave_index() -> InvertedIndex {
        index(vec![
            Document::new(1, "Brave", "bear forest"),
            Document::new(2, "Brave", "knight castle"),
        ])
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_tf() {
        let index = brave_index();
        let scorer = Scorer::new(&index, Bm25Params::default());

        assert_eq!(scorer.tf(1, "bear").unwrap(), 1);
        assert_eq!(scorer.tf(1, "knight").unwrap(), 0);
        assert!(matches!(scorer.tf(42, "bear"), Err(Error::UnknownDocument(42))));
    }

    #[test]
    fn test_idf_is_lenient() {
        let index = brave_index();
        let scorer = Scorer::new(&index, Bm25Params::default());

        assert!(approx(scorer.idf("brave"), 0.0));
        assert!(approx(scorer.idf("bear"), (3.0f64 / 2.0).ln()));
        assert_eq!(scorer.idf("dragon"), 0.0);
    }

    #[test]
    fn test_idf_non_increasing_in_df() {
        let docs = (1..=6)
            .map(|id| {
                let words: Vec<&str> = ["alpha", "beta", "gamma", "delta", "omega", "sigma"][..id as usize].to_vec();
                Document::new(id, "", words.join(" "))
            })
            .collect();
        let index = index(docs);
        let scorer = Scorer::new(&index, Bm25Params::default());

        // "alpha" is in every document, "sigma" only in the last one
        let by_df: Vec<f64> = ["sigma", "omega", "delta", "gamma", "beta", "alpha"]
            .iter()
            .map(|t| scorer.idf(t))
            .collect();
        assert!(by_df.windows(2).all(|w| w[0] >= w[1]));

        let bm25_by_df: Vec<f64> = ["sigma", "omega", "delta", "gamma", "beta", "alpha"]
            .iter()
            .map(|t| scorer.bm25_idf(t).unwrap())
            .collect();
        assert!(bm25_by_df.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_bm25_idf_is_strict_and_finite() {
        let index = brave_index();
        let scorer = Scorer::new(&index, Bm25Params::default());

        // df == N
        let idf = scorer.bm25_idf("brave").unwrap();
        assert!(idf.is_finite());
        assert!(approx(idf, (0.5f64 / 2.5 + 1.0).ln()));
        assert!(matches!(scorer.bm25_idf("dragon"), Err(Error::UnknownTerm(_))));
        assert!(matches!(scorer.bm25(1, "dragon"), Err(Error::UnknownTerm(_))));
    }

    #[test]
    fn test_bm25_tf_length_normalization() {
        let index = index(vec![
            Document::new(1, "", "bear"),
            Document::new(2, "", "bear forest forest"),
        ]);
        let scorer = Scorer::new(&index, Bm25Params::default());

        // avg length 2; doc 1 is shorter than average so it scores higher
        let short = scorer.bm25_tf(1, "bear", 1.5, 0.75).unwrap();
        let long = scorer.bm25_tf(2, "bear", 1.5, 0.75).unwrap();
        assert!(approx(short, 2.5 / (1.0 + 1.5 * 0.625)));
        assert!(short > long);

        // b = 0 disables length normalization
        let flat = scorer.bm25_tf(2, "bear", 1.5, 0.0).unwrap();
        assert!(approx(flat, 1.0));

        assert_eq!(scorer.bm25_tf(1, "forest", 1.5, 0.75).unwrap(), 0.0);
        assert!(matches!(
            scorer.bm25_tf(3, "bear", 1.5, 0.75),
            Err(Error::UnknownDocument(3))
        ));
    }

    #[test]
    fn test_bm25_tf_with_empty_corpus_text() {
        let index = index(vec![Document::new(1, "The", "a")]);
        let scorer = Scorer::new(&index, Bm25Params::default());
        assert_eq!(scorer.bm25_tf(1, "bear", 1.5, 0.75).unwrap(), 0.0);
        assert_eq!(scorer.bm25_tf(1, "bear", 0.0, 0.75).unwrap(), 0.0);
    }

    #[test]
    fn test_tf_idf_and_bm25() {
        let index = brave_index();
        let scorer = Scorer::new(&index, Bm25Params::default());

        assert!(approx(scorer.tf_idf(1, "bear").unwrap(), (1.5f64).ln()));
        assert_eq!(scorer.tf_idf(2, "bear").unwrap(), 0.0);

        let expected = scorer.bm25_idf("bear").unwrap() * scorer.bm25_tf(1, "bear", 1.5, 0.75).unwrap();
        assert!(approx(scorer.bm25(1, "bear").unwrap(), expected));
    }

    #[test]
    fn test_rank_documents_tie_break_by_id() {
        let index = index(vec![
            Document::new(9, "Brave", "story"),
            Document::new(4, "Brave", "story"),
            Document::new(6, "Brave bear", ""),
            Document::new(1, "Cat", "story"),
        ]);
        let scorer = Scorer::new(&index, Bm25Params::default());

        // every "brave" document has the same length and tf, so all scores tie
        let ranked = rank_documents(&scorer, &["brave".to_string()], 10).unwrap();
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![4, 6, 9, 1]);
        assert!(ranked[..3].iter().all(|d| d.score == ranked[0].score));
        assert!(ranked[0].score > 0.0);
        assert_eq!(ranked[3].score, 0.0);
    }

    #[test]
    fn test_rank_documents_limits() {
        let index = brave_index();
        let scorer = Scorer::new(&index, Bm25Params::default());
        let query = vec!["brave".to_string()];

        assert!(rank_documents(&scorer, &query, 0).unwrap().is_empty());
        assert!(rank_documents(&scorer, &[], 10).unwrap().is_empty());
        assert_eq!(rank_documents(&scorer, &query, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_rank_documents_scores_every_document() {
        let index = index(vec![
            Document::new(3, "Cars", "racing"),
            Document::new(2, "Knight", "castle"),
            Document::new(1, "Bear", "forest"),
        ]);
        let scorer = Scorer::new(&index, Bm25Params::default());

        // limit above the number of matching documents
        let ranked = rank_documents(&scorer, &["knight".to_string()], 10).unwrap();
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!(ranked[0].score > 0.0);
        assert_eq!(ranked[1].score, 0.0);
        assert_eq!(ranked[2].score, 0.0);

        // unknown terms are skipped, leaving every document at zero in id order
        let ranked = rank_documents(&scorer, &["dragon".to_string()], 2).unwrap();
        assert_eq!(ranked, vec![ScoredDocument::new(1, 0.0), ScoredDocument::new(2, 0.0)]);
    }
}
