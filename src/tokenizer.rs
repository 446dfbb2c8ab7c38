use crate::error::{Error, Result};
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

/// Stop words loaded once at startup from a newline-delimited word list.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    /// Read a word list, one word per line. A missing file is fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::MissingStopWordFile(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        let stop_words = Self::from_words(contents.lines());
        tracing::debug!("Loaded {} stop words from {}", stop_words.len(), path.display());
        Ok(stop_words)
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

pub struct Tokenizer {
    stemmer: Stemmer,
    stop_words: StopWords,
}

impl Tokenizer {
    pub fn new(stop_words: StopWords) -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
            stop_words,
        }
    }

    /// Strip ASCII punctuation and lowercase
    fn simplify(&self, text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect::<String>()
            .to_lowercase()
    }

    /// Remove stopwords
    fn stopword_filter<'a>(&self, tokens: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        tokens.filter(|t| !self.stop_words.contains(t)).collect()
    }

    /// Apply stemming
    fn stemmer_filter(&self, tokens: Vec<&str>) -> Vec<String> {
        tokens
            .into_iter()
            .map(|t| self.stemmer.stem(t).into_owned())
            .collect()
    }

    /// Full analysis pipeline
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let simple = self.simplify(text);
        let tokens = self.stopword_filter(simple.split_whitespace());
        self.stemmer_filter(tokens)
    }

    /// Tokenize raw bytes, rejecting anything that is not UTF-8 text.
    pub fn tokenize_bytes(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidInput(format!("input is not UTF-8 text: {}", e)))?;
        Ok(self.tokenize(text))
    }

    /// Normalize text that must reduce to exactly one term.
    pub fn single_term(&self, text: &str) -> Result<String> {
        let mut terms = self.tokenize(text);
        if terms.len() != 1 {
            return Err(Error::InvalidQuery {
                text: text.to_string(),
                terms: terms.len(),
            });
        }
        Ok(terms.remove(0))
    }
}
