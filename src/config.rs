use crate::error::{Error, Result};
use crate::ranking::Bm25Params;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Runtime configuration, resolved once at startup and handed to every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub stop_words: PathBuf,
    pub documents: PathBuf,
    pub cache_dir: PathBuf,
    pub bm25: Bm25Params,
    pub default_limit: usize,
    pub listen: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stop_words: PathBuf::from("data/stop_words.txt"),
            documents: PathBuf::from("data/movies.json"),
            cache_dir: PathBuf::from("cache"),
            bm25: Bm25Params::default(),
            default_limit: 5,
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl Config {
    /// Read a JSON config file; absent keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bm25.validate()
    }
}
