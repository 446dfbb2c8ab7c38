use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kwsearch::api::{create_router, AppState};
use kwsearch::{loader, Config, DocId, SearchEngine, StopWords, Storage, Tokenizer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Keyword search over a movie collection using BM25", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Newline-delimited stop word list
    #[arg(long, global = true)]
    stop_words: Option<PathBuf>,

    /// Directory holding the cached index
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// BM25 term frequency saturation
    #[arg(long, global = true)]
    k1: Option<f64>,

    /// BM25 length normalization
    #[arg(long, global = true)]
    b: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the index from the document collection and cache it
    Build {
        #[arg(short, long)]
        documents: Option<PathBuf>,
    },
    /// Search documents using BM25
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Term frequency of a term in a document
    Tf { doc_id: DocId, term: String },
    /// Inverse document frequency of a term
    Idf { term: String },
    /// BM25 inverse document frequency of a term
    #[command(name = "bm25idf")]
    Bm25Idf { term: String },
    /// BM25 term frequency component for a document and term
    #[command(name = "bm25tf")]
    Bm25Tf {
        doc_id: DocId,
        term: String,
        #[arg(value_name = "K1")]
        k1_override: Option<f64>,
        #[arg(value_name = "B")]
        b_override: Option<f64>,
    },
    /// TF-IDF score of a term in a document
    #[command(name = "tfidf")]
    TfIdf { doc_id: DocId, term: String },
    /// BM25 score of a term in a document
    Bm25 { doc_id: DocId, term: String },
    /// Ids of the documents containing a term
    Docs { term: String },
    /// Index statistics
    Stats,
    /// Serve the cached index over HTTP
    Serve {
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(path) = &cli.stop_words {
        config.stop_words = path.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(k1) = cli.k1 {
        config.bm25.k1 = k1;
    }
    if let Some(b) = cli.b {
        config.bm25.b = b;
    }
    config.validate()?;
    Ok(config)
}

fn load_cached(engine: &SearchEngine, storage: &Storage) -> Result<()> {
    engine
        .load(storage)
        .context("No usable index cache; run `kwsearch build` first")?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kwsearch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let stop_words = StopWords::load(&config.stop_words).context("Failed to load stop words")?;
    let engine = SearchEngine::new(Tokenizer::new(stop_words), config.bm25);
    let storage = Storage::new(&config.cache_dir);

    match cli.command {
        Command::Build { documents } => {
            let path = documents.unwrap_or_else(|| config.documents.clone());
            let docs = loader::load_documents(&path)
                .with_context(|| format!("Failed to load documents from {}", path.display()))?;

            let start = Instant::now();
            let stats = engine.build(docs)?;
            engine.save(&storage).context("Failed to save index cache")?;

            println!(
                "Indexed {} documents ({} terms, avg length {:.2}) in {:?}",
                stats.total_documents,
                stats.total_terms,
                stats.avg_doc_length,
                start.elapsed()
            );
        }
        Command::Search { query, limit } => {
            load_cached(&engine, &storage)?;
            println!("Searching for: {}", query);

            let results = engine.search(&query, limit.unwrap_or(config.default_limit))?;
            if results.is_empty() {
                println!("No matching documents");
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. ({}) {} - score {:.2}",
                    i + 1,
                    result.document.id,
                    result.document.title,
                    result.score
                );
            }
        }
        Command::Tf { doc_id, term } => {
            load_cached(&engine, &storage)?;
            let tf = engine.tf(doc_id, &term)?;
            println!("Term frequency of '{}' in document '{}': {}", term, doc_id, tf);
        }
        Command::Idf { term } => {
            load_cached(&engine, &storage)?;
            let idf = engine.idf(&term)?;
            println!("Inverse document frequency of '{}': {:.2}", term, idf);
        }
        Command::Bm25Idf { term } => {
            load_cached(&engine, &storage)?;
            let idf = engine.bm25_idf(&term)?;
            println!("BM25 IDF score of '{}': {:.2}", term, idf);
        }
        Command::Bm25Tf {
            doc_id,
            term,
            k1_override,
            b_override,
        } => {
            load_cached(&engine, &storage)?;
            let tf = engine.bm25_tf(doc_id, &term, k1_override, b_override)?;
            println!("BM25 TF score of '{}' in document '{}': {:.2}", term, doc_id, tf);
        }
        Command::TfIdf { doc_id, term } => {
            load_cached(&engine, &storage)?;
            let score = engine.tf_idf(doc_id, &term)?;
            println!("TF-IDF score of '{}' in document '{}': {:.2}", term, doc_id, score);
        }
        Command::Bm25 { doc_id, term } => {
            load_cached(&engine, &storage)?;
            let score = engine.bm25(doc_id, &term)?;
            println!("BM25 score of '{}' in document '{}': {:.2}", term, doc_id, score);
        }
        Command::Docs { term } => {
            load_cached(&engine, &storage)?;
            let ids = engine.get_documents(&term)?;
            println!("Documents containing '{}': {:?}", term, ids);
        }
        Command::Stats => {
            load_cached(&engine, &storage)?;
            let stats = engine.stats();
            println!("Documents:        {}", stats.total_documents);
            println!("Terms:            {}", stats.total_terms);
            println!("Avg doc length:   {:.2}", stats.avg_doc_length);
            println!("Avg docs / term:  {:.2}", stats.avg_docs_per_term);
        }
        Command::Serve { listen } => {
            load_cached(&engine, &storage)?;
            let listen = listen.unwrap_or(config.listen);
            let state = AppState {
                engine: Arc::new(engine),
                storage,
                default_limit: config.default_limit,
            };

            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(serve(state, listen))?;
        }
    }

    Ok(())
}

async fn serve(state: AppState, listen: SocketAddr) -> Result<()> {
    let app = create_router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    tracing::info!("Listening on http://{}", listen);

    axum::serve(listener, app).await?;
    Ok(())
}
