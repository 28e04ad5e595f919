use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wordminer_analysis::MemoryStore;
use wordminer_dict::{Dictionary, LoadMode};

use wordminer_server::{AppState, router};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_DICTIONARY_DIR: &str = "data/dictionary";
const DEFAULT_STORE_PATH: &str = "wordminer.json";
const DEFAULT_MAX_TOP_WORDS: usize = 500;
// TraceLayer emits its request spans at debug.
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();
    info!("binding to {}:{}", config.host, config.port);
    info!(
        "using dictionary at {} (mode: {:?})",
        config.dictionary_dir.display(),
        config.dictionary_mode
    );
    match &config.store_path {
        Some(path) => info!("persisting to {}", path.display()),
        None => info!("persistence disabled, state is in-memory only"),
    }

    let start = Instant::now();
    let dictionary = Arc::new(Dictionary::load_with_mode(
        &config.dictionary_dir,
        config.dictionary_mode,
    ));
    info!(
        "dictionary loaded in {} ms ({} entries)",
        start.elapsed().as_millis(),
        dictionary.len()
    );

    let store = match &config.store_path {
        Some(path) => MemoryStore::load_from(path)
            .with_context(|| format!("loading snapshot {}", path.display()))?,
        None => MemoryStore::new(),
    };

    let state = AppState::new(
        dictionary,
        Arc::new(store),
        config.store_path.clone(),
        config.max_top_words,
    );

    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    dictionary_dir: PathBuf,
    dictionary_mode: LoadMode,
    store_path: Option<PathBuf>,
    max_top_words: usize,
}

fn load_config() -> Config {
    let mut no_persist = false;
    let mut cli_dictionary_dir: Option<PathBuf> = None;
    let mut cli_dictionary_mode: Option<LoadMode> = None;
    let mut cli_store_path: Option<PathBuf> = None;
    let mut args = env::args().skip(1).peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-persist" => no_persist = true,
            "--dictionary-dir" => {
                if let Some(path) = args.next() {
                    cli_dictionary_dir = Some(PathBuf::from(path));
                }
            }
            "--store" => {
                if let Some(path) = args.next() {
                    cli_store_path = Some(PathBuf::from(path));
                }
            }
            _ => {
                if let Some(path) = arg.strip_prefix("--dictionary-dir=") {
                    cli_dictionary_dir = Some(PathBuf::from(path));
                } else if let Some(mode) = arg.strip_prefix("--dictionary-mode=") {
                    cli_dictionary_mode = load_mode_from(mode, "--dictionary-mode");
                } else if let Some(path) = arg.strip_prefix("--store=") {
                    cli_store_path = Some(PathBuf::from(path));
                }
            }
        }
    }

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let dictionary_dir = cli_dictionary_dir
        .or_else(|| env::var("DICTIONARY_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DICTIONARY_DIR));
    let dictionary_mode = cli_dictionary_mode
        .or_else(|| {
            env::var("DICTIONARY_LOAD_MODE")
                .ok()
                .and_then(|raw| load_mode_from(&raw, "DICTIONARY_LOAD_MODE"))
        })
        .unwrap_or(LoadMode::Mmap);
    let store_path = if no_persist {
        None
    } else {
        Some(
            cli_store_path
                .or_else(|| env::var("STORE_PATH").ok().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
        )
    };
    let max_top_words = env::var("MAX_TOP_WORDS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_MAX_TOP_WORDS);

    Config {
        host,
        port,
        dictionary_dir,
        dictionary_mode,
        store_path,
        max_top_words,
    }
}

/// Parse a load mode from `source`, falling back to the default on bad input.
fn load_mode_from(raw: &str, source: &str) -> Option<LoadMode> {
    match raw.parse::<LoadMode>() {
        Ok(mode) => Some(mode),
        Err(err) => {
            warn!("ignoring {source}: {err}");
            None
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
