//! Application paths and settings.
//!
//! Paths are discovered once at startup; user data (uploads, databases,
//! logs) lives under a single data directory overridable via
//! `DOCQA_DATA_DIR`. Settings are loaded from `config.yml` in the data
//! directory when present, otherwise defaults apply.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub log_dir: PathBuf,
    pub index_db_path: PathBuf,
    pub store_db_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        Self::at(data_dir)
    }

    /// Build paths rooted at an explicit directory (used by tests).
    pub fn at(data_dir: PathBuf) -> Self {
        let upload_dir = data_dir.join("uploads");
        let log_dir = data_dir.join("logs");
        let index_db_path = data_dir.join("index.db");
        let store_db_path = data_dir.join("docqa.db");

        for dir in [&data_dir, &upload_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            upload_dir,
            log_dir,
            index_db_path,
            store_db_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("DOCQA_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("data");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir().join(".local/share").to_string_lossy().to_string()
    });
    PathBuf::from(xdg).join("docqa")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Runtime settings for chunking, retrieval, summarization and the
/// model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters.
    pub chunk_overlap: usize,
    /// Number of chunks fetched per retrieval.
    pub retrieval_top_k: usize,
    /// Number of retrieved chunks rendered into the prompt context.
    pub context_top_n: usize,
    /// Retrieval size used when summarizing a whole document.
    pub summary_fetch_k: usize,
    /// Token budget for the summarizer collapse trigger.
    pub summary_token_max: usize,
    /// Ceiling on collapse rounds.
    pub summary_max_collapse_rounds: usize,
    /// Concurrent map-phase completions.
    pub summary_map_concurrency: usize,
    /// Embedding vector dimension expected by the index.
    pub embedding_dimensions: usize,
    /// OpenAI-compatible endpoint base URL.
    pub provider_base_url: String,
    /// API key sent as a bearer token; empty means none.
    pub provider_api_key: String,
    /// Chat completion model id.
    pub chat_model: String,
    /// Embedding model id.
    pub embedding_model: String,
    /// Per-request timeout for provider and index calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            retrieval_top_k: 5,
            context_top_n: 3,
            summary_fetch_k: 500,
            summary_token_max: 3000,
            summary_max_collapse_rounds: 10,
            summary_map_concurrency: 4,
            embedding_dimensions: 1536,
            provider_base_url: "http://127.0.0.1:8080".to_string(),
            provider_api_key: String::new(),
            chat_model: "gpt-4".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Load settings from `config.yml` under the data dir, falling back to
    /// defaults when the file is missing or unreadable.
    pub fn load(paths: &AppPaths) -> Self {
        let path = paths.data_dir.join("config.yml");
        match Self::from_file(&path) {
            Some(settings) => settings,
            None => Settings::default(),
        }
    }

    fn from_file(path: &Path) -> Option<Self> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_yaml::from_str(&raw) {
            Ok(settings) => Some(settings),
            Err(err) => {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert!(settings.chunk_overlap < settings.chunk_size);
        assert!(settings.context_top_n <= settings.retrieval_top_k);
        assert!(settings.summary_max_collapse_rounds >= 1);
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::at(tmp.path().to_path_buf());
        let settings = Settings::load(&paths);
        assert_eq!(settings.chunk_size, 1000);
    }

    #[test]
    fn load_reads_partial_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::at(tmp.path().to_path_buf());
        fs::write(paths.data_dir.join("config.yml"), "chunk_size: 400\n").unwrap();
        let settings = Settings::load(&paths);
        assert_eq!(settings.chunk_size, 400);
        assert_eq!(settings.chunk_overlap, 200);
    }
}
