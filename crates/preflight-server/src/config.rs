//! Server configuration from environment variables.

use std::path::PathBuf;

const PORT_ENV: &str = "PREFLIGHT_PORT";
const HISTORY_DIR_ENV: &str = "PREFLIGHT_HISTORY_DIR";
const WORKERS_ENV: &str = "PREFLIGHT_WORKERS";
const VALIDATOR_BASE_URL_ENV: &str = "PREFLIGHT_VALIDATOR_BASE_URL";
const VALIDATOR_API_KEY_ENV: &str = "PREFLIGHT_VALIDATOR_API_KEY";
const VALIDATOR_MODEL_ENV: &str = "PREFLIGHT_VALIDATOR_MODEL";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_HISTORY_DIR: &str = ".preflight/history";
const DEFAULT_VALIDATOR_MODEL: &str = "gpt-4o-mini";

/// Runtime configuration for the preflight server.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub history_dir: PathBuf,
    /// Size of the test-execution worker pool.
    pub workers: usize,
    /// OpenAI-compatible endpoint for the bundled validator client, when set.
    pub validator_base_url: Option<String>,
    pub validator_api_key: Option<String>,
    pub validator_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var(PORT_ENV)
            .ok()
            .and_then(|raw| raw.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let history_dir = std::env::var(HISTORY_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_HISTORY_DIR));
        let workers = std::env::var(WORKERS_ENV)
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or_else(default_workers);
        let validator_base_url = std::env::var(VALIDATOR_BASE_URL_ENV).ok();
        let validator_api_key = std::env::var(VALIDATOR_API_KEY_ENV).ok();
        let validator_model = std::env::var(VALIDATOR_MODEL_ENV)
            .unwrap_or_else(|_| DEFAULT_VALIDATOR_MODEL.to_string());

        Config {
            port,
            history_dir,
            workers,
            validator_base_url,
            validator_api_key,
            validator_model,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
            workers: default_workers(),
            validator_base_url: None,
            validator_api_key: None,
            validator_model: DEFAULT_VALIDATOR_MODEL.to_string(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
