use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cli::GlobalArgs;
use crate::{Language, RacePolicy};

/// Legacy key variable from the web build; read when `GEMINI_API_KEY` is unset.
pub const FALLBACK_KEY_VAR: &str = "VITE_GEMINI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown language '{0}' (run `code-review languages` for the list)")]
    UnknownLanguage(String),
    #[error("model name must not be empty")]
    EmptyModel,
    #[error("base URL must start with http:// or https://: {0}")]
    InvalidBaseUrl(String),
    #[error("timeout must be at least one second")]
    ZeroTimeout,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Startup configuration after CLI flags and environment are merged.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub race_policy: RacePolicy,
    /// Explicit `--language`; `None` lets callers infer one.
    pub language: Option<Language>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Resolve from parsed arguments, falling back to `VITE_GEMINI_API_KEY` for the key.
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        Self::resolve(args, std::env::var(FALLBACK_KEY_VAR).ok())
    }

    fn resolve(args: &GlobalArgs, fallback_key: Option<String>) -> Result<Self> {
        let language = args
            .language
            .as_deref()
            .map(|name| Language::find(name).ok_or_else(|| ConfigError::UnknownLanguage(name.to_owned())))
            .transpose()?;

        let model = args.model.trim();
        if model.is_empty() {
            return Err(ConfigError::EmptyModel);
        }

        let base_url = args.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_owned()));
        }

        let timeout = match args.timeout_secs {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let api_key = args
            .api_key
            .clone()
            .or(fallback_key)
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            api_key,
            model: model.to_owned(),
            base_url: base_url.to_owned(),
            timeout,
            race_policy: args.race_policy,
            language,
            log_file: args.log_file.clone(),
        })
    }
}
