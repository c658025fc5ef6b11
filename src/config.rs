//! Run configuration
//!
//! Settings come from the environment (a `.env` file in the working directory
//! is honoured), and the command line may override any of them.
//!
//! | Variable               | Default                           |
//! |------------------------|-----------------------------------|
//! | `LOCALE_DIR`           | `locale`                          |
//! | `CACHE_FILE`           | `translation-cache.json`          |
//! | `SOURCE_LANG`          | `en`                              |
//! | `LANGUAGES`            | `es,fr`                           |
//! | `LT_URL`               | `http://localhost:5000/translate` |
//! | `LT_API_KEY`           | unset                             |
//! | `CONCURRENCY`          | `3`                               |
//! | `BATCH_SIZE`           | `25`                              |
//! | `RETRIES`              | `5`                               |
//! | `BACKOFF_MS`           | `300`                             |
//! | `PACE_MS`              | `120`                             |
//! | `REQUEST_TIMEOUT_SECS` | `30`                              |
//! | `ON_FAILURE`           | `abort` (or `keep-source`)        |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::mt::{
    BatchTranslator, FailurePolicy, LibreTranslateProvider, RetryPolicy, validate_locale,
};

#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub locale_dir: PathBuf,
    pub cache_file: PathBuf,
    pub source_lang: String,
    pub target_langs: Vec<String>,
    pub backend_url: String,
    pub api_key: Option<String>,
    /// Languages synchronized at the same time
    pub concurrency: usize,
    /// Phrases per backend request
    pub batch_size: usize,
    /// Attempts per backend request, the first one included
    pub retries: usize,
    /// First backoff delay; doubles on every further failure
    pub backoff: Duration,
    /// Pause between two requests of the same language
    pub pacing: Duration,
    pub request_timeout: Duration,
    pub on_failure: FailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            locale_dir: PathBuf::from("locale"),
            cache_file: PathBuf::from("translation-cache.json"),
            source_lang: "en".to_string(),
            target_langs: vec!["es".to_string(), "fr".to_string()],
            backend_url: LibreTranslateProvider::DEFAULT_URL.to_string(),
            api_key: None,
            concurrency: 3,
            batch_size: BatchTranslator::DEFAULT_BATCH_SIZE,
            retries: RetryPolicy::default().attempts,
            backoff: RetryPolicy::default().base_delay,
            pacing: BatchTranslator::DEFAULT_PACING,
            request_timeout: LibreTranslateProvider::DEFAULT_TIMEOUT,
            on_failure: FailurePolicy::default(),
        }
    }
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("locale_dir", &self.locale_dir)
            .field("cache_file", &self.cache_file)
            .field("source_lang", &self.source_lang)
            .field("target_langs", &self.target_langs)
            .field("backend_url", &self.backend_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("concurrency", &self.concurrency)
            .field("batch_size", &self.batch_size)
            .field("retries", &self.retries)
            .field("backoff", &self.backoff)
            .field("pacing", &self.pacing)
            .field("request_timeout", &self.request_timeout)
            .field("on_failure", &self.on_failure)
            .finish()
    }
}

impl SyncConfig {
    /// Build the configuration from the process environment
    ///
    /// A `.env` file is loaded first when present; variables already set in the
    /// environment take precedence over it.
    pub fn from_env() -> SyncResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            locale_dir: get("LOCALE_DIR").map_or(defaults.locale_dir, PathBuf::from),
            cache_file: get("CACHE_FILE").map_or(defaults.cache_file, PathBuf::from),
            source_lang: get("SOURCE_LANG")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.source_lang),
            target_langs: get("LANGUAGES")
                .map(|v| Self::parse_languages(&v))
                .unwrap_or(defaults.target_langs),
            backend_url: get("LT_URL")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.backend_url),
            api_key: get("LT_API_KEY"),
            concurrency: parse_var(get("CONCURRENCY"), "CONCURRENCY", defaults.concurrency)?,
            batch_size: parse_var(get("BATCH_SIZE"), "BATCH_SIZE", defaults.batch_size)?,
            retries: parse_var(get("RETRIES"), "RETRIES", defaults.retries)?,
            backoff: parse_millis(get("BACKOFF_MS"), "BACKOFF_MS", defaults.backoff)?,
            pacing: parse_millis(get("PACE_MS"), "PACE_MS", defaults.pacing)?,
            request_timeout: match get("REQUEST_TIMEOUT_SECS") {
                None => defaults.request_timeout,
                some => Duration::from_secs(parse_var(some, "REQUEST_TIMEOUT_SECS", 0u64)?),
            },
            on_failure: match get("ON_FAILURE") {
                Some(v) => v
                    .parse()
                    .map_err(|e: crate::mt::MtError| SyncError::Config(e.to_string()))?,
                None => defaults.on_failure,
            },
        })
    }

    /// Split a comma separated language list, dropping blanks
    pub fn parse_languages(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> SyncResult<()> {
        if self.concurrency == 0 {
            return Err(SyncError::Config("Concurrency must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(SyncError::Config("Batch size must be at least 1".to_string()));
        }
        if self.retries == 0 {
            return Err(SyncError::Config("Retries must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::Config(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        for lang in std::iter::once(&self.source_lang).chain(&self.target_langs) {
            validate_locale(lang).map_err(|e| SyncError::Config(e.to_string()))?;
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.backoff)
    }

    pub fn source_path(&self) -> PathBuf {
        self.locale_dir.join(format!("{}.json", self.source_lang))
    }
}

fn parse_var<T: FromStr>(raw: Option<String>, key: &str, default: T) -> SyncResult<T> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SyncError::Config(format!("Invalid value for {}: '{}'", key, raw))),
    }
}

fn parse_millis(raw: Option<String>, key: &str, default: Duration) -> SyncResult<Duration> {
    match raw {
        None => Ok(default),
        some => parse_var(some, key, 0u64).map(Duration::from_millis),
    }
}
