//! Persistent cache of translations shared by every language task
//!
//! Entries are keyed by `(source language, target language, source text)` and
//! stored on disk as one flat JSON object:
//!
//! ```json
//! {
//!   "en::es::Bye": "Adiós",
//!   "en::fr::Bye": "Au revoir"
//! }
//! ```
//!
//! The cache is append-only across runs and is flushed to disk every time new
//! entries arrive. Disk problems never fail a run: a cache that cannot be read
//! starts empty, and a flush that cannot be written is logged and skipped while
//! the in-memory entries stay valid.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use crate::store::write_json_pretty;

#[derive(Debug)]
pub struct TranslationCache {
    /// Backing file; `None` keeps the cache purely in memory
    path: Option<PathBuf>,
    /// Guards the whole read-modify-flush cycle
    entries: Mutex<BTreeMap<String, String>>,
}

impl TranslationCache {
    /// Cache that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load the cache file at `path`, falling back to an empty cache
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => {
                debug!("Loaded {} cached translations from {}", entries.len(), path.display());
                entries
            }
            Err(reason) => {
                if path.exists() {
                    warn!("Ignoring translation cache {}: {}", path.display(), reason);
                } else {
                    debug!("No translation cache at {}, starting empty", path.display());
                }
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// Key under which a translation is stored
    pub fn key(source_lang: &str, target_lang: &str, text: &str) -> String {
        format!("{}::{}::{}", source_lang, target_lang, text)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached translation of `text`; empty cached values count as absent
    pub fn get(&self, source_lang: &str, target_lang: &str, text: &str) -> Option<String> {
        self.lock()
            .get(&Self::key(source_lang, target_lang, text))
            .filter(|translated| !translated.is_empty())
            .cloned()
    }

    /// Insert or overwrite one entry and flush
    pub fn put(&self, source_lang: &str, target_lang: &str, text: &str, translated: &str) {
        let mut entries = self.lock();
        entries.insert(
            Self::key(source_lang, target_lang, text),
            translated.to_string(),
        );
        self.flush_locked(&entries);
    }

    /// Insert several `(text, translated)` pairs and flush once
    pub fn put_many<'a, I>(&self, source_lang: &str, target_lang: &str, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut entries = self.lock();
        let mut added = 0;
        for (text, translated) in pairs {
            entries.insert(
                Self::key(source_lang, target_lang, text),
                translated.to_string(),
            );
            added += 1;
        }
        if added > 0 {
            self.flush_locked(&entries);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Best-effort write; the caller holds the lock
    ///
    /// The write is a blocking `std::fs` call made from async tasks, under the
    /// lock. One flush per chunk keeps this to a few small writes per language;
    /// move it onto `tokio::task::spawn_blocking` if cache files grow large.
    fn flush_locked(&self, entries: &BTreeMap<String, String>) {
        let Some(path) = &self.path else {
            return;
        };
        let value = Value::Object(
            entries
                .iter()
                .map(|(key, translated)| (key.clone(), Value::String(translated.clone())))
                .collect(),
        );
        match write_json_pretty(path, &value) {
            Ok(()) => debug!("Flushed {} cached translations", entries.len()),
            Err(e) => warn!("Cache save failed: {}", e),
        }
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}
