//! Synchronization of one target language against the source language
//!
//! For a target language the synchronizer:
//!
//! 1. flattens the source tree and the existing target tree
//! 2. lists the keys the target is missing
//! 3. resolves each missing phrase from the [`TranslationCache`], sending only
//!    the misses to the [`BatchTranslator`], each distinct phrase once
//! 4. caches new translations as every chunk lands
//! 5. merges the results into the existing translations, filling blanks only
//! 6. rebuilds the tree and hands it to the [`LocaleStore`]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::TranslationCache;
use crate::config::SyncConfig;
use crate::diff::{is_blank, missing_keys};
use crate::error::{SyncError, SyncResult};
use crate::mt::{BatchTranslator, MachineTranslator};
use crate::store::{JsonDirStore, LocaleStore, ScratchStore};
use crate::tree::{FlatMap, KEY_SEPARATOR, KeyTree, flatten, unflatten};

/// What one synchronization pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Keys the target lacked before the pass
    pub missing: usize,
    /// Filled from the translation cache
    pub cached: usize,
    /// Filled with fresh backend translations
    pub translated: usize,
    /// Non-text leaves copied from the source as they are
    pub copied: usize,
    /// Filled with source text after the backend gave up (keep-source policy)
    pub kept_source: usize,
    /// Left blank because the backend returned an empty translation
    pub unresolved: usize,
    /// Left out because an existing value sits above or below the key
    pub conflicts: usize,
}

impl SyncStats {
    /// Number of keys that received a value
    pub fn filled(&self) -> usize {
        self.cached + self.translated + self.copied + self.kept_source
    }
}

/// Where a filled value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    Cached,
    Translated,
    Copied,
    KeptSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub tree: KeyTree,
    pub stats: SyncStats,
}

/// Brings target languages up to date with the source language
#[derive(Clone)]
pub struct LanguageSynchronizer {
    source_lang: String,
    translator: BatchTranslator,
    cache: Arc<TranslationCache>,
    store: Arc<dyn LocaleStore>,
}

impl std::fmt::Debug for LanguageSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageSynchronizer")
            .field("source_lang", &self.source_lang)
            .field("translator", &self.translator)
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}

impl LanguageSynchronizer {
    pub fn new(
        source_lang: impl Into<String>,
        translator: BatchTranslator,
        cache: Arc<TranslationCache>,
        store: Arc<dyn LocaleStore>,
    ) -> Self {
        Self {
            source_lang: source_lang.into(),
            translator,
            cache,
            store,
        }
    }

    /// Wire up a synchronizer for `<locale_dir>/<lang>.json` files and the
    /// configured cache file, using `provider` as the backend
    pub fn from_config(config: &SyncConfig, provider: Arc<dyn MachineTranslator>) -> Self {
        let translator = BatchTranslator::new(provider)
            .with_batch_size(config.batch_size)
            .with_pacing(config.pacing)
            .with_retry(config.retry_policy())
            .with_failure_policy(config.on_failure);

        Self::new(
            config.source_lang.clone(),
            translator,
            Arc::new(TranslationCache::load_or_empty(&config.cache_file)),
            Arc::new(JsonDirStore::new(&config.locale_dir)),
        )
    }

    /// Like [`from_config`](Self::from_config), but nothing on disk is touched
    ///
    /// Locale files are read from `locale_dir` while saves stay in memory, and
    /// the translation cache starts empty and is never flushed.
    pub fn dry_run(config: &SyncConfig, provider: Arc<dyn MachineTranslator>) -> Self {
        let translator = BatchTranslator::new(provider)
            .with_batch_size(config.batch_size)
            .with_pacing(config.pacing)
            .with_retry(config.retry_policy())
            .with_failure_policy(config.on_failure);

        Self::new(
            config.source_lang.clone(),
            translator,
            Arc::new(TranslationCache::in_memory()),
            Arc::new(ScratchStore::new(Arc::new(JsonDirStore::new(&config.locale_dir)))),
        )
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn store(&self) -> &dyn LocaleStore {
        self.store.as_ref()
    }

    /// Load the source tree; a missing source file is fatal
    pub fn load_source(&self) -> SyncResult<KeyTree> {
        self.store
            .load(&self.source_lang)?
            .ok_or_else(|| SyncError::SourceMissing(self.store.location(&self.source_lang)))
    }

    /// Compute the updated tree for `target` without touching the store
    ///
    /// Values already present in `existing` are never overwritten; only
    /// absent, `null` or empty keys are filled. When nothing is missing the
    /// existing tree is returned unchanged.
    pub async fn sync(
        &self,
        target: &str,
        source: &KeyTree,
        existing: &KeyTree,
    ) -> SyncResult<SyncOutcome> {
        let source_flat = flatten(source);
        let existing_flat = flatten(existing);
        let missing = missing_keys(&source_flat, &existing_flat);

        if missing.is_empty() {
            info!("{}: complete", target);
            return Ok(SyncOutcome {
                tree: existing.clone(),
                stats: SyncStats::default(),
            });
        }
        info!("{}: {} keys to fill", target, missing.len());

        let mut stats = SyncStats {
            missing: missing.len(),
            ..SyncStats::default()
        };
        let mut resolved: Vec<(String, Value, Fill)> = Vec::new();
        // (key, source text) waiting for the backend
        let mut pending: Vec<(String, String)> = Vec::new();
        // Distinct source texts to send, first occurrence order
        let mut misses: Vec<String> = Vec::new();
        let mut queued: HashSet<String> = HashSet::new();

        for key in missing {
            let Some(value) = source_flat.get(&key) else {
                continue;
            };
            let Value::String(text) = value else {
                resolved.push((key, value.clone(), Fill::Copied));
                continue;
            };
            if let Some(hit) = self.cache.get(&self.source_lang, target, text) {
                resolved.push((key, Value::String(hit), Fill::Cached));
                continue;
            }
            if queued.insert(text.clone()) {
                misses.push(text.clone());
            }
            pending.push((key, text.clone()));
        }
        debug!(
            "{}: {} cache hits, {} distinct phrases to translate",
            target,
            resolved.iter().filter(|(_, _, fill)| *fill == Fill::Cached).count(),
            misses.len()
        );

        let mut delivered: HashSet<String> = HashSet::new();
        let cache = &self.cache;
        let source_lang = self.source_lang.as_str();
        let translations = self
            .translator
            .translate_batch_with(&misses, source_lang, target, |texts, translated| {
                cache.put_many(
                    source_lang,
                    target,
                    texts
                        .iter()
                        .zip(translated)
                        .filter(|(_, out)| !out.is_empty())
                        .map(|(text, out)| (text.as_str(), out.as_str())),
                );
                delivered.extend(texts.iter().cloned());
            })
            .await
            .map_err(|source| SyncError::Translation {
                lang: target.to_string(),
                source,
            })?;

        let by_text: HashMap<&str, &str> = misses
            .iter()
            .map(String::as_str)
            .zip(translations.iter().map(String::as_str))
            .collect();

        for (key, text) in pending {
            match by_text.get(text.as_str()) {
                Some(out) if !out.is_empty() => {
                    let fill = if delivered.contains(&text) {
                        Fill::Translated
                    } else {
                        Fill::KeptSource
                    };
                    resolved.push((key, Value::String((*out).to_string()), fill));
                }
                _ => {
                    warn!("{}: empty translation for '{}', leaving it blank", target, key);
                    stats.unresolved += 1;
                }
            }
        }

        let mut merged = existing_flat;
        for (key, value, fill) in resolved {
            if !is_blank(merged.get(&key)) {
                continue;
            }
            if let Some(holder) = conflicting_path(&merged, &key) {
                warn!(
                    "{}: '{}' clashes with existing '{}', leaving it out",
                    target, key, holder
                );
                stats.conflicts += 1;
                continue;
            }
            clear_blank_relatives(&mut merged, &key);
            merged.insert(key, value);
            match fill {
                Fill::Cached => stats.cached += 1,
                Fill::Translated => stats.translated += 1,
                Fill::Copied => stats.copied += 1,
                Fill::KeptSource => stats.kept_source += 1,
            }
        }

        info!(
            "{}: {} cached, {} translated, {} copied, {} kept source, {} unresolved, {} conflicts",
            target,
            stats.cached,
            stats.translated,
            stats.copied,
            stats.kept_source,
            stats.unresolved,
            stats.conflicts
        );

        Ok(SyncOutcome {
            tree: unflatten(&merged),
            stats,
        })
    }

    /// Load `target` from the store, synchronize it and write it back
    ///
    /// The file is rewritten in full, and only when the pass succeeded and
    /// either filled something or the file did not exist yet.
    pub async fn sync_language(&self, target: &str, source: &KeyTree) -> SyncResult<SyncStats> {
        let existing = self.store.load(target)?;
        let existed = existing.is_some();
        let existing = existing.unwrap_or_default();

        let outcome = self.sync(target, source, &existing).await?;

        if existed && outcome.stats.filled() == 0 {
            debug!("{}: nothing to write", target);
            return Ok(outcome.stats);
        }

        self.store.save(target, &outcome.tree)?;
        info!("Saved {}", self.store.location(target).display());
        Ok(outcome.stats)
    }
}

/// First existing non-blank path that is an ancestor or a descendant of `key`
///
/// Writing `key` next to such a path would make one of the two disappear when
/// the flat map is turned back into a tree.
fn conflicting_path(flat: &FlatMap, key: &str) -> Option<String> {
    let ancestor = key
        .match_indices(KEY_SEPARATOR)
        .map(|(at, _)| &key[..at])
        .find(|prefix| !is_blank(flat.get(*prefix)));
    if let Some(prefix) = ancestor {
        return Some(prefix.to_string());
    }

    let nested = format!("{}{}", key, KEY_SEPARATOR);
    flat.range(nested.clone()..)
        .take_while(|(path, _)| path.starts_with(&nested))
        .find(|(_, value)| !is_blank(Some(*value)))
        .map(|(path, _)| path.clone())
}

/// Drop blank ancestors and descendants of `key` so it can take their place
fn clear_blank_relatives(flat: &mut FlatMap, key: &str) {
    for (at, _) in key.match_indices(KEY_SEPARATOR) {
        flat.remove(&key[..at]);
    }
    let nested = format!("{}{}", key, KEY_SEPARATOR);
    flat.retain(|path, _| !path.starts_with(&nested));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::{FailurePolicy, MockMode, MockTranslator, MtError, MtResult, RetryPolicy};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn tree(value: Value) -> KeyTree {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn spanish(pairs: &[(&str, &str)]) -> MockTranslator {
        let map = pairs
            .iter()
            .map(|(src, out)| ((src.to_string(), "es".to_string()), out.to_string()))
            .collect();
        MockTranslator::new(MockMode::Mappings(map))
    }

    fn synchronizer(
        mock: &MockTranslator,
        cache: Arc<TranslationCache>,
        store: Arc<MemoryStore>,
    ) -> LanguageSynchronizer {
        let translator = BatchTranslator::new(Arc::new(mock.clone()))
            .with_pacing(Duration::ZERO)
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)));
        LanguageSynchronizer::new("en", translator, cache, store)
    }

    #[tokio::test]
    async fn test_fills_only_missing_keys() {
        let mock = spanish(&[("Bye", "Adiós")]);
        let sync = synchronizer(
            &mock,
            Arc::new(TranslationCache::in_memory()),
            Arc::new(MemoryStore::new()),
        );

        let outcome = sync
            .sync(
                "es",
                &tree(json!({ "greeting": "Hello", "farewell": "Bye" })),
                &tree(json!({ "greeting": "Hola" })),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.tree,
            tree(json!({ "greeting": "Hola", "farewell": "Adiós" }))
        );
        assert_eq!(mock.calls(), vec![vec!["Bye".to_string()]]);
        assert_eq!(outcome.stats.translated, 1);
    }

    #[tokio::test]
    async fn test_complete_target_is_returned_unchanged() {
        let mock = spanish(&[]);
        let sync = synchronizer(
            &mock,
            Arc::new(TranslationCache::in_memory()),
            Arc::new(MemoryStore::new()),
        );
        let existing = tree(json!({ "a": "A", "empty": {}, "extra": "kept" }));

        let outcome = sync
            .sync("es", &tree(json!({ "a": "x" })), &existing)
            .await
            .unwrap();

        assert_eq!(outcome.tree, existing);
        assert_eq!(outcome.stats, SyncStats::default());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_manual_values_are_never_overwritten() {
        let mock = spanish(&[("Save", "Guardar")]);
        let cache = Arc::new(TranslationCache::in_memory());
        cache.put("en", "es", "Open", "Abrir (máquina)");
        let sync = synchronizer(&mock, cache, Arc::new(MemoryStore::new()));

        let outcome = sync
            .sync(
                "es",
                &tree(json!({ "menu": { "open": "Open", "save": "Save" } })),
                &tree(json!({ "menu": { "open": "Abrir archivo", "save": "" } })),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.tree,
            tree(json!({ "menu": { "open": "Abrir archivo", "save": "Guardar" } }))
        );
    }

    #[tokio::test]
    async fn test_cache_hits_skip_the_backend() {
        let mock = spanish(&[]);
        let cache = Arc::new(TranslationCache::in_memory());
        cache.put("en", "es", "Bye", "Chao");
        let sync = synchronizer(&mock, cache, Arc::new(MemoryStore::new()));

        let outcome = sync
            .sync("es", &tree(json!({ "farewell": "Bye" })), &KeyTree::new())
            .await
            .unwrap();

        assert_eq!(outcome.tree, tree(json!({ "farewell": "Chao" })));
        assert_eq!(outcome.stats.cached, 1);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_phrases_are_translated_once() {
        let mock = spanish(&[("OK", "Vale")]);
        let cache = Arc::new(TranslationCache::in_memory());
        let sync = synchronizer(&mock, cache.clone(), Arc::new(MemoryStore::new()));

        let outcome = sync
            .sync(
                "es",
                &tree(json!({ "dialog": { "ok": "OK" }, "form": { "ok": "OK" } })),
                &KeyTree::new(),
            )
            .await
            .unwrap();

        assert_eq!(mock.calls(), vec![vec!["OK".to_string()]]);
        assert_eq!(
            outcome.tree,
            tree(json!({ "dialog": { "ok": "Vale" }, "form": { "ok": "Vale" } }))
        );
        assert_eq!(outcome.stats.translated, 2);
        assert_eq!(cache.get("en", "es", "OK").as_deref(), Some("Vale"));
    }

    #[tokio::test]
    async fn test_non_text_leaves_are_copied() {
        let mock = spanish(&[("Title", "Título")]);
        let sync = synchronizer(
            &mock,
            Arc::new(TranslationCache::in_memory()),
            Arc::new(MemoryStore::new()),
        );

        let outcome = sync
            .sync(
                "es",
                &tree(json!({ "title": "Title", "max": 10, "beta": true, "tags": ["a"] })),
                &KeyTree::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.tree,
            tree(json!({ "title": "Título", "max": 10, "beta": true, "tags": ["a"] }))
        );
        assert_eq!(outcome.stats.copied, 3);
        assert_eq!(mock.calls(), vec![vec!["Title".to_string()]]);
    }

    #[tokio::test]
    async fn test_backend_failure_fails_the_language() {
        let mock = MockTranslator::new(MockMode::Error("down".to_string()));
        let store = Arc::new(MemoryStore::new().with_tree("es", tree(json!({ "a": "Á" }))));
        let sync = synchronizer(&mock, Arc::new(TranslationCache::in_memory()), store.clone());

        let result = sync
            .sync_language("es", &tree(json!({ "a": "A", "b": "B" })))
            .await;

        match result {
            Err(SyncError::Translation { lang, source }) => {
                assert_eq!(lang, "es");
                assert_eq!(source, MtError::TranslationError("down".to_string()));
            }
            other => panic!("Expected Translation error, got {:?}", other),
        }
        // Stored file untouched
        assert_eq!(store.get("es"), Some(tree(json!({ "a": "Á" }))));
    }

    #[tokio::test]
    async fn test_keep_source_policy_fills_with_source_text() {
        let mock = MockTranslator::new(MockMode::Error("down".to_string()));
        let cache = Arc::new(TranslationCache::in_memory());
        let translator = BatchTranslator::new(Arc::new(mock.clone()))
            .with_pacing(Duration::ZERO)
            .with_retry(RetryPolicy::new(1, Duration::ZERO))
            .with_failure_policy(FailurePolicy::KeepSource);
        let sync =
            LanguageSynchronizer::new("en", translator, cache.clone(), Arc::new(MemoryStore::new()));

        let outcome = sync
            .sync("es", &tree(json!({ "a": "Apple" })), &KeyTree::new())
            .await
            .unwrap();

        assert_eq!(outcome.tree, tree(json!({ "a": "Apple" })));
        assert_eq!(outcome.stats.kept_source, 1);
        // Fallback text is not a translation and must not be cached
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sync_language_writes_store() {
        let mock = spanish(&[("Bye", "Adiós")]);
        let store = Arc::new(
            MemoryStore::new()
                .with_tree("en", tree(json!({ "greeting": "Hello", "farewell": "Bye" })))
                .with_tree("es", tree(json!({ "greeting": "Hola" }))),
        );
        let sync = synchronizer(&mock, Arc::new(TranslationCache::in_memory()), store.clone());

        let source = sync.load_source().unwrap();
        let stats = sync.sync_language("es", &source).await.unwrap();

        assert_eq!(stats.filled(), 1);
        assert_eq!(
            store.get("es"),
            Some(tree(json!({ "greeting": "Hola", "farewell": "Adiós" })))
        );
    }

    #[tokio::test]
    async fn test_missing_source_is_reported() {
        let mock = spanish(&[]);
        let sync = synchronizer(
            &mock,
            Arc::new(TranslationCache::in_memory()),
            Arc::new(MemoryStore::new()),
        );

        assert!(matches!(sync.load_source(), Err(SyncError::SourceMissing(_))));
    }

    #[tokio::test]
    async fn test_existing_leaf_blocks_nested_source_key() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let sync = synchronizer(
            &mock,
            Arc::new(TranslationCache::in_memory()),
            Arc::new(MemoryStore::new()),
        );

        let outcome = sync
            .sync(
                "es",
                &tree(json!({ "a": { "b": "x" }, "c": "y" })),
                &tree(json!({ "a": "manual" })),
            )
            .await
            .unwrap();

        assert_eq!(outcome.tree, tree(json!({ "a": "manual", "c": "y_es" })));
        assert_eq!(outcome.stats.conflicts, 1);
        assert_eq!(outcome.stats.translated, 1);
        assert_eq!(outcome.stats.filled(), 1);
    }

    #[tokio::test]
    async fn test_existing_subtree_blocks_source_leaf() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let cache = Arc::new(TranslationCache::in_memory());
        cache.put("en", "es", "x", "equis");
        let existing = tree(json!({ "a": { "b": "manual" } }));
        let store = Arc::new(MemoryStore::new().with_tree("es", existing.clone()));
        let sync = synchronizer(&mock, cache, store.clone());

        let outcome = sync
            .sync("es", &tree(json!({ "a": "x" })), &existing)
            .await
            .unwrap();
        assert_eq!(outcome.tree, existing);
        assert_eq!(outcome.stats.conflicts, 1);
        assert_eq!(outcome.stats.cached, 0);
        assert_eq!(outcome.stats.filled(), 0);

        // Nothing was filled, so the stored file is not rewritten
        let stats = sync
            .sync_language("es", &tree(json!({ "a": "x" })))
            .await
            .unwrap();
        assert_eq!(stats.filled(), 0);
        assert_eq!(store.get("es"), Some(existing));
    }

    #[tokio::test]
    async fn test_blank_relatives_give_way_to_source_shape() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let sync = synchronizer(
            &mock,
            Arc::new(TranslationCache::in_memory()),
            Arc::new(MemoryStore::new()),
        );

        let outcome = sync
            .sync(
                "es",
                &tree(json!({ "a": { "b": "x" }, "c": "y" })),
                &tree(json!({ "a": "", "c": { "d": null } })),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.tree,
            tree(json!({ "a": { "b": "x_es" }, "c": "y_es" }))
        );
        assert_eq!(outcome.stats.conflicts, 0);
        assert_eq!(outcome.stats.translated, 2);
    }

    /// Answers the first request, then rejects every following one
    struct FirstRequestOnly {
        requests: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MachineTranslator for FirstRequestOnly {
        async fn translate(&self, text: &str, _: &str, target: &str) -> MtResult<String> {
            Ok(format!("{}_{}", text, target))
        }

        async fn translate_batch(
            &self,
            texts: &[String],
            _: &str,
            target: &str,
        ) -> MtResult<Vec<String>> {
            let seen = self
                .requests
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if seen > 0 {
                return Err(MtError::ClientError {
                    status: 400,
                    message: "quota exceeded".to_string(),
                });
            }
            Ok(texts.iter().map(|t| format!("{}_{}", t, target)).collect())
        }

        fn provider_name(&self) -> &str {
            "FirstRequestOnly"
        }
    }

    #[tokio::test]
    async fn test_landed_chunks_stay_cached_when_a_later_chunk_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache_path = dir.path().join("translation-cache.json");
        let provider = Arc::new(FirstRequestOnly {
            requests: std::sync::atomic::AtomicUsize::new(0),
        });
        let translator = BatchTranslator::new(provider)
            .with_batch_size(1)
            .with_pacing(Duration::ZERO)
            .with_retry(RetryPolicy::new(3, Duration::from_millis(1)));
        let cache = Arc::new(TranslationCache::load_or_empty(&cache_path));
        let store = Arc::new(MemoryStore::new());
        let sync = LanguageSynchronizer::new("en", translator, cache.clone(), store.clone());

        let result = sync
            .sync_language("es", &tree(json!({ "a": "Apple", "b": "Banana" })))
            .await;

        assert!(matches!(result, Err(SyncError::Translation { .. })));
        assert_eq!(store.get("es"), None);
        assert_eq!(cache.get("en", "es", "Apple").as_deref(), Some("Apple_es"));
        assert_eq!(cache.get("en", "es", "Banana"), None);

        // The first chunk reached the cache file before the language failed
        let reloaded = TranslationCache::load_or_empty(&cache_path);
        assert_eq!(reloaded.get("en", "es", "Apple").as_deref(), Some("Apple_es"));
        assert_eq!(reloaded.len(), 1);
    }
}
