//! Reading and writing whole locale files
//!
//! The pipeline never touches the filesystem directly; it goes through a
//! [`LocaleStore`]. [`JsonDirStore`] keeps one `<lang>.json` file per language
//! in a directory, [`MemoryStore`] keeps trees in memory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::tree::KeyTree;

/// Whole-file persistence of locale trees, keyed by language code
pub trait LocaleStore: Send + Sync {
    /// Load the tree for `lang`, or `None` when the language has no file yet
    fn load(&self, lang: &str) -> SyncResult<Option<KeyTree>>;

    /// Replace the stored tree for `lang`
    fn save(&self, lang: &str, tree: &KeyTree) -> SyncResult<()>;

    /// Human readable location of `lang`'s file, used in messages
    fn location(&self, lang: &str) -> PathBuf;
}

/// Locale files stored as `<dir>/<lang>.json`
///
/// The JSON file should have the following structure:
/// ```json
/// {
///     "greeting": "Hello",
///     "nav": { "home": "Home" }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, lang: &str) -> PathBuf {
        self.dir.join(format!("{}.json", lang))
    }
}

impl LocaleStore for JsonDirStore {
    fn load(&self, lang: &str) -> SyncResult<Option<KeyTree>> {
        let path = self.path_for(lang);
        if !path.exists() {
            return Ok(None);
        }
        read_json_object(&path).map(Some)
    }

    fn save(&self, lang: &str, tree: &KeyTree) -> SyncResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| SyncError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(lang);
        write_json_pretty(&path, &Value::Object(tree.clone()))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn location(&self, lang: &str) -> PathBuf {
        self.path_for(lang)
    }
}

/// Read a JSON file whose root must be an object
pub fn read_json_object(path: &Path) -> SyncResult<KeyTree> {
    let content = fs::read_to_string(path).map_err(|source| SyncError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let json: Value = serde_json::from_str(&content).map_err(|source| SyncError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    match json {
        Value::Object(map) => Ok(map),
        _ => Err(SyncError::InvalidLocaleFile(path.to_path_buf())),
    }
}

/// Write `value` as 2-space indented JSON, replacing the file in one step
///
/// The content goes to a sibling temp file first and is then renamed over the
/// target, so readers never observe a half-written file.
pub fn write_json_pretty(path: &Path, value: &Value) -> SyncResult<()> {
    let mut content = serde_json::to_string_pretty(value).map_err(|source| SyncError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    content.push('\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).map_err(|source| SyncError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| SyncError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// In-memory store, handy for tests and for embedding the pipeline
#[derive(Debug, Default)]
pub struct MemoryStore {
    trees: Mutex<HashMap<String, KeyTree>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(self, lang: &str, tree: KeyTree) -> Self {
        self.trees
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(lang.to_string(), tree);
        self
    }

    pub fn get(&self, lang: &str) -> Option<KeyTree> {
        self.trees
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(lang)
            .cloned()
    }
}

impl LocaleStore for MemoryStore {
    fn load(&self, lang: &str) -> SyncResult<Option<KeyTree>> {
        Ok(self.get(lang))
    }

    fn save(&self, lang: &str, tree: &KeyTree) -> SyncResult<()> {
        self.trees
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(lang.to_string(), tree.clone());
        Ok(())
    }

    fn location(&self, lang: &str) -> PathBuf {
        PathBuf::from(format!("memory://{}", lang))
    }
}

/// Reads through to another store but keeps every write in memory
///
/// Backs dry runs: the pipeline sees the real locale files and nothing is
/// written back to them.
pub struct ScratchStore {
    inner: Arc<dyn LocaleStore>,
    written: MemoryStore,
}

impl ScratchStore {
    pub fn new(inner: Arc<dyn LocaleStore>) -> Self {
        Self {
            inner,
            written: MemoryStore::new(),
        }
    }

    /// Tree a dry run would have saved for `lang`
    pub fn written(&self, lang: &str) -> Option<KeyTree> {
        self.written.get(lang)
    }
}

impl std::fmt::Debug for ScratchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchStore")
            .field("written", &self.written)
            .finish()
    }
}

impl LocaleStore for ScratchStore {
    fn load(&self, lang: &str) -> SyncResult<Option<KeyTree>> {
        match self.written.get(lang) {
            Some(tree) => Ok(Some(tree)),
            None => self.inner.load(lang),
        }
    }

    fn save(&self, lang: &str, tree: &KeyTree) -> SyncResult<()> {
        debug!("Dry run: not writing {}", self.inner.location(lang).display());
        self.written.save(lang, tree)
    }

    fn location(&self, lang: &str) -> PathBuf {
        self.inner.location(lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path());
        assert!(store.load("fr").unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirStore::new(dir.path().join("locale"));
        let tree = json!({ "nav": { "home": "Accueil" } })
            .as_object()
            .cloned()
            .unwrap();

        store.save("fr", &tree).unwrap();

        assert_eq!(store.load("fr").unwrap(), Some(tree));
        let written = fs::read_to_string(store.path_for("fr")).unwrap();
        assert_eq!(
            written,
            "{\n  \"nav\": {\n    \"home\": \"Accueil\"\n  }\n}\n"
        );
        assert!(!dir.path().join("locale/fr.json.tmp").exists());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("de.json"), "{ not json").unwrap();

        let result = JsonDirStore::new(dir.path()).load("de");
        assert!(matches!(result, Err(SyncError::Json { .. })));
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("de.json"), "[\"a\"]").unwrap();

        let result = JsonDirStore::new(dir.path()).load("de");
        assert!(matches!(result, Err(SyncError::InvalidLocaleFile(_))));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load("es").unwrap().is_none());

        let tree = json!({ "a": "b" }).as_object().cloned().unwrap();
        store.save("es", &tree).unwrap();
        assert_eq!(store.get("es"), Some(tree));
    }

    #[test]
    fn test_scratch_store_never_writes_through() {
        let dir = TempDir::new().unwrap();
        let disk = Arc::new(JsonDirStore::new(dir.path()));
        let original = json!({ "a": "Á" }).as_object().cloned().unwrap();
        disk.save("es", &original).unwrap();
        let before = fs::read_to_string(disk.path_for("es")).unwrap();

        let scratch = ScratchStore::new(disk.clone());
        assert_eq!(scratch.load("es").unwrap(), Some(original));

        let updated = json!({ "a": "Á", "b": "B" }).as_object().cloned().unwrap();
        scratch.save("es", &updated).unwrap();
        scratch.save("fr", &updated).unwrap();

        assert_eq!(scratch.load("es").unwrap(), Some(updated.clone()));
        assert_eq!(scratch.written("fr"), Some(updated));
        assert_eq!(fs::read_to_string(disk.path_for("es")).unwrap(), before);
        assert!(!disk.path_for("fr").exists());
        assert_eq!(scratch.location("fr"), disk.path_for("fr"));
    }
}
