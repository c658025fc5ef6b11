//! Mock Machine Translator for testing
//!
//! A deterministic, network-free translator. Besides producing predictable
//! output it records every request it receives, which lets tests assert how
//! many backend calls a synchronization pass made and what each one carried.
//!
//! # Example
//!
//! ```ignore
//! use locale_sync::mt::{MachineTranslator, MockTranslator, MockMode};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let result = mock.translate("hello", "en", "fr").await.unwrap();
//!     assert_eq!(result, "hello_fr");
//!     assert_eq!(mock.call_count(), 1);
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::MachineTranslator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append locale suffix: "hello" → "hello_fr"
    Suffix,

    /// Use predefined mappings for realistic translations
    /// (text, target_locale) → translation, falling back to `Suffix`
    Mappings(HashMap<(String, String), String>),

    /// Every request fails with a transient translation error
    Error(String),

    /// No-op: return input unchanged
    NoOp,
}

/// Mock translator that simulates various translation scenarios
///
/// Clones share the same call log and failure budget.
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    /// Every request received, in arrival order
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    /// Number of upcoming requests that should fail before succeeding
    failures_left: Arc<AtomicUsize>,
    /// Error returned while `failures_left` is non-zero
    failure: MtError,
}

impl MockTranslator {
    /// Create a new MockTranslator with the given mode
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            calls: Arc::new(Mutex::new(Vec::new())),
            failures_left: Arc::new(AtomicUsize::new(0)),
            failure: MtError::NetworkError("simulated outage".to_string()),
        }
    }

    /// Create a MockTranslator with simulated network delay
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Make the next `times` requests fail with `error` before the mode applies
    pub fn failing_first(mut self, times: usize, error: MtError) -> Self {
        self.failures_left = Arc::new(AtomicUsize::new(times));
        self.failure = error;
        self
    }

    /// Number of requests received so far, failed ones included
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Snapshot of every request received so far
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, texts: &[String]) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(texts.to_vec());
    }

    /// Consume one unit of the failure budget, if any is left
    fn take_failure(&self) -> Option<MtError> {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .ok()
            .map(|_| self.failure.clone())
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    /// Apply translation logic based on the mode
    fn apply_translation(&self, text: &str, target: &str) -> MtResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => {
                let key = (text.to_string(), target.to_string());
                Ok(map
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_{}", text, target)))
            }
            MockMode::Error(msg) => Err(MtError::TranslationError(msg.clone())),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.record(&[text.to_string()]);
        self.apply_delay().await;

        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.apply_translation(text, target_locale)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        self.record(texts);
        // Delay is per request, not per string
        self.apply_delay().await;

        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        texts
            .iter()
            .map(|text| self.apply_translation(text, target_locale))
            .collect()
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_suffix_batch_translation() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let texts = vec!["hello".to_string(), "world".to_string()];
        let results = mock.translate_batch(&texts, "en", "fr").await.unwrap();
        assert_eq!(results, vec!["hello_fr", "world_fr"]);
    }

    #[tokio::test]
    async fn test_mapping_with_fallback() {
        let mut map = HashMap::new();
        map.insert(("Bye".to_string(), "es".to_string()), "Adiós".to_string());

        let mock = MockTranslator::new(MockMode::Mappings(map));
        let texts = vec!["Bye".to_string(), "unknown".to_string()];
        let results = mock.translate_batch(&texts, "en", "es").await.unwrap();
        assert_eq!(results, vec!["Adiós", "unknown_es"]);
    }

    #[tokio::test]
    async fn test_error_mode_batch_fails() {
        let mock = MockTranslator::new(MockMode::Error("Network error".to_string()));
        let result = mock.translate_batch(&["hello".to_string()], "en", "fr").await;
        assert!(matches!(result, Err(MtError::TranslationError(_))));
    }

    #[tokio::test]
    async fn test_noop_returns_unchanged() {
        let mock = MockTranslator::new(MockMode::NoOp);
        let result = mock.translate("Hello world", "en", "fr").await.unwrap();
        assert_eq!(result, "Hello world");
    }

    #[tokio::test]
    async fn test_calls_are_recorded_across_clones() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let clone = mock.clone();

        clone
            .translate_batch(&["a".to_string(), "b".to_string()], "en", "de")
            .await
            .unwrap();
        mock.translate("c", "en", "de").await.unwrap();

        assert_eq!(mock.call_count(), 2);
        assert_eq!(
            mock.calls(),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()]
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_first_then_recovers() {
        let mock = MockTranslator::new(MockMode::Suffix)
            .failing_first(2, MtError::RateLimited("slow down".to_string()));
        let texts = vec!["hi".to_string()];

        assert!(mock.translate_batch(&texts, "en", "fr").await.is_err());
        assert!(mock.translate_batch(&texts, "en", "fr").await.is_err());
        assert_eq!(
            mock.translate_batch(&texts, "en", "fr").await.unwrap(),
            vec!["hi_fr"]
        );
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_delay_adds_latency() {
        let mock = MockTranslator::with_delay(MockMode::Suffix, 50);
        let start = std::time::Instant::now();
        let _ = mock.translate("hello", "en", "fr").await.unwrap();
        assert!(start.elapsed().as_millis() >= 50);
    }

    #[test]
    fn test_provider_name() {
        let mock = MockTranslator::new(MockMode::Suffix);
        assert_eq!(mock.provider_name(), "Mock Translator");
    }
}
