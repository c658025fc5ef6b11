//! Chunked, paced and retried translation on top of a [`MachineTranslator`]
//!
//! Providers perform one request per call. `BatchTranslator` turns an
//! arbitrary list of phrases into a sequence of bounded requests, waits a
//! fixed pacing delay between them, and retries transient failures with
//! exponential backoff.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::MachineTranslator;

/// Exponential backoff settings for one backend request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included
    pub attempts: usize,
    /// Delay after the first failure; doubled after every further failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: usize, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Backoff applied after the `failed`-th failed attempt (1-based)
    pub fn delay_for(&self, failed: usize) -> Duration {
        let exponent = u32::try_from(failed.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(2u32.checked_pow(exponent).unwrap_or(u32::MAX))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// Only errors for which [`MtError::is_transient`] holds are retried. The
    /// last error is returned once the attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> MtResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MtResult<T>>,
    {
        let mut failed = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    failed += 1;
                    if failed >= self.attempts {
                        warn!("{} failed after {} attempts: {}", label, failed, err);
                        return Err(err);
                    }
                    let delay = self.delay_for(failed);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label, failed, self.attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// What to do with a chunk whose retries are exhausted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the whole batch; the language is left untouched
    #[default]
    Abort,
    /// Return the chunk's source phrases unchanged and carry on
    KeepSource,
}

impl FromStr for FailurePolicy {
    type Err = MtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "keep-source" | "keep_source" => Ok(FailurePolicy::KeepSource),
            other => Err(MtError::ConfigError(format!(
                "Unknown failure policy '{}', expected 'abort' or 'keep-source'",
                other
            ))),
        }
    }
}

/// Splits phrase lists into bounded backend requests
#[derive(Clone)]
pub struct BatchTranslator {
    provider: Arc<dyn MachineTranslator>,
    batch_size: usize,
    pacing: Duration,
    retry: RetryPolicy,
    on_failure: FailurePolicy,
}

impl std::fmt::Debug for BatchTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchTranslator")
            .field("provider", &self.provider.provider_name())
            .field("batch_size", &self.batch_size)
            .field("pacing", &self.pacing)
            .field("retry", &self.retry)
            .field("on_failure", &self.on_failure)
            .finish()
    }
}

impl BatchTranslator {
    pub const DEFAULT_BATCH_SIZE: usize = 25;
    pub const DEFAULT_PACING: Duration = Duration::from_millis(120);

    pub fn new(provider: Arc<dyn MachineTranslator>) -> Self {
        Self {
            provider,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            pacing: Self::DEFAULT_PACING,
            retry: RetryPolicy::default(),
            on_failure: FailurePolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Translate `phrases`, returning results in the same order
    pub async fn translate_batch(
        &self,
        phrases: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        self.translate_batch_with(phrases, source_locale, target_locale, |_, _| {})
            .await
    }

    /// Like [`translate_batch`](Self::translate_batch), reporting each chunk as it lands
    ///
    /// `on_chunk` receives the source phrases of a chunk and their
    /// translations right after the backend answered. Chunks that fell back to
    /// their source text under [`FailurePolicy::KeepSource`] are not reported.
    pub async fn translate_batch_with<F>(
        &self,
        phrases: &[String],
        source_locale: &str,
        target_locale: &str,
        mut on_chunk: F,
    ) -> MtResult<Vec<String>>
    where
        F: FnMut(&[String], &[String]) + Send,
    {
        if phrases.is_empty() {
            return Ok(Vec::new());
        }

        let total = phrases.len().div_ceil(self.batch_size);
        let mut results = Vec::with_capacity(phrases.len());
        let provider = &self.provider;

        for (index, chunk) in phrases.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            debug!(
                "{} → {}: chunk {}/{} ({} phrases) via {}",
                source_locale,
                target_locale,
                index + 1,
                total,
                chunk.len(),
                provider.provider_name()
            );

            let label = format!("{} → {} chunk {}/{}", source_locale, target_locale, index + 1, total);
            let outcome = self
                .retry
                .run(&label, move || async move {
                    let translated = provider
                        .translate_batch(chunk, source_locale, target_locale)
                        .await?;
                    if translated.len() != chunk.len() {
                        return Err(MtError::MalformedResponse(format!(
                            "Expected {} translations, got {}",
                            chunk.len(),
                            translated.len()
                        )));
                    }
                    Ok(translated)
                })
                .await;

            match outcome {
                Ok(translated) => {
                    on_chunk(chunk, &translated);
                    results.extend(translated);
                }
                Err(err) => match self.on_failure {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::KeepSource => {
                        warn!("{}: keeping source text for {} phrases", label, chunk.len());
                        results.extend(chunk.iter().cloned());
                    }
                },
            }
        }

        Ok(results)
    }
}
