//! Runs the synchronizer over many target languages with bounded parallelism
//!
//! Languages are processed in consecutive groups of `concurrency`. Every
//! language in a group runs at the same time and the whole group is awaited
//! before the next one starts, which caps the number of languages talking to
//! the backend at once.

use futures::future::join_all;
use tracing::{error, info};

use crate::error::{SyncError, SyncResult};
use crate::sync::{LanguageSynchronizer, SyncStats};
use crate::tree::KeyTree;

/// Outcome for one target language
#[derive(Debug)]
pub struct LanguageResult {
    pub lang: String,
    pub outcome: SyncResult<SyncStats>,
}

/// Outcome of a whole run, in scheduling order
#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<LanguageResult>,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.results.iter().filter_map(|result| match &result.outcome {
            Err(err) => Some((result.lang.as_str(), err)),
            Ok(_) => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn get(&self, lang: &str) -> Option<&SyncResult<SyncStats>> {
        self.results
            .iter()
            .find(|result| result.lang == lang)
            .map(|result| &result.outcome)
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrencyScheduler {
    synchronizer: LanguageSynchronizer,
}

impl ConcurrencyScheduler {
    pub fn new(synchronizer: LanguageSynchronizer) -> Self {
        Self { synchronizer }
    }

    pub fn synchronizer(&self) -> &LanguageSynchronizer {
        &self.synchronizer
    }

    /// Synchronize every language in `target_langs`
    ///
    /// Fails only when the source file cannot be loaded. Per-language failures
    /// are logged and collected in the report while the other languages run
    /// to completion.
    pub async fn run(&self, target_langs: &[String], concurrency: usize) -> SyncResult<RunReport> {
        let source = self.synchronizer.load_source()?;
        Ok(self.run_with_source(&source, target_langs, concurrency).await)
    }

    /// Same as [`run`](Self::run) with an already loaded source tree
    pub async fn run_with_source(
        &self,
        source: &KeyTree,
        target_langs: &[String],
        concurrency: usize,
    ) -> RunReport {
        let langs = self.plan(target_langs);
        let concurrency = concurrency.max(1);
        let mut report = RunReport::default();

        for group in langs.chunks(concurrency) {
            info!("Translating: {}", group.join(", "));
            let tasks = group.iter().map(|lang| async move {
                let outcome = self.synchronizer.sync_language(lang, source).await;
                if let Err(e) = &outcome {
                    error!("{}: {}", lang, e);
                }
                LanguageResult {
                    lang: lang.clone(),
                    outcome,
                }
            });
            report.results.extend(join_all(tasks).await);
        }

        info!(
            "Translation pass completed: {} ok, {} failed",
            report.results.len() - report.failures().count(),
            report.failures().count()
        );
        report
    }

    /// Drop duplicates and the source language, keeping the given order
    fn plan(&self, target_langs: &[String]) -> Vec<String> {
        let mut langs: Vec<String> = Vec::with_capacity(target_langs.len());
        for lang in target_langs {
            if lang == self.synchronizer.source_lang() {
                info!("Skipping {}: it is the source language", lang);
                continue;
            }
            if !langs.contains(lang) {
                langs.push(lang.clone());
            }
        }
        langs
    }
}
