//! Keeps per-language JSON locale files in sync with a source locale.
//!
//! Missing keys are found by diffing flattened trees, resolved from a
//! persistent translation cache where possible, and otherwise translated
//! through a machine translation backend in paced, retried batches. Existing
//! translations are never overwritten.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use locale_sync::{ConcurrencyScheduler, LanguageSynchronizer, SyncConfig};
//! use locale_sync::mt::LibreTranslateProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::from_env()?;
//!     let provider = LibreTranslateProvider::new(&config.backend_url)?;
//!     let synchronizer = LanguageSynchronizer::from_config(&config, Arc::new(provider));
//!
//!     let report = ConcurrencyScheduler::new(synchronizer)
//!         .run(&config.target_langs, config.concurrency)
//!         .await?;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod diff;
pub mod error;
pub mod mt;
pub mod scheduler;
pub mod store;
pub mod sync;
pub mod tree;


pub use cache::TranslationCache;
pub use config::SyncConfig;
pub use diff::{MissingReport, StructuralStatus, missing_keys, structural_status};
pub use error::{SyncError, SyncResult};
pub use scheduler::{ConcurrencyScheduler, LanguageResult, RunReport};
pub use store::{JsonDirStore, LocaleStore, MemoryStore, ScratchStore};
pub use sync::{LanguageSynchronizer, SyncOutcome, SyncStats};
pub use tree::{FlatMap, KeyTree, flatten, unflatten};
