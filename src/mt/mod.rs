/// Machine Translation Module
///
/// Everything that talks to a translation backend lives here.
///
/// # Overview
///
/// 1. **MT Trait & Providers** - `MachineTranslator`, implemented by the
///    LibreTranslate HTTP provider and by a deterministic mock
/// 2. **Batch Translator** - chunking, pacing and retry with exponential
///    backoff on top of any provider
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use locale_sync::mt::{BatchTranslator, LibreTranslateProvider};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = LibreTranslateProvider::new("http://localhost:5000/translate")?;
///     let batch = BatchTranslator::new(Arc::new(provider)).with_batch_size(25);
///
///     let phrases = vec!["Hello".to_string(), "Bye".to_string()];
///     let translated = batch.translate_batch(&phrases, "en", "es").await?;
///
///     println!("{:?}", translated);
///     Ok(())
/// }
/// ```
pub mod batch;
pub mod error;
pub mod libretranslate;
pub mod mock;
pub mod translator;

pub use batch::{BatchTranslator, FailurePolicy, RetryPolicy};
pub use error::{MtError, MtResult};
pub use libretranslate::LibreTranslateProvider;
pub use mock::{MockMode, MockTranslator};
pub use translator::{MachineTranslator, validate_locale};
