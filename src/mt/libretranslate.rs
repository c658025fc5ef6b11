//! LibreTranslate provider for machine translation
//!
//! Talks to a LibreTranslate-compatible endpoint (self-hosted or public).
//! A request carries `{q, source, target, format: "text"}` where `q` is a
//! single string or a list of strings. Depending on the server version the
//! answer comes back in one of several shapes, all of which are normalized to
//! a plain list of strings aligned with the request.
//!
//! # Example
//!
//! ```ignore
//! use locale_sync::mt::{LibreTranslateProvider, MachineTranslator};
//!
//! let provider = LibreTranslateProvider::new("http://localhost:5000/translate")?;
//! let texts = vec!["Hello".to_string(), "Goodbye".to_string()];
//! let results = provider.translate_batch(&texts, "en", "es").await?;
//! ```

use std::time::Duration;

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, validate_locale};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

/// LibreTranslate HTTP provider
#[derive(Clone)]
pub struct LibreTranslateProvider {
    /// Full URL of the translate endpoint
    url: String,
    /// Optional API key, sent in the request body
    api_key: Option<String>,
    /// HTTP client for async requests
    client: reqwest::Client,
}

impl LibreTranslateProvider {
    /// Endpoint used when nothing else is configured
    pub const DEFAULT_URL: &'static str = "http://localhost:5000/translate";

    /// Per-request timeout used by [`LibreTranslateProvider::new`]
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a provider for the given translate endpoint
    pub fn new(url: impl Into<String>) -> MtResult<Self> {
        Self::with_options(url, None, Self::DEFAULT_TIMEOUT)
    }

    /// Create a provider with an API key and a custom per-request timeout
    ///
    /// # Returns
    ///
    /// * `Err(MtError::ConfigError)` - If the URL is empty or not http(s)
    /// * `Err(MtError::NetworkError)` - If the HTTP client cannot be built
    pub fn with_options(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> MtResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(MtError::ConfigError("Backend URL cannot be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MtError::ConfigError(format!(
                "Backend URL must start with http:// or https://: {}",
                url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MtError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    /// The translate endpoint this provider posts to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL of the `/languages` endpoint that sits next to `/translate`
    fn languages_url(&self) -> String {
        match self.url.strip_suffix("/translate") {
            Some(base) => format!("{}/languages", base),
            None => format!("{}/languages", self.url.trim_end_matches('/')),
        }
    }

    /// Touch the backend once so its models are loaded before the first batch
    ///
    /// Best-effort: returns whether the backend answered successfully and never
    /// fails.
    pub async fn prewarm(&self) -> bool {
        let url = self.languages_url();
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Prewarmed translation backend at {}", url);
                true
            }
            Ok(response) => {
                debug!("Prewarm of {} answered {}", url, response.status());
                false
            }
            Err(e) => {
                debug!("Prewarm of {} failed: {}", url, e);
                false
            }
        }
    }

    /// Send one translate request and normalize the answer
    async fn request(
        &self,
        q: Value,
        expected: usize,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        let mut body = json!({
            "q": q,
            "source": source_locale,
            "target": target_locale,
            "format": "text"
        });
        if let Some(key) = &self.api_key {
            body["api_key"] = Value::String(key.clone());
        }

        let response = self.client.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = error_message(&error_text);

            return Err(if status.as_u16() == 429 {
                MtError::RateLimited(message)
            } else if status.is_server_error() {
                MtError::ServerError {
                    status: status.as_u16(),
                    message,
                }
            } else {
                MtError::ClientError {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let json: Value = response.json().await.map_err(|e| {
            MtError::MalformedResponse(format!("Failed to parse backend response: {}", e))
        })?;

        normalize_response(&json, expected)
    }
}

impl std::fmt::Debug for LibreTranslateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibreTranslateProvider")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Pull the `error` field out of a LibreTranslate error body, if there is one
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Normalize any of the accepted response shapes into an ordered list of strings
///
/// Accepted shapes:
/// - `{"translatedText": "..."}`
/// - `{"translatedText": ["...", ...]}`
/// - `["...", ...]`
/// - `[{"translatedText": "..."}, ...]` (strings and records may be mixed)
pub(crate) fn normalize_response(body: &Value, expected: usize) -> MtResult<Vec<String>> {
    let translations = match body {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Object(record) => record
                    .get("translatedText")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        MtError::MalformedResponse(
                            "Record is missing a 'translatedText' string".to_string(),
                        )
                    }),
                other => Err(MtError::MalformedResponse(format!(
                    "Unexpected item in response list: {}",
                    other
                ))),
            })
            .collect::<MtResult<Vec<String>>>()?,
        Value::Object(record) => match record.get("translatedText") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        MtError::MalformedResponse(
                            "Non-string entry in 'translatedText' list".to_string(),
                        )
                    })
                })
                .collect::<MtResult<Vec<String>>>()?,
            _ => {
                return Err(MtError::MalformedResponse(
                    "Response has no 'translatedText' field".to_string(),
                ));
            }
        },
        other => {
            return Err(MtError::MalformedResponse(format!(
                "Unexpected response: {}",
                other
            )));
        }
    };

    if translations.len() != expected {
        return Err(MtError::MalformedResponse(format!(
            "Expected {} translations, got {}",
            expected,
            translations.len()
        )));
    }

    Ok(translations)
}

#[async_trait]
impl MachineTranslator for LibreTranslateProvider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if text.is_empty() {
            return Ok(String::new());
        }

        self.request(json!(text), 1, source_locale, target_locale)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MtError::MalformedResponse("Empty response".to_string()))
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.request(json!(texts), texts.len(), source_locale, target_locale)
            .await
    }

    fn provider_name(&self) -> &str {
        "LibreTranslate"
    }
}
