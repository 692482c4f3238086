//! Translation service client.
//!
//! [`Translator`] is the seam the orchestrator calls through. [`HttpTranslator`]
//! speaks to the hosted model over JSON: one call per stage, or the combined
//! endpoint that answers with every field at once.

use crate::error::{Stage, StageError};
use crate::language::Language;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A service that can translate text and read it back phonetically.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` into `target`.
    async fn translate_to(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, StageError>;

    /// Render `text`, written in `language`, phonetically in Hangul.
    async fn pronounce(&self, text: &str, language: Language) -> Result<String, StageError>;

    /// Translate Korean `text` into English and Japanese and read the Japanese
    /// back in Hangul, in one call.
    ///
    /// The default runs the separate stages back to back. Only a failed
    /// English translation is returned as an error.
    async fn translate_all(&self, text: &str) -> Result<CombinedTranslation, StageError> {
        let target_text_a = self
            .translate_to(text, Language::KOREAN, Language::ENGLISH)
            .await?;
        let target_text_b = self
            .translate_to(text, Language::KOREAN, Language::JAPANESE)
            .await;
        let pronunciation = match &target_text_b {
            Ok(japanese) => self.pronounce(japanese, Language::JAPANESE).await,
            Err(_) => Err(StageError::Skipped(Stage::TargetB)),
        };

        Ok(CombinedTranslation {
            target_text_a,
            target_text_b,
            pronunciation,
        })
    }
}

/// Every field of a combined translation. The English text is always present;
/// the others may have failed on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedTranslation {
    pub target_text_a: String,
    pub target_text_b: Result<String, StageError>,
    pub pronunciation: Result<String, StageError>,
}

/// Request body for `POST {base}/translate`
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source: &'static str,
    target: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translation: Option<String>,
}

/// Request body for `POST {base}/pronounce`
#[derive(Debug, Serialize)]
struct PronounceRequest<'a> {
    text: &'a str,
    language: &'static str,
}

#[derive(Debug, Deserialize)]
struct PronounceResponse {
    pronunciation: Option<String>,
}

/// Request body for the combined `POST {base}/translate`
#[derive(Debug, Serialize)]
struct CombinedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CombinedResponse {
    english: Option<String>,
    japanese: Option<String>,
    pronunciation: Option<String>,
}

/// Error body returned by the translation service on failure
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Translation service reached over HTTP.
///
/// Build it once at startup and share it; the underlying `reqwest::Client`
/// keeps its connection pool across calls.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, StageError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(StageError::Status {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| StageError::Malformed(e.to_string()))
    }
}

/// Prefer the service's `{"error": "..."}` message over the raw body.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        return parsed.error;
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}

/// A missing field is malformed; a blank one is empty.
fn non_empty(field: &str, value: Option<String>) -> Result<String, StageError> {
    let value = value.ok_or_else(|| StageError::Malformed(format!("missing `{}`", field)))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StageError::Empty);
    }
    Ok(trimmed.to_string())
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate_to(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, StageError> {
        let request = TranslateRequest {
            text,
            source: source.code(),
            target: target.code(),
        };
        let response: TranslateResponse = self.post("translate", &request).await?;
        non_empty("translation", response.translation)
    }

    async fn pronounce(&self, text: &str, language: Language) -> Result<String, StageError> {
        let request = PronounceRequest {
            text,
            language: language.code(),
        };
        let response: PronounceResponse = self.post("pronounce", &request).await?;
        non_empty("pronunciation", response.pronunciation)
    }

    async fn translate_all(&self, text: &str) -> Result<CombinedTranslation, StageError> {
        let response: CombinedResponse =
            self.post("translate", &CombinedRequest { text }).await?;

        let target_text_a = non_empty("english", response.english)?;
        let target_text_b = non_empty("japanese", response.japanese);
        // The reading belongs to the Japanese text; without it there is nothing to read.
        let pronunciation = match &target_text_b {
            Ok(_) => non_empty("pronunciation", response.pronunciation),
            Err(_) => Err(StageError::Skipped(Stage::TargetB)),
        };

        Ok(CombinedTranslation {
            target_text_a,
            target_text_b,
            pronunciation,
        })
    }
}
