//! Remote translation service

use crate::error::{ElyxError, ElyxResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Request body accepted by the translation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
}

/// Response body returned by the translation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResponse {
    pub translated_text: String,
}

/// Abstract translation backend
///
/// Callers bound every call with their own timeout; implementations are not
/// required to.
#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> ElyxResult<TranslationResponse>;
}

/// Translation service reached over HTTP
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl TranslationService for HttpTranslator {
    async fn translate(&self, request: &TranslationRequest) -> ElyxResult<TranslationResponse> {
        debug!(
            "Requesting {} -> {} translation",
            request.source_language, request.target_language
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            ElyxError::TranslationUnavailable(format!("HTTP request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ElyxError::TranslationUnavailable(format!(
                "status {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        response.json().await.map_err(|e| {
            ElyxError::TranslationUnavailable(format!("Failed to parse response: {}", e))
        })
    }
}

impl std::fmt::Debug for HttpTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTranslator")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
