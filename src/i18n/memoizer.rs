//! Translation memoizer
//!
//! Minimizes calls to the rate-limited translation service.
//!
//! # Lookup Order
//!
//! | Step | Source | Cached |
//! |------|--------|--------|
//! | 1 | default language or empty text | no |
//! | 2 | memo cache | already |
//! | 3 | static dictionary | yes |
//! | 4 | remote service (bounded) | on success only |
//!
//! Any failure falls back to the original text. Switching language clears
//! the memo cache for every language, not just the previous one.

use crate::config::schema::I18nConfig;
use crate::error::ElyxResult;
use crate::i18n::dictionary::{normalize_language, Dictionary};
use crate::i18n::remote::{HttpTranslator, TranslationRequest, TranslationService};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Default bound on a remote translation call
pub const DEFAULT_TRANSLATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct MemoState {
    language: String,
    /// Bumped on every language change; results from older generations are dropped
    generation: u64,
    /// language -> source text -> translation
    entries: HashMap<String, HashMap<String, String>>,
}

/// Memoizing translator with dictionary and remote fallback
pub struct TranslationMemoizer {
    default_language: String,
    dictionary: Arc<Dictionary>,
    service: Option<Arc<dyn TranslationService>>,
    timeout: Duration,
    state: Mutex<MemoState>,
}

impl TranslationMemoizer {
    /// Create a memoizer with no remote service, starting in the default language
    pub fn new(dictionary: Arc<Dictionary>, default_language: &str) -> Self {
        let default_language = normalize_language(default_language);
        Self {
            state: Mutex::new(MemoState {
                language: default_language.clone(),
                ..MemoState::default()
            }),
            default_language,
            dictionary,
            service: None,
            timeout: DEFAULT_TRANSLATION_TIMEOUT,
        }
    }

    /// Build from configuration: built-in dictionary merged with the
    /// configured file, HTTP service when an endpoint is set
    pub async fn from_config(config: &I18nConfig) -> ElyxResult<Self> {
        let mut dictionary = Dictionary::builtin();
        if let Some(path) = &config.dictionary_path {
            dictionary = dictionary.merge(Dictionary::load(path).await?);
        }

        let mut memoizer = Self::new(Arc::new(dictionary), &config.default_language)
            .with_timeout(Duration::from_secs(config.timeout_secs.max(1)));

        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            memoizer = memoizer.with_service(Arc::new(HttpTranslator::new(
                endpoint,
                config.api_key.clone(),
            )));
        }

        memoizer.set_language(&config.language);
        Ok(memoizer)
    }

    pub fn with_service(mut self, service: Arc<dyn TranslationService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Drop the remote service; only the cache and dictionary are consulted
    pub fn offline(mut self) -> Self {
        self.service = None;
        self
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Currently active language
    pub fn language(&self) -> String {
        self.lock().language.clone()
    }

    /// Switch language and clear the whole memo cache
    pub fn set_language(&self, language: &str) {
        let language = normalize_language(language);
        let mut state = self.lock();
        let cleared: usize = state.entries.values().map(HashMap::len).sum();
        state.entries.clear();
        state.generation += 1;
        info!(
            "Language set to {} ({} cached translations cleared)",
            language, cleared
        );
        state.language = language;
    }

    /// Memoized translation for `text` in the active language, if any
    pub fn cached(&self, text: &str) -> Option<String> {
        let state = self.lock();
        state
            .entries
            .get(&state.language)
            .and_then(|entries| entries.get(text))
            .cloned()
    }

    /// Number of memoized translations across all languages
    pub fn cache_len(&self) -> usize {
        self.lock().entries.values().map(HashMap::len).sum()
    }

    /// Translate `text` into the active language
    ///
    /// Never fails: any miss or error yields the original text.
    pub async fn translate(&self, text: &str) -> String {
        let (language, generation) = {
            let state = self.lock();
            if state.language == self.default_language || text.is_empty() {
                return text.to_string();
            }
            if let Some(hit) = state
                .entries
                .get(&state.language)
                .and_then(|entries| entries.get(text))
            {
                return hit.clone();
            }
            (state.language.clone(), state.generation)
        };

        if let Some(local) = self.dictionary.lookup(text, &language) {
            let local = local.to_string();
            self.remember(&language, generation, text, &local);
            return local;
        }

        let Some(service) = &self.service else {
            return text.to_string();
        };

        let request = TranslationRequest {
            source_text: text.to_string(),
            source_language: self.default_language.clone(),
            target_language: language.clone(),
        };

        match tokio::time::timeout(self.timeout, service.translate(&request)).await {
            Ok(Ok(response)) if !response.translated_text.is_empty() => {
                self.remember(&language, generation, text, &response.translated_text);
                response.translated_text
            }
            Ok(Ok(_)) => {
                debug!("Empty translation for {:?}, keeping original", text);
                text.to_string()
            }
            Ok(Err(e)) => {
                debug!("Translation unavailable, keeping original: {}", e);
                text.to_string()
            }
            Err(_) => {
                debug!(
                    "Translation timed out after {}ms, keeping original",
                    self.timeout.as_millis()
                );
                text.to_string()
            }
        }
    }

    /// Translate several texts concurrently, preserving order
    pub async fn translate_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        join_all(texts.iter().map(|text| self.translate(text.as_ref()))).await
    }

    fn remember(&self, language: &str, generation: u64, text: &str, translated: &str) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!("Language changed during translation, not caching {:?}", text);
            return;
        }
        state
            .entries
            .entry(language.to_string())
            .or_default()
            .insert(text.to_string(), translated.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, MemoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TranslationMemoizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationMemoizer")
            .field("default_language", &self.default_language)
            .field("language", &self.language())
            .field("remote", &self.service.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}
