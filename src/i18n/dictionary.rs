//! Static phrase dictionary
//!
//! Read-only mapping from exact source phrase to per-language translation,
//! supplied as configuration data:
//!
//! ```toml
//! [phrases."Hello"]
//! hi = "नमस्ते"
//! es = "Hola"
//! ```

use crate::error::{ElyxError, ElyxResult};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

const BUILTIN: &str = include_str!("phrases.toml");

#[derive(Debug, Default, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    phrases: HashMap<String, HashMap<String, String>>,
}

/// Exact-match phrase dictionary
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    phrases: HashMap<String, HashMap<String, String>>,
}

impl Dictionary {
    /// Empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Dictionary of common marketplace phrases shipped with the crate
    pub fn builtin() -> Self {
        match Self::from_toml_str(BUILTIN, "<builtin>") {
            Ok(dictionary) => dictionary,
            Err(e) => {
                warn!("Built-in dictionary unusable, continuing without it: {}", e);
                Self::default()
            }
        }
    }

    /// Parse a dictionary from TOML text; `origin` names it in errors
    pub fn from_toml_str(content: &str, origin: &str) -> ElyxResult<Self> {
        let file: DictionaryFile =
            toml::from_str(content).map_err(|e| ElyxError::DictionaryInvalid {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;

        let phrases = file
            .phrases
            .into_iter()
            .map(|(phrase, translations)| {
                let translations = translations
                    .into_iter()
                    .map(|(language, text)| (normalize_language(&language), text))
                    .collect();
                (phrase, translations)
            })
            .collect();

        Ok(Self { phrases })
    }

    /// Load a dictionary file
    pub async fn load(path: &Path) -> ElyxResult<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            ElyxError::io(format!("reading dictionary {}", path.display()), e)
        })?;
        let dictionary = Self::from_toml_str(&content, &path.display().to_string())?;
        debug!(
            "Loaded {} phrases from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }

    /// Merge another dictionary over this one; its entries win
    pub fn merge(mut self, other: Dictionary) -> Self {
        for (phrase, translations) in other.phrases {
            self.phrases.entry(phrase).or_default().extend(translations);
        }
        self
    }

    /// Exact-match translation of `text` into `language`
    pub fn lookup(&self, text: &str, language: &str) -> Option<&str> {
        self.phrases
            .get(text)
            .and_then(|translations| translations.get(language))
            .map(String::as_str)
    }

    /// All languages with at least one translation
    pub fn languages(&self) -> BTreeSet<&str> {
        self.phrases
            .values()
            .flat_map(|translations| translations.keys().map(String::as_str))
            .collect()
    }

    /// (phrase, translation) pairs for a language, sorted by phrase
    pub fn phrases_for(&self, language: &str) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .phrases
            .iter()
            .filter_map(|(phrase, translations)| {
                translations
                    .get(language)
                    .map(|text| (phrase.as_str(), text.as_str()))
            })
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Number of source phrases
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// Canonical form of a language code: trimmed, lower case
pub fn normalize_language(language: &str) -> String {
    language.trim().to_lowercase()
}
