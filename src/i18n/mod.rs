//! Local-first translation with remote fallback

pub mod dictionary;
pub mod memoizer;
pub mod remote;

pub use dictionary::{normalize_language, Dictionary};
pub use memoizer::TranslationMemoizer;
pub use remote::{HttpTranslator, TranslationRequest, TranslationResponse, TranslationService};
