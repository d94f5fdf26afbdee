//! Dictionary command - list local phrase translations

use crate::cli::args::DictionaryArgs;
use crate::config::Config;
use crate::error::ElyxResult;
use crate::i18n::{normalize_language, Dictionary};
use crate::ui::{self, UiContext};

/// Execute the dictionary command
pub async fn execute(args: DictionaryArgs, config: &Config) -> ElyxResult<()> {
    let ctx = UiContext::detect();

    let mut dictionary = Dictionary::builtin();
    if let Some(path) = &config.i18n.dictionary_path {
        dictionary = dictionary.merge(Dictionary::load(path).await?);
    }

    let languages: Vec<String> = match &args.lang {
        Some(lang) => vec![normalize_language(lang)],
        None => dictionary.languages().into_iter().map(String::from).collect(),
    };

    for language in languages {
        let pairs = dictionary.phrases_for(&language);
        ui::header(&ctx, &format!("{} ({} phrases)", language, pairs.len()));
        for (source, text) in pairs {
            ui::phrase(&ctx, source, text);
        }
    }

    Ok(())
}
