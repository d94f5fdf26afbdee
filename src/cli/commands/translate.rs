//! Translate command - run text through the translation memoizer

use crate::cli::args::TranslateArgs;
use crate::config::Config;
use crate::error::ElyxResult;
use crate::i18n::TranslationMemoizer;
use crate::ui::{self, UiContext};

/// Execute the translate command
pub async fn execute(args: TranslateArgs, config: &Config) -> ElyxResult<()> {
    let ctx = UiContext::detect();
    let mut memoizer = TranslationMemoizer::from_config(&config.i18n).await?;
    if args.offline {
        memoizer = memoizer.offline();
    }
    if let Some(lang) = &args.lang {
        memoizer.set_language(lang);
    }

    let translated = memoizer.translate_all(&args.text).await;
    for (source, text) in args.text.iter().zip(&translated) {
        ui::phrase(&ctx, source, text);
    }

    Ok(())
}
