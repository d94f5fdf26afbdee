//! Terminal output for the CLI
//!
//! Uses `cliclack` for styled output on interactive terminals and falls back
//! to plain, pipe-friendly lines otherwise.

mod context;
mod output;

pub use context::UiContext;
pub use output::{header, json, key_value, phrase, step_error_detail, step_ok, step_warn_hint};
