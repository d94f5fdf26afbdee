//! Elyx - marketplace client core
//!
//! Keeps a query cache consistent with a remote store through optimistic
//! mutations, and memoizes UI text translations per active language.

pub mod cli;
pub mod config;
pub mod error;
pub mod i18n;
pub mod store;
pub mod sync;
pub mod ui;

#[cfg(test)]
mod testing;

pub use error::{ElyxError, ElyxResult};
