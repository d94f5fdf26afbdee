//! CLI command implementations

pub mod config;
pub mod dictionary;
pub mod store;
pub mod translate;

pub use config::execute as config;
pub use dictionary::execute as dictionary;
pub use store::execute as store;
pub use translate::execute as translate;
