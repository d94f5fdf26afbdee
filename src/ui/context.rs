//! Output context: interactive terminal or plain pipe

use std::io::IsTerminal;

/// Determines whether output may use styled, interactive rendering
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Detect from the current process environment
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal() && std::env::var_os("CI").is_none(),
        }
    }

    /// Plain output regardless of environment (scripts, tests)
    pub fn plain() -> Self {
        Self { interactive: false }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}
