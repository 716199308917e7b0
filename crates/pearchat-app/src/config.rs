//! Chat configuration.

use std::fmt;

/// Path the backend bundle is loaded from when none is configured.
pub const DEFAULT_BUNDLE_PATH: &str = "/app.bundle";

/// Maximum message length in characters.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1000;

/// Location of the backend bundle passed to `Gateway::start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle(String);

impl Bundle {
    /// Bundle at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Bundle path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new(DEFAULT_BUNDLE_PATH)
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Backend bundle started on mount
    pub bundle: Bundle,
    /// Longest message `send` accepts, in characters
    pub max_message_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { bundle: Bundle::default(), max_message_len: DEFAULT_MAX_MESSAGE_LEN }
    }
}
