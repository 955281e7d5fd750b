//! Session configuration

use serde::Serialize;

/// Default overall deadline: five minutes.
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// Default parse level (ajax requests only).
pub const DEFAULT_PARSE_LEVEL: u8 = 1;

/// Immutable configuration for one extraction session.
///
/// Built once from the command line and handed to [`crate::PageSession`].
/// `parse_level` and `preloaded_page` are accepted and echoed in debug mode
/// but have no effect yet.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Page to load
    pub target_url: String,
    /// User agent override; the engine default is used when `None`
    pub user_agent: Option<String>,
    /// Overall deadline in milliseconds
    pub timeout_ms: u64,
    /// 0 = don't parse; 1 = ajax requests only; 2 = basic; 3 = intensive
    pub parse_level: u8,
    /// Replacement for the initial response (headers plus a `body` file path)
    pub preloaded_page: Option<serde_json::Value>,
    /// Pretty-print events and add diagnostics
    pub verbose: bool,
    /// Trace requests and responses on stderr
    pub debug: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_url: String::new(),
            user_agent: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            parse_level: DEFAULT_PARSE_LEVEL,
            preloaded_page: None,
            verbose: false,
            debug: false,
        }
    }
}

/// Configuration echo printed on stdout in debug mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEcho<'a> {
    pub debug: bool,
    pub user_agent: &'a str,
    pub parse_level: u8,
    pub preloaded_page: Option<&'a serde_json::Value>,
    pub timeout: u64,
}

impl SessionConfig {
    pub fn echo<'a>(&'a self, effective_user_agent: &'a str) -> ConfigEcho<'a> {
        ConfigEcho {
            debug: self.debug,
            user_agent: effective_user_agent,
            parse_level: self.parse_level,
            preloaded_page: self.preloaded_page.as_ref(),
            timeout: self.timeout_ms,
        }
    }
}
