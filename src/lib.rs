//! RFox Resource Extractor
//!
//! Loads a single page in a headless browsing engine, watches every
//! subresource request the page makes while it renders, drops tracking and
//! cosmetic requests, and reports the interesting ones as line-delimited
//! JSON on stdout.
//!
//! # Features
//!
//! - **RFEngine** (default): pure-Rust page loader with a small script host
//! - **CDP Backend**: real Chrome via the DevTools protocol (`cdp` feature)
//! - **Single deadline**: one wall-clock timeout bounds the whole session
//!
//! # Example
//!
//! ```no_run
//! use rfextract::{EngineConfig, EventEmitter, PageSession, SessionConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig {
//!     target_url: "https://example.com".to_string(),
//!     timeout_ms: 30000,
//!     ..Default::default()
//! };
//!
//! let engine = rfextract::new_engine(EngineConfig::default())?;
//! let emitter = EventEmitter::stdout(config.verbose);
//! let mut session = PageSession::new(config, engine, emitter, rfextract::process_exit());
//! let outcome = session.run()?;
//! println!("finished: {:?}", outcome);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use serde::Serialize;

pub mod error;
pub use error::{Error, Result};

pub mod classifier;
pub mod cli;
pub mod config;
pub mod deadline;
pub mod emitter;
pub mod logging;
pub mod pattern;
pub mod session;
pub mod terminate;

#[cfg(feature = "cdp")]
pub mod cdp;

// RFEngine: RFox pure-rust page loader (document fetch + subresource discovery + script host)
#[cfg(feature = "rfengine")]
pub mod rfengine;

// Async-friendly facade (session runs on a worker thread)
pub mod async_api;

pub use classifier::{ClassificationDecision, ClassificationReason, RequestClassifier};
pub use config::SessionConfig;
pub use deadline::DeadlineGuard;
pub use emitter::{EventEmitter, ReportedEvent};
pub use session::{PageSession, SessionState};
pub use terminate::{process_exit, ExitHandler, SessionOutcome, Terminator};

/// Configuration for the headless engine
///
/// The defaults are conservative: a Firefox-compatible user agent that
/// identifies RFOX, JavaScript enabled with a loop iteration cap, and a
/// 30 second network timeout that the session usually overrides with its
/// own deadline.
///
/// # Examples
///
/// ```
/// let cfg = rfextract::EngineConfig::default();
/// assert!(cfg.user_agent.contains("RFOX"));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// User agent string to send with requests
    pub user_agent: String,
    /// Viewport dimensions
    pub viewport: Viewport,
    /// Timeout for network operations in milliseconds
    pub timeout_ms: u64,
    /// Custom HTTP headers
    pub headers: HashMap<String, String>,
    /// Whether to execute page scripts
    pub enable_javascript: bool,
    /// Maximum loop iterations before the script host throws (0 => disabled)
    pub script_loop_iteration_limit: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/115.0 RFOX/0.3".to_string(),
            viewport: Viewport::default(),
            timeout_ms: 30000,
            headers: HashMap::new(),
            enable_javascript: true,
            script_loop_iteration_limit: 1000000,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// An outbound resource request, as seen by the interception hook.
///
/// Serializes to the same shape the verbose debug trace prints.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Content type the engine declared for this request, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_content_type: Option<String>,
    /// Optional resource type (document, script, xhr, image, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The content type used for classification: the declared one, else a
    /// case-insensitive `Content-Type` header lookup.
    pub fn content_type(&self) -> Option<&str> {
        self.declared_content_type.as_deref().or_else(|| {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                .map(|(_, v)| v.as_str())
        })
    }
}

/// A response observed by the engine (diagnostics only)
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
}

/// Result of JavaScript execution
///
/// `value` is the serialized result of the evaluation. `is_error` indicates
/// whether the script threw an exception.
#[derive(Debug, Clone)]
pub struct ScriptResult {
    /// Serialized result value
    pub value: String,
    /// Whether the script threw an error
    pub is_error: bool,
}

/// Outcome of a single navigation as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Success,
    Fail,
}

/// Decision returned by an `on_request` handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    /// Let the request proceed normally
    Continue,
    /// Abort the in-flight request
    Abort,
}

/// Core trait for headless engine implementations
///
/// Handlers registered through `on_request` are called synchronously before
/// the engine issues the request, possibly from a thread owned by the
/// engine, so they must be `Send + Sync`.
pub trait Engine {
    /// Create a new engine instance with the given configuration
    fn new(config: EngineConfig) -> Result<Self>
    where
        Self: Sized;

    /// Override the user agent for subsequent requests
    fn set_user_agent(&mut self, user_agent: &str) -> Result<()>;

    /// The user agent currently in effect
    fn user_agent(&self) -> String;

    /// Register the interception hook for outgoing requests (document
    /// included). The returned action decides whether the request proceeds.
    ///
    /// An error means the engine cannot intercept requests; navigating
    /// anyway would let every request through unclassified.
    fn on_request<F>(&mut self, cb: F) -> Result<()>
    where
        F: Fn(&RequestDescriptor) -> RequestAction + Send + Sync + 'static;

    /// Register a callback for received responses
    fn on_response<F>(&mut self, cb: F)
    where
        F: Fn(&ResponseInfo) + Send + Sync + 'static;

    /// Navigate to `url` and block until the page has loaded or failed.
    ///
    /// `Ok(LoadStatus::Fail)` is a navigation failure the page reported;
    /// `Err` is an engine malfunction. Callers treat both as a failed load.
    fn open(&mut self, url: &str) -> Result<LoadStatus>;

    /// Evaluate JavaScript in the page context
    fn evaluate_script(&mut self, script: &str) -> Result<ScriptResult>;

    /// Close the engine and clean up resources
    fn close(self) -> Result<()>;
}

/// Create a new engine instance with the default backend
///
/// The CDP backend is preferred when the `cdp` feature is enabled since it
/// drives a real browser; otherwise the pure-Rust `RFEngine` is used.
#[cfg(feature = "cdp")]
pub fn new_engine(config: EngineConfig) -> Result<impl Engine + Send + 'static> {
    cdp::CdpEngine::new(config)
}

#[cfg(all(not(feature = "cdp"), feature = "rfengine"))]
pub fn new_engine(config: EngineConfig) -> Result<impl Engine + Send + 'static> {
    rfengine::RFEngine::new(config)
}

#[cfg(not(any(feature = "cdp", feature = "rfengine")))]
compile_error!("enable at least one engine backend: `rfengine` or `cdp`");
