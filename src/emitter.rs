//! JSON event output.
//!
//! Every call writes one complete JSON document and flushes before
//! returning, so a consumer reading stdout line by line (compact mode) never
//! sees a partial event.

use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;

use crate::Result;

/// Tag attached to every reported resource request.
pub const XHR_TAG: &str = "XMLHttpRequest";

/// A reported resource request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedEvent {
    pub tag_name: &'static str,
    pub url: String,
}

impl ReportedEvent {
    pub fn xhr(url: impl Into<String>) -> Self {
        Self {
            tag_name: XHR_TAG,
            url: url.into(),
        }
    }
}

type Sink = Box<dyn Write + Send>;

/// Serializes events to a writer (stdout in the binary).
pub struct EventEmitter {
    out: Mutex<Sink>,
    pretty: bool,
}

impl EventEmitter {
    pub fn new<W>(writer: W, pretty: bool) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            out: Mutex::new(Box::new(writer)),
            pretty,
        }
    }

    /// Emitter on the process's standard output.
    pub fn stdout(pretty: bool) -> Self {
        Self::new(io::stdout(), pretty)
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    /// Write `obj` as one JSON document, indented when the emitter is pretty.
    pub fn emit<T>(&self, obj: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let doc = if self.pretty {
            serde_json::to_string_pretty(obj)?
        } else {
            serde_json::to_string(obj)?
        };
        self.write_doc(&doc)
    }

    /// Write `obj` on a single line regardless of the pretty setting.
    pub fn emit_compact<T>(&self, obj: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let doc = serde_json::to_string(obj)?;
        self.write_doc(&doc)
    }

    fn write_doc(&self, doc: &str) -> Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{}", doc)?;
        out.flush()?;
        Ok(())
    }
}
