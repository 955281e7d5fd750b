//! Async-friendly entry point.
//!
//! A session blocks its calling thread until an outcome is committed, so
//! async callers hand it to a dedicated worker thread and await the result
//! over a oneshot channel.

use std::thread;

use tokio::sync::oneshot;

use crate::emitter::EventEmitter;
use crate::terminate::{ExitHandler, SessionOutcome};
use crate::{Engine, EngineConfig, Error, PageSession, Result, SessionConfig};

/// Run a session for an already constructed engine.
pub async fn extract<E>(
    engine: E,
    config: SessionConfig,
    emitter: EventEmitter,
    exit: ExitHandler,
) -> Result<SessionOutcome>
where
    E: Engine + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    thread::Builder::new()
        .name("rfextract-session".into())
        .spawn(move || {
            let mut session = PageSession::new(config, engine, emitter, exit);
            let _ = tx.send(session.run());
        })?;

    rx.await
        .map_err(|e| Error::Other(format!("Session worker canceled: {}", e)))?
}

/// Create the default engine on the worker thread and run a session with it.
pub async fn extract_with_default_engine(
    engine_config: EngineConfig,
    config: SessionConfig,
    emitter: EventEmitter,
    exit: ExitHandler,
) -> Result<SessionOutcome> {
    let (tx, rx) = oneshot::channel();

    thread::Builder::new()
        .name("rfextract-session".into())
        .spawn(move || {
            // Engine startup can block (browser launch), keep it off the runtime.
            let res = crate::new_engine(engine_config).and_then(|engine| {
                let mut session = PageSession::new(config, engine, emitter, exit);
                session.run()
            });
            let _ = tx.send(res);
        })?;

    rx.await
        .map_err(|e| Error::Other(format!("Session worker canceled: {}", e)))?
}
