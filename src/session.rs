//! Page session: one navigation, one deadline, one outcome.
//!
//! A session wires the classifier into the engine's interception hook,
//! arms the deadline and runs the navigation on a worker thread. The
//! calling thread then blocks until the [`Terminator`] has committed an
//! outcome, which is either the navigation result or the deadline,
//! whichever comes first.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use crate::classifier::RequestClassifier;
use crate::config::SessionConfig;
use crate::deadline::DeadlineGuard;
use crate::emitter::{EventEmitter, ReportedEvent};
use crate::terminate::{ExitHandler, SessionOutcome, Terminator};
use crate::{Engine, Error, LoadStatus, RequestAction, RequestDescriptor, Result};

/// Script evaluated after a successful load. Placeholder for DOM work; it
/// only confirms the engine executes script.
pub const POST_LOAD_SCRIPT: &str = "(function(){ var a = new Image(); return true; })()";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Navigating,
    Completed(SessionOutcome),
}

impl SessionState {
    /// State of the session owning `terminator`. Readable from any thread
    /// holding a clone of [`PageSession::terminator`], including while
    /// `run` blocks.
    pub fn of(terminator: &Terminator) -> Self {
        match terminator.outcome() {
            Some(outcome) => SessionState::Completed(outcome),
            None if terminator.is_started() => SessionState::Navigating,
            None => SessionState::Created,
        }
    }
}

pub struct PageSession<E> {
    config: Arc<SessionConfig>,
    engine: Option<E>,
    classifier: Arc<RequestClassifier>,
    emitter: Arc<EventEmitter>,
    terminator: Arc<Terminator>,
}

impl<E> PageSession<E>
where
    E: Engine + Send + 'static,
{
    pub fn new(config: SessionConfig, engine: E, emitter: EventEmitter, exit: ExitHandler) -> Self {
        Self::with_classifier(config, engine, emitter, exit, RequestClassifier::default())
    }

    pub fn with_classifier(
        config: SessionConfig,
        engine: E,
        emitter: EventEmitter,
        exit: ExitHandler,
        classifier: RequestClassifier,
    ) -> Self {
        Self {
            config: Arc::new(config),
            engine: Some(engine),
            classifier: Arc::new(classifier),
            emitter: Arc::new(emitter),
            terminator: Terminator::new(exit),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn terminator(&self) -> Arc<Terminator> {
        self.terminator.clone()
    }

    pub fn state(&self) -> SessionState {
        SessionState::of(&self.terminator)
    }

    /// Run the session to completion and return its outcome.
    ///
    /// With the process exit handler this never returns for a started
    /// navigation; the process ends inside the terminal transition.
    pub fn run(&mut self) -> Result<SessionOutcome> {
        let mut engine = self
            .engine
            .take()
            .ok_or_else(|| Error::SessionError("session has already been started".into()))?;

        let started = Instant::now();
        let deadline = match self.prepare(&mut engine) {
            Ok(deadline) => deadline,
            Err(e) => {
                self.engine = Some(engine);
                return Err(e);
            }
        };

        let config = self.config.clone();
        let terminator = self.terminator.clone();
        let spawned = thread::Builder::new()
            .name("rfextract-navigation".into())
            .spawn(move || navigate(engine, &config, &terminator, started));
        if let Err(e) = spawned {
            deadline.disarm();
            return Err(e.into());
        }
        self.terminator.mark_started();

        let outcome = self.terminator.wait();
        deadline.disarm();
        Ok(outcome)
    }

    /// Configure the engine, install the hooks and arm the deadline.
    fn prepare(&self, engine: &mut E) -> Result<DeadlineGuard> {
        let config = &self.config;

        if let Some(ua) = &config.user_agent {
            engine.set_user_agent(ua)?;
        }

        if config.debug {
            let user_agent = engine.user_agent();
            if let Err(e) = self.emitter.emit_compact(&config.echo(&user_agent)) {
                warn!("Failed to write configuration echo: {}", e);
            }
        }

        self.install_request_hook(engine)?;
        if config.debug {
            engine.on_response(|resp| {
                debug!("Received {} => {}", resp.url, resp.status);
            });
        }

        let terminator = self.terminator.clone();
        let announce = config.debug || config.verbose;
        DeadlineGuard::arm(Duration::from_millis(config.timeout_ms), move || {
            terminator.commit(SessionOutcome::Timeout, || {
                if announce {
                    error!("timeout exceeded");
                }
            });
        })
    }

    fn install_request_hook(&self, engine: &mut E) -> Result<()> {
        let classifier = self.classifier.clone();
        let emitter = self.emitter.clone();
        let terminator = self.terminator.clone();
        let debug = self.config.debug;
        let verbose = self.config.verbose;

        engine.on_request(move |req: &RequestDescriptor| {
            let action = terminator.if_live(|| {
                let decision = classifier.classify(req);
                if decision.report {
                    if debug {
                        debug!("{} {}", req.method, req.url);
                        if verbose {
                            if let Ok(dump) = serde_json::to_string_pretty(req) {
                                debug!("{}", dump);
                            }
                        }
                    }
                    if let Err(e) = emitter.emit(&ReportedEvent::xhr(req.url.as_str())) {
                        warn!("Failed to emit event for {}: {}", req.url, e);
                    }
                }
                if decision.allow {
                    RequestAction::Continue
                } else {
                    if debug {
                        debug!("The url of the request is matching. Aborting: {}", req.url);
                    }
                    RequestAction::Abort
                }
            });
            // Nothing proceeds once the session has ended.
            action.unwrap_or(RequestAction::Abort)
        })
    }
}

fn navigate<E: Engine>(mut engine: E, config: &SessionConfig, terminator: &Terminator, started: Instant) {
    let status = match engine.open(&config.target_url) {
        Ok(status) => status,
        Err(e) => {
            debug!("Navigation to {} failed: {}", config.target_url, e);
            LoadStatus::Fail
        }
    };

    if status == LoadStatus::Fail {
        terminator.commit(SessionOutcome::LoadFailure, || {
            error!("FAIL to load the address {}", config.target_url);
        });
        return;
    }

    if terminator.is_terminated() {
        return;
    }

    match engine.evaluate_script(POST_LOAD_SCRIPT) {
        Ok(res) if res.is_error => debug!("Post-load script threw: {}", res.value),
        Ok(_) => {}
        Err(e) => debug!("Post-load evaluation failed: {}", e),
    }

    let elapsed = started.elapsed();
    terminator.commit(SessionOutcome::Success, || {
        if config.debug {
            debug!("Loading time {} msec", elapsed.as_millis());
        }
    });
}
