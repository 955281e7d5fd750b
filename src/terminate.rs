//! One-time session termination.
//!
//! Every terminal path (load success, load failure, deadline) goes through
//! [`Terminator::commit`]. The first caller wins; later callers get `false`
//! and do nothing. The same lock guards event emission through
//! [`Terminator::if_live`], so no event is written once an outcome has been
//! committed and the exit handler never runs concurrently with an emission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use log::debug;

/// Exit code used when the deadline fires.
pub const TIMEOUT_EXIT_CODE: i32 = -5;
/// Exit code used for malformed command-line input.
pub const INVALID_ARGUMENT_EXIT_CODE: i32 = -1;
/// Exit code for setup errors before the navigation starts.
pub const SETUP_FAILURE_EXIT_CODE: i32 = 1;

/// Terminal outcome of a session. Exactly one per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Success,
    LoadFailure,
    Timeout,
}

impl SessionOutcome {
    /// A failed load is a graceful outcome and exits 0 like a success.
    pub fn exit_code(self) -> i32 {
        match self {
            SessionOutcome::Success | SessionOutcome::LoadFailure => 0,
            SessionOutcome::Timeout => TIMEOUT_EXIT_CODE,
        }
    }
}

/// Called once with the committed outcome.
pub type ExitHandler = Box<dyn Fn(SessionOutcome) + Send + Sync>;

/// Exit handler that ends the process with the outcome's exit code.
pub fn process_exit() -> ExitHandler {
    Box::new(|outcome| std::process::exit(outcome.exit_code()))
}

/// Exit handler that does nothing; the caller inspects the returned outcome.
pub fn no_exit() -> ExitHandler {
    Box::new(|_| {})
}

pub struct Terminator {
    started: AtomicBool,
    state: Mutex<Option<SessionOutcome>>,
    done: Condvar,
    exit: ExitHandler,
}

impl Terminator {
    pub fn new(exit: ExitHandler) -> Arc<Self> {
        Arc::new(Self {
            started: AtomicBool::new(false),
            state: Mutex::new(None),
            done: Condvar::new(),
            exit,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionOutcome>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Commit `outcome` if nothing has been committed yet.
    ///
    /// `announce` runs only for the winning caller, after the outcome is
    /// recorded and before the exit handler.
    pub fn commit<F>(&self, outcome: SessionOutcome, announce: F) -> bool
    where
        F: FnOnce(),
    {
        let mut state = self.lock();
        if let Some(existing) = *state {
            debug!("ignoring {:?}: session already ended with {:?}", outcome, existing);
            return false;
        }
        *state = Some(outcome);
        announce();
        (self.exit)(outcome);
        self.done.notify_all();
        true
    }

    pub fn terminate(&self, outcome: SessionOutcome) -> bool {
        self.commit(outcome, || {})
    }

    /// Run `f` while holding the termination lock, unless the session has
    /// already ended.
    pub fn if_live<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let state = self.lock();
        if state.is_some() {
            return None;
        }
        let result = f();
        drop(state);
        Some(result)
    }

    /// Record that the navigation is running.
    pub fn mark_started(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        *self.lock()
    }

    pub fn is_terminated(&self) -> bool {
        self.outcome().is_some()
    }

    /// Block until an outcome has been committed.
    pub fn wait(&self) -> SessionOutcome {
        let mut state = self.lock();
        loop {
            if let Some(outcome) = *state {
                return outcome;
            }
            state = self.done.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting() -> (ExitHandler, Arc<Mutex<Vec<SessionOutcome>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        (Box::new(move |o| s.lock().unwrap().push(o)), seen)
    }

    #[test]
    fn exit_codes() {
        assert_eq!(SessionOutcome::Success.exit_code(), 0);
        assert_eq!(SessionOutcome::LoadFailure.exit_code(), 0);
        assert_eq!(SessionOutcome::Timeout.exit_code(), TIMEOUT_EXIT_CODE);
        assert_ne!(TIMEOUT_EXIT_CODE, INVALID_ARGUMENT_EXIT_CODE);
    }

    #[test]
    fn first_commit_wins() {
        let (exit, seen) = counting();
        let t = Terminator::new(exit);
        assert!(t.terminate(SessionOutcome::LoadFailure));
        assert!(!t.terminate(SessionOutcome::Timeout));
        assert!(!t.terminate(SessionOutcome::Success));
        assert_eq!(*seen.lock().unwrap(), vec![SessionOutcome::LoadFailure]);
        assert_eq!(t.wait(), SessionOutcome::LoadFailure);
    }

    #[test]
    fn announce_only_runs_for_winner() {
        let t = Terminator::new(no_exit());
        let calls = AtomicUsize::new(0);
        t.commit(SessionOutcome::Timeout, || {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        t.commit(SessionOutcome::Success, || {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn racing_threads_commit_once() {
        for _ in 0..50 {
            let (exit, seen) = counting();
            let t = Terminator::new(exit);
            let handles: Vec<_> = [SessionOutcome::Success, SessionOutcome::Timeout, SessionOutcome::LoadFailure]
                .into_iter()
                .map(|o| {
                    let t = t.clone();
                    thread::spawn(move || t.terminate(o))
                })
                .collect();
            let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|w| *w).count();
            assert_eq!(wins, 1);
            assert_eq!(seen.lock().unwrap().len(), 1);
        }
    }

    #[test]
    fn if_live_stops_after_commit() {
        let t = Terminator::new(no_exit());
        assert_eq!(t.if_live(|| 1), Some(1));
        t.terminate(SessionOutcome::Success);
        assert_eq!(t.if_live(|| 2), None);
        assert!(t.is_terminated());
    }

    #[test]
    fn started_flag_is_independent_of_outcome() {
        let t = Terminator::new(no_exit());
        assert!(!t.is_started());
        t.mark_started();
        assert!(t.is_started());
        assert!(!t.is_terminated());
    }

    #[test]
    fn wait_blocks_until_commit() {
        let t = Terminator::new(no_exit());
        let t2 = t.clone();
        let h = thread::spawn(move || t2.wait());
        thread::sleep(std::time::Duration::from_millis(20));
        t.terminate(SessionOutcome::Timeout);
        assert_eq!(h.join().unwrap(), SessionOutcome::Timeout);
    }
}
