//! Single wall-clock deadline for a session.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

use crate::Result;

/// One-shot timer running on its own thread.
///
/// `on_fire` runs once `timeout` elapses unless the guard was disarmed
/// first. It does not decide whether the session is still live: it should
/// go through [`crate::Terminator`], which turns a late fire into a no-op.
pub struct DeadlineGuard {
    cancel: Sender<()>,
    handle: JoinHandle<()>,
}

impl DeadlineGuard {
    pub fn arm<F>(timeout: Duration, on_fire: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();
        let armed_at = Instant::now();
        let handle = thread::Builder::new()
            .name("rfextract-deadline".into())
            .spawn(move || match rx.recv_timeout(timeout) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => on_fire(),
                // Guard dropped without disarm: stay armed.
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(timeout.saturating_sub(armed_at.elapsed()));
                    on_fire();
                }
            })?;
        debug!("deadline armed for {}ms", timeout.as_millis());

        Ok(Self { cancel: tx, handle })
    }

    /// Whether the timer thread is still waiting or running `on_fire`.
    pub fn is_pending(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the timer if it has not fired yet.
    pub fn disarm(self) {
        let _ = self.cancel.send(());
    }
}
