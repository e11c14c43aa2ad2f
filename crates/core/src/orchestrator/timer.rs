//! Cancellable timer slots.

use tokio::task::JoinHandle;
use tracing::debug;

/// Holds at most one scheduled background loop.
///
/// Arming replaces (and cancels) whatever was armed before; disarming an
/// empty slot is a no-op.
#[derive(Debug)]
pub struct TimerSlot {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new(name: &'static str) -> Self {
        Self { name, handle: None }
    }

    pub fn arm(&mut self, handle: JoinHandle<()>) {
        self.disarm();
        debug!("Armed {} timer", self.name);
        self.handle = Some(handle);
    }

    /// Cancel the armed loop. Returns whether anything was armed.
    pub fn disarm(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                debug!("Disarmed {} timer", self.name);
                true
            }
            None => false,
        }
    }

    /// True while a loop is armed and has not finished on its own.
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.disarm();
    }
}
