use std::time::Duration;

use crate::task::Task;

/// Trailing-edge debouncer driven through `Task`s.
///
/// Every `schedule` restarts the window and invalidates earlier timers, so a
/// burst of events yields a single `fire` that returns true, `window` after
/// the last event of the burst.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    generation: u64,
    armed: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: 0,
            armed: false,
        }
    }

    /// Restart the timer. `on_fire` builds the message delivered when it elapses.
    pub fn schedule<M: Send + 'static>(
        &mut self,
        on_fire: impl FnOnce(u64) -> M + Send + 'static,
    ) -> Task<M> {
        self.generation += 1;
        self.armed = true;
        let generation = self.generation;
        let window = self.window;
        Task::future(async move {
            tokio::time::sleep(window).await;
            on_fire(generation)
        })
    }

    /// Consume a timer expiry. Only the most recent timer of an armed burst counts.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.armed && generation == self.generation {
            self.armed = false;
            true
        } else {
            false
        }
    }

    pub fn cancel(&mut self) {
        self.armed = false;
        self.generation += 1;
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.armed
    }
}
