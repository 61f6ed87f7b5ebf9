//! Timers handed to protocol entities
//!
//! Timers are backed by the tokio runtime the factory was created on. A
//! factory created outside of any runtime produces inert timers: they can
//! be configured and started but never expire.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Creates timers bound to one executor context.
#[derive(Clone, Default)]
pub struct TimerFactory {
    handle: Option<Handle>,
}

impl TimerFactory {
    /// Creates a factory spawning timers on the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Creates a factory bound to the current runtime, or an inert one
    /// when called outside of a runtime.
    pub fn current() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    /// Creates a factory whose timers never fire.
    pub fn inert() -> Self {
        Self::default()
    }

    /// Returns true if timers created by this factory can expire.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Creates a new, unconfigured timer.
    pub fn create_timer(&self) -> UniqueTimer {
        UniqueTimer {
            handle: self.handle.clone(),
            state: Arc::new(Mutex::new(TimerState::default())),
        }
    }
}

impl fmt::Debug for TimerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerFactory")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
struct TimerState {
    duration: Option<Duration>,
    callback: Option<TimerCallback>,
    task: Option<JoinHandle<()>>,
    running: bool,
    expired: bool,
    generation: u64,
}

/// A restartable one-shot timer.
pub struct UniqueTimer {
    handle: Option<Handle>,
    state: Arc<Mutex<TimerState>>,
}

impl UniqueTimer {
    /// Configures duration and expiry callback. Stops the timer if running.
    pub fn set<F>(&self, duration: Duration, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = self.lock();
        Self::cancel(&mut state);
        state.duration = Some(duration);
        state.callback = Some(Arc::new(callback));
    }

    /// Starts or restarts the timer. No-op if the timer was never set.
    pub fn run(&self) {
        let mut state = self.lock();
        let Some(duration) = state.duration else {
            return;
        };
        Self::cancel(&mut state);
        state.running = true;
        state.expired = false;

        let Some(handle) = &self.handle else {
            return;
        };
        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        state.task = Some(handle.spawn(async move {
            tokio::time::sleep(duration).await;
            let callback = {
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if state.generation != generation {
                    return;
                }
                state.running = false;
                state.expired = true;
                state.task = None;
                state.callback.clone()
            };
            if let Some(callback) = callback {
                callback();
            }
        }));
    }

    /// Stops the timer without firing it.
    pub fn stop(&self) {
        let mut state = self.lock();
        Self::cancel(&mut state);
    }

    /// Returns true while the timer is counting.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Returns true if the timer fired since it was last (re)started.
    pub fn has_expired(&self) -> bool {
        self.lock().expired
    }

    /// Returns the configured duration.
    pub fn duration(&self) -> Option<Duration> {
        self.lock().duration
    }

    fn cancel(state: &mut TimerState) {
        state.generation = state.generation.wrapping_add(1);
        state.running = false;
        if let Some(task) = state.task.take() {
            task.abort();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for UniqueTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for UniqueTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("UniqueTimer")
            .field("duration", &state.duration)
            .field("running", &state.running)
            .field("expired", &state.expired)
            .finish()
    }
}
