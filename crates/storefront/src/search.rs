//! Debounced search input.
//!
//! Keystrokes arrive far faster than the backend should be queried. The
//! debouncer holds at most one pending timer; every keystroke replaces it,
//! and only a timer that runs to completion dispatches its text.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Delay used when none is configured.
pub const DEFAULT_SEARCH_DELAY: Duration = Duration::from_millis(500);

/// Receives the text of a search once typing has settled.
///
/// Dispatch must not block; implementations typically spawn the actual
/// request so that already-dispatched searches run to completion.
pub trait SearchDispatch: Send + Sync + 'static {
    fn dispatch(&self, query: String);
}

impl<F> SearchDispatch for F
where
    F: Fn(String) + Send + Sync + 'static,
{
    fn dispatch(&self, query: String) {
        self(query);
    }
}

enum Timer {
    Idle,
    Pending { generation: u64, handle: JoinHandle<()> },
}

struct Shared {
    next_generation: u64,
    timer: Timer,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // The guarded data stays consistent even if a holder panicked
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coalesces rapid input into a single dispatched query.
///
/// Timers run on the tokio runtime that was current when the debouncer was
/// created, so input may be fed from threads outside that runtime.
pub struct SearchDebouncer {
    delay: Duration,
    runtime: Option<Handle>,
    shared: Arc<Mutex<Shared>>,
    dispatch: Arc<dyn SearchDispatch>,
}

impl SearchDebouncer {
    /// Create a debouncer that waits `delay` after the last keystroke.
    ///
    /// Captures the current tokio runtime, if any; see
    /// [`SearchDebouncer::with_runtime`] to choose one explicitly.
    #[must_use]
    pub fn new(delay: Duration, dispatch: impl SearchDispatch) -> Self {
        Self {
            delay,
            runtime: Handle::try_current().ok(),
            shared: Arc::new(Mutex::new(Shared {
                next_generation: 0,
                timer: Timer::Idle,
            })),
            dispatch: Arc::new(dispatch),
        }
    }

    /// Run timers on `runtime`.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Configured delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a keystroke: cancel any pending timer and start a new one for
    /// `text`.
    ///
    /// Input is dropped with a warning when the debouncer was created outside
    /// a runtime and none is current now.
    pub fn on_input(&self, text: impl Into<String>) {
        let Some(runtime) = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        else {
            warn!("No tokio runtime available, search input dropped");
            return;
        };

        let text = text.into();
        let mut shared = lock(&self.shared);

        shared.next_generation += 1;
        let generation = shared.next_generation;

        if let Timer::Pending { handle, .. } = std::mem::replace(&mut shared.timer, Timer::Idle) {
            trace!("Replacing pending search timer");
            handle.abort();
        }

        let delay = self.delay;
        let timer_shared = Arc::clone(&self.shared);
        let dispatch = Arc::clone(&self.dispatch);

        // The lock is held until the new timer is stored, so the task below
        // always finds its own generation once it wakes
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let fire = {
                let mut shared = lock(&timer_shared);
                match shared.timer {
                    Timer::Pending { generation: current, .. } if current == generation => {
                        shared.timer = Timer::Idle;
                        true
                    }
                    _ => false,
                }
            };

            if fire {
                trace!(query = %text, "Search input settled");
                dispatch.dispatch(text);
            }
        });

        shared.timer = Timer::Pending { generation, handle };
    }

    /// Drop any pending timer without dispatching.
    pub fn cancel(&self) {
        let mut shared = lock(&self.shared);
        if let Timer::Pending { handle, .. } = std::mem::replace(&mut shared.timer, Timer::Idle) {
            handle.abort();
        }
    }

    /// Whether a timer is waiting to fire.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(lock(&self.shared).timer, Timer::Pending { .. })
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SearchDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchDebouncer")
            .field("delay", &self.delay)
            .field("runtime", &self.runtime.is_some())
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}
