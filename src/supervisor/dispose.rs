use std::sync::{Arc, Mutex, MutexGuard};

type CleanupStep = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct DisposeState {
    disposed: bool,
    steps: Vec<CleanupStep>,
}

/// An idempotent handle that undoes everything a run registered.
///
/// Cleanup steps are registered with [`defer`](Self::defer) as side effects are
/// installed (raw mode, signal handlers, panic hook...). The first call to
/// [`dispose`](Self::dispose) runs them in reverse registration order; every
/// later call is a no-op. Clones share the same state, so every exit branch can
/// hold a copy and call it.
///
/// # Examples
///
/// ```
/// use exercise_runner::supervisor::DisposeHandle;
///
/// let handle = DisposeHandle::new();
/// handle.defer(|| println!("restored"));
///
/// handle.dispose(); // prints "restored"
/// handle.dispose(); // does nothing
/// ```
#[derive(Clone, Default)]
pub struct DisposeHandle {
    state: Arc<Mutex<DisposeState>>,
}

impl DisposeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cleanup step. If the handle was already disposed the step
    /// runs immediately, so late registrations are never leaked.
    pub fn defer(&self, step: impl FnOnce() + Send + 'static) {
        let mut state = self.lock();
        if state.disposed {
            drop(state);
            step();
            return;
        }
        state.steps.push(Box::new(step));
    }

    pub fn dispose(&self) {
        let steps = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.steps)
        };

        // Lock released: a step may itself call dispose()
        for step in steps.into_iter().rev() {
            step();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Returns a guard that disposes when dropped, covering early returns
    /// and unwinding.
    pub fn guard(&self) -> DisposeGuard {
        DisposeGuard {
            handle: self.clone(),
        }
    }

    // Cleanup must still run after a panic poisoned the lock.
    fn lock(&self) -> MutexGuard<'_, DisposeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for DisposeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("DisposeHandle")
            .field("disposed", &state.disposed)
            .field("pending_steps", &state.steps.len())
            .finish()
    }
}

/// Disposes its handle on drop.
#[must_use = "the handle is disposed as soon as the guard is dropped"]
pub struct DisposeGuard {
    handle: DisposeHandle,
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}
