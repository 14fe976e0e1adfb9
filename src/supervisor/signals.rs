//! Process-wide termination signals, scoped to one supervised run.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal::unix::{Signal, SignalKind, signal};

use super::DisposeHandle;

/// A termination signal delivered to the supervisor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl TermSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermSignal::Interrupt => "SIGINT",
            TermSignal::Terminate => "SIGTERM",
            TermSignal::Hangup => "SIGHUP",
        }
    }
}

impl fmt::Display for TermSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handlers for SIGINT, SIGTERM and SIGHUP, registered on construction.
///
/// The scope is released through the [`DisposeHandle`] passed to
/// [`install`](Self::install): once disposed, [`recv`](Self::recv) never
/// resolves again.
pub struct SignalScope {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
    released: Arc<AtomicBool>,
}

impl SignalScope {
    pub fn install(dispose: &DisposeHandle) -> io::Result<Self> {
        let scope = Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
            released: Arc::new(AtomicBool::new(false)),
        };

        let released = scope.released.clone();
        dispose.defer(move || {
            released.store(true, Ordering::SeqCst);
            tracing::debug!("signal scope released");
        });

        tracing::debug!("signal scope installed");
        Ok(scope)
    }

    /// Routes panics to cleanup: the panic is reported, `dispose` runs, and
    /// the process exits with code 0. The previous panic hook is put back
    /// when the handle is disposed outside of a panic.
    pub fn route_panics(&self, dispose: &DisposeHandle) {
        route_panics_to(dispose, || std::process::exit(0));
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Waits for the next termination signal. Pending forever once released.
    pub async fn recv(&mut self) -> TermSignal {
        if self.is_released() {
            return std::future::pending().await;
        }

        tokio::select! {
            Some(()) = self.interrupt.recv() => TermSignal::Interrupt,
            Some(()) = self.terminate.recv() => TermSignal::Terminate,
            Some(()) = self.hangup.recv() => TermSignal::Hangup,
            else => std::future::pending().await,
        }
    }
}

fn route_panics_to(dispose: &DisposeHandle, exit: impl Fn() + Send + Sync + 'static) {
    let previous = std::panic::take_hook();
    let cleanup = dispose.clone();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("Uncaught panic: {}", info);
        eprintln!("Uncaught panic: {}", info);
        cleanup.dispose();
        exit();
    }));

    dispose.defer(move || {
        // set_hook panics when called from a panicking thread
        if std::thread::panicking() {
            return;
        }
        drop(std::panic::take_hook());
        std::panic::set_hook(previous);
    });
}

impl fmt::Debug for SignalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalScope")
            .field("released", &self.is_released())
            .finish()
    }
}
