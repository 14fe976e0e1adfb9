//! Raw keypress listener.
//!
//! While installed, the listener owns the terminal: stdin is in raw mode, every
//! chunk read from it is decoded into key events for observation and then
//! forwarded verbatim to the child. Kill gestures and termination signals end
//! the listener's event stream.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use crossterm::event::KeyEvent;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, warn};

use super::DisposeHandle;
use super::signals::{SignalScope, TermSignal};
use crate::event::{InputSource, decode_keys, is_kill_gesture};
use crate::terminal::SharedTerminal;

/// How long a lone ESC chunk waits for the key it may prefix. Terminals
/// normally send `Alt+key` as one chunk; a slow link can split it.
const ESCAPE_TIMEOUT: Duration = Duration::from_millis(500);

/// Callbacks invoked by the listener for each input chunk.
pub trait KeypressHandler {
    /// Observes one decoded key. Has no influence on control flow.
    fn on_key_press(&mut self, _key: &KeyEvent) {}

    /// Receives a chunk that carried no kill gesture, byte for byte.
    fn on_forward_chunk(&mut self, chunk: &[u8]);

    /// A kill gesture was typed. Called once for the chunk carrying it.
    fn on_kill(&mut self);

    /// Input reached EOF or failed; no further chunks will arrive.
    fn on_input_closed(&mut self) {}
}

/// Why the listener's event stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerEvent {
    Kill,
    Signal(TermSignal),
}

pub struct KeypressListener<H> {
    handler: H,
    input: Option<Receiver<io::Result<Vec<u8>>>>,
    signals: SignalScope,
    active: Arc<AtomicBool>,
    // Arrival of a lone ESC chunk not yet joined with the next one
    pending_escape: Option<Instant>,
}

impl<H: KeypressHandler> KeypressListener<H> {
    /// Enables raw mode, opens the input source and registers the signal
    /// scope. Every side effect is registered on `dispose`, which undoes them
    /// in reverse: the listener is deactivated, signals released, and the
    /// terminal mode restored last.
    ///
    /// When `route_panics` is set, a panic anywhere in the process disposes
    /// and exits with code 0.
    pub fn install(
        terminal: SharedTerminal,
        source: &mut dyn InputSource,
        dispose: &DisposeHandle,
        handler: H,
        route_panics: bool,
    ) -> Result<Self> {
        terminal
            .lock()
            .map_err(|_| anyhow!("terminal lock poisoned"))?
            .enable_raw()
            .context("Failed to put stdin into raw mode")?;
        dispose.defer(move || match terminal.lock() {
            Ok(mut t) => {
                if let Err(e) = t.restore() {
                    warn!("Failed to restore terminal mode: {}", e);
                }
            }
            Err(_) => warn!("terminal lock poisoned; mode not restored"),
        });

        let signals = SignalScope::install(dispose).context("Failed to install signal handlers")?;
        if route_panics {
            signals.route_panics(dispose);
        }

        let active = Arc::new(AtomicBool::new(true));
        let flag = active.clone();
        dispose.defer(move || flag.store(false, Ordering::SeqCst));

        debug!("keypress listener installed");
        Ok(Self {
            handler,
            input: Some(source.open()),
            signals,
            active,
            pending_escape: None,
        })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    fn handler(&self) -> &H {
        &self.handler
    }

    /// Processes one raw input chunk. Returns true if it carried a kill
    /// gesture; such a chunk is not forwarded.
    ///
    /// A chunk following a lone ESC within the escape timeout is decoded as
    /// if the ESC prefixed it, so a split `Alt+C` still kills. The ESC itself
    /// has already been forwarded by then.
    ///
    /// Ignored once the listener has been disposed.
    pub fn handle_chunk(&mut self, chunk: &[u8]) -> bool {
        if !self.is_active() {
            return false;
        }

        let keys = match self.pending_escape.take() {
            Some(at) if at.elapsed() <= ESCAPE_TIMEOUT => decode_keys(&[&[0x1b_u8][..], chunk].concat()),
            _ => decode_keys(chunk),
        };
        if chunk == [0x1b] {
            self.pending_escape = Some(Instant::now());
        }
        for key in &keys {
            self.handler.on_key_press(key);
        }

        if keys.iter().any(is_kill_gesture) {
            self.handler.on_kill();
            return true;
        }

        self.handler.on_forward_chunk(chunk);
        false
    }

    /// Drives the listener until a kill gesture or a termination signal.
    ///
    /// Cancel-safe: dropping the future between chunks loses nothing.
    pub async fn next_event(&mut self) -> ListenerEvent {
        loop {
            let received = tokio::select! {
                signal = self.signals.recv() => return ListenerEvent::Signal(signal),
                received = recv_input(&mut self.input) => received,
            };

            match received {
                Some(Ok(chunk)) => {
                    if self.handle_chunk(&chunk) {
                        return ListenerEvent::Kill;
                    }
                }
                Some(Err(e)) => {
                    warn!("Failed to read input: {}", e);
                    self.close_input();
                }
                None => {
                    debug!("input reached EOF");
                    self.close_input();
                }
            }
        }
    }

    fn close_input(&mut self) {
        self.input = None;
        self.handler.on_input_closed();
    }
}

async fn recv_input(input: &mut Option<Receiver<io::Result<Vec<u8>>>>) -> Option<io::Result<Vec<u8>>> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
