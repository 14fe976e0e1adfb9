//! Process supervision.
//!
//! The supervisor runs exactly one child process to completion. While the
//! child runs, a [`KeypressListener`] owns the terminal and relays input to
//! it. Every way a run can end (child exit, kill gesture, termination signal,
//! spawn or orchestration failure) is reported as a [`TerminationReason`],
//! and the listener is always disposed before `run` returns.

mod child;
mod dispose;
mod listener;
mod signals;

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use crossterm::event::KeyEvent;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, trace};

use crate::event::{InputSource, StdinSource};
use crate::selector::EntryPoint;
use crate::terminal::{self, SharedTerminal, StdinTerminal, TerminalMode};

pub use child::{ChildProcessHandle, signal_name};
pub use dispose::{DisposeGuard, DisposeHandle};
pub use listener::{KeypressHandler, KeypressListener, ListenerEvent};
pub use signals::{SignalScope, TermSignal};

/// Why a supervised run ended.
#[derive(Debug)]
pub enum TerminationReason {
    /// The child exited on its own with this code.
    NormalExit(i32),
    /// The child was terminated by this signal number.
    SignalExit(i32),
    /// The child could not be started, or waiting on it failed.
    SpawnError(io::Error),
    /// A kill gesture was typed.
    KillRequested,
    /// The supervisor received a termination signal.
    Interrupted(TermSignal),
    /// Orchestrating the run failed.
    FatalUncaught(anyhow::Error),
}

impl TerminationReason {
    /// The code the supervisor process should exit with.
    pub fn exit_code(&self) -> i32 {
        match self {
            TerminationReason::NormalExit(code) => *code,
            TerminationReason::SignalExit(_) => 0,
            TerminationReason::SpawnError(_) => 1,
            TerminationReason::KillRequested => 0,
            TerminationReason::Interrupted(_) => 0,
            TerminationReason::FatalUncaught(_) => 1,
        }
    }

    /// Completion of the run: `Ok` only when the child exited with code 0,
    /// or when the user asked for the run to stop.
    pub fn into_result(self) -> Result<(), SupervisorError> {
        match self {
            TerminationReason::NormalExit(0)
            | TerminationReason::KillRequested
            | TerminationReason::Interrupted(_) => Ok(()),
            TerminationReason::NormalExit(code) => Err(SupervisorError::ChildFailed(code)),
            TerminationReason::SignalExit(signo) => Err(SupervisorError::ChildSignaled(signo)),
            TerminationReason::SpawnError(e) => Err(SupervisorError::Spawn(e)),
            TerminationReason::FatalUncaught(e) => Err(SupervisorError::Fatal(e)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Child process exited with code {0}")]
    ChildFailed(i32),
    #[error("Child process was killed with signal {}", signal_name(*.0))]
    ChildSignaled(i32),
    #[error("Failed to start child process: {0}")]
    Spawn(#[source] io::Error),
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

/// Runs one child at a time with terminal input relayed to it.
pub struct Supervisor {
    terminal: SharedTerminal,
    input: Box<dyn InputSource + Send>,
    route_panics: bool,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// A supervisor bound to the process's own stdin. Panics during a run are
    /// routed to cleanup.
    pub fn new() -> Self {
        Self {
            terminal: terminal::shared(StdinTerminal::new()),
            input: Box::new(StdinSource),
            route_panics: true,
        }
    }

    /// A supervisor with explicit terminal and input. Panics are left to the
    /// existing hook.
    pub fn with_io(
        terminal: impl TerminalMode + 'static,
        input: impl InputSource + Send + 'static,
    ) -> Self {
        Self {
            terminal: terminal::shared(terminal),
            input: Box::new(input),
            route_panics: false,
        }
    }

    /// Spawns the entry point and supervises it until it ends.
    pub async fn run(&mut self, entry: &EntryPoint) -> TerminationReason {
        let mut child = match ChildProcessHandle::spawn(entry) {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to start child process: {}", e);
                eprintln!("Failed to start child process: {}", e);
                return TerminationReason::SpawnError(e);
            }
        };

        let dispose = DisposeHandle::new();
        // Restores the terminal even if supervision unwinds
        let _guard = dispose.guard();

        let reason = match self.supervise(&mut child, &dispose).await {
            Ok(reason) => reason,
            Err(e) => {
                dispose.dispose();
                error!("Supervision failed: {:#}", e);
                eprintln!("{:#}", e);
                TerminationReason::FatalUncaught(e)
            }
        };

        dispose.dispose();
        reason
    }

    async fn supervise(
        &mut self,
        child: &mut ChildProcessHandle,
        dispose: &DisposeHandle,
    ) -> anyhow::Result<TerminationReason> {
        let relay = ChildInput {
            pid: child.pid(),
            forward: child.forward_stdin(),
        };
        let mut listener = KeypressListener::install(
            self.terminal.clone(),
            self.input.as_mut(),
            dispose,
            relay,
            self.route_panics,
        )?;

        tokio::select! {
            status = child.wait() => {
                dispose.dispose();
                Ok(match status {
                    Ok(status) => report_exit(status),
                    Err(e) => {
                        error!("Child process failed: {}", e);
                        eprintln!("Child process failed: {}", e);
                        TerminationReason::SpawnError(e)
                    }
                })
            }
            event = listener.next_event() => {
                dispose.dispose();
                Ok(match event {
                    ListenerEvent::Kill => {
                        info!("kill gesture received; child signalled");
                        TerminationReason::KillRequested
                    }
                    ListenerEvent::Signal(signal) => {
                        info!(%signal, "termination signal received");
                        TerminationReason::Interrupted(signal)
                    }
                })
            }
        }
    }
}

fn report_exit(status: ExitStatus) -> TerminationReason {
    if let Some(code) = status.code() {
        info!(code, "child process exited");
        println!("Child process exited with code {}", code);
        TerminationReason::NormalExit(code)
    } else if let Some(signo) = status.signal() {
        let name = signal_name(signo);
        info!(signal = %name, "child process killed");
        println!("Child process was killed with signal {}", name);
        TerminationReason::SignalExit(signo)
    } else {
        TerminationReason::NormalExit(0)
    }
}

/// Relays listener callbacks to the running child.
struct ChildInput {
    pid: Option<u32>,
    forward: Option<UnboundedSender<Vec<u8>>>,
}

impl KeypressHandler for ChildInput {
    fn on_key_press(&mut self, key: &KeyEvent) {
        trace!(?key, "key press");
    }

    fn on_forward_chunk(&mut self, chunk: &[u8]) {
        let closed = self
            .forward
            .as_ref()
            .is_some_and(|tx| tx.send(chunk.to_vec()).is_err());
        if closed {
            self.forward = None;
        }
    }

    fn on_kill(&mut self) {
        child::terminate(self.pid);
    }

    fn on_input_closed(&mut self) {
        // Dropping the sender closes the child's stdin
        self.forward = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChannelSource;
    use crate::terminal::testing::RecordingTerminal;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    type Input = mpsc::Sender<io::Result<Vec<u8>>>;

    /// An exercise directory whose entry is a shell script run by `/bin/sh`.
    fn script_entry(body: &str) -> anyhow::Result<(TempDir, EntryPoint)> {
        let dir = tempfile::tempdir()?;
        let entry_file = dir.path().join("main.sh");
        std::fs::write(&entry_file, body)?;
        let entry = EntryPoint {
            working_dir: dir.path().to_path_buf(),
            entry_file,
            runner: PathBuf::from("/bin/sh"),
            env_file: None,
        };
        Ok((dir, entry))
    }

    fn supervisor() -> (Supervisor, RecordingTerminal, Input) {
        let terminal = RecordingTerminal::default();
        let (tx, rx) = mpsc::channel(8);
        let supervisor = Supervisor::with_io(terminal.clone(), ChannelSource::new(rx));
        (supervisor, terminal, tx)
    }

    async fn run_with_timeout(
        supervisor: &mut Supervisor,
        entry: &EntryPoint,
    ) -> anyhow::Result<TerminationReason> {
        Ok(tokio::time::timeout(Duration::from_secs(10), supervisor.run(entry)).await?)
    }

    #[tokio::test]
    async fn test_zero_exit_completes() -> anyhow::Result<()> {
        let (_dir, entry) = script_entry("exit 0\n")?;
        let (mut supervisor, terminal, _input) = supervisor();

        let reason = run_with_timeout(&mut supervisor, &entry).await?;

        assert!(matches!(reason, TerminationReason::NormalExit(0)));
        assert_eq!(reason.exit_code(), 0);
        assert!(reason.into_result().is_ok());

        let modes = terminal.snapshot();
        assert!(!modes.raw);
        assert_eq!(modes.enables, 1);
        assert_eq!(modes.restores, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_with_code() -> anyhow::Result<()> {
        let (_dir, entry) = script_entry("exit 2\n")?;
        let (mut supervisor, terminal, _input) = supervisor();

        let reason = run_with_timeout(&mut supervisor, &entry).await?;

        assert_eq!(reason.exit_code(), 2);
        match reason.into_result() {
            Err(SupervisorError::ChildFailed(code)) => assert_eq!(code, 2),
            other => panic!("expected ChildFailed(2), got {:?}", other),
        }
        assert!(!terminal.snapshot().raw);
        Ok(())
    }

    #[tokio::test]
    async fn test_signal_exit_defaults_to_zero() -> anyhow::Result<()> {
        let (_dir, entry) = script_entry("kill -KILL $$\n")?;
        let (mut supervisor, _terminal, _input) = supervisor();

        let reason = run_with_timeout(&mut supervisor, &entry).await?;

        assert!(matches!(reason, TerminationReason::SignalExit(9)));
        assert_eq!(reason.exit_code(), 0);
        assert!(matches!(
            reason.into_result(),
            Err(SupervisorError::ChildSignaled(9))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_spawn_error_never_engages_terminal() -> anyhow::Result<()> {
        let (_dir, mut entry) = script_entry("exit 0\n")?;
        entry.runner = PathBuf::from("/nonexistent/runner");
        let (mut supervisor, terminal, _input) = supervisor();

        let reason = run_with_timeout(&mut supervisor, &entry).await?;

        assert!(matches!(reason, TerminationReason::SpawnError(_)));
        assert_eq!(reason.exit_code(), 1);
        assert_eq!(terminal.snapshot().enables, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_input_forwarded_to_child() -> anyhow::Result<()> {
        let (dir, entry) = script_entry("read line\nprintf '%s' \"$line\" > got.txt\n")?;
        let (mut supervisor, _terminal, input) = supervisor();

        input.send(Ok(b"hel".to_vec())).await?;
        input.send(Ok(b"lo\n".to_vec())).await?;

        let reason = run_with_timeout(&mut supervisor, &entry).await?;

        assert!(matches!(reason, TerminationReason::NormalExit(0)));
        assert_eq!(std::fs::read_to_string(dir.path().join("got.txt"))?, "hello");
        Ok(())
    }

    #[tokio::test]
    async fn test_input_eof_reaches_child() -> anyhow::Result<()> {
        let (_dir, entry) = script_entry("cat > /dev/null\nexit 3\n")?;
        let (mut supervisor, _terminal, input) = supervisor();
        drop(input);

        let reason = run_with_timeout(&mut supervisor, &entry).await?;

        assert!(matches!(reason, TerminationReason::NormalExit(3)));
        Ok(())
    }

    #[tokio::test]
    async fn test_kill_gesture_stops_run() -> anyhow::Result<()> {
        let (_dir, entry) = script_entry("exec sleep 30\n")?;
        let (mut supervisor, terminal, input) = supervisor();

        input.send(Ok(b"\x03".to_vec())).await?;
        let reason = run_with_timeout(&mut supervisor, &entry).await?;

        assert!(matches!(reason, TerminationReason::KillRequested));
        assert_eq!(reason.exit_code(), 0);
        let modes = terminal.snapshot();
        assert!(!modes.raw);
        assert_eq!(modes.restores, 1);
        Ok(())
    }
}
