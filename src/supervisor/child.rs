//! The supervised child process.
//!
//! The child gets a piped stdin owned by the supervisor, and shares the
//! supervisor's stdout/stderr untouched. Input is written by a forwarder task
//! so a child that stops reading can never stall the event loop.

use std::io;
use std::process::{ExitStatus, Stdio};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, warn};

use crate::selector::EntryPoint;

/// Owns one running child process for the duration of a run.
#[derive(Debug)]
pub struct ChildProcessHandle {
    child: Child,
    pid: Option<u32>,
}

impl ChildProcessHandle {
    /// Spawns the entry point's runner with piped stdin and inherited output.
    pub fn spawn(entry: &EntryPoint) -> io::Result<Self> {
        let mut command = Command::new(&entry.runner);
        command
            .args(entry.env_file_arg())
            .arg(&entry.entry_file)
            .current_dir(&entry.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = command.spawn()?;
        let pid = child.id();
        debug!(?pid, runner = %entry.runner.display(), "child process spawned");
        Ok(Self { child, pid })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Detaches the stdin pipe and starts forwarding chunks into it.
    ///
    /// Chunks are written in the order they are sent. Dropping every sender
    /// closes the child's stdin. Returns `None` if stdin was already taken.
    pub fn forward_stdin(&mut self) -> Option<UnboundedSender<Vec<u8>>> {
        let stdin = self.child.stdin.take()?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_chunks(stdin, rx));
        Some(tx)
    }

    /// Waits for the child to exit. Cancel-safe.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }
}

async fn forward_chunks(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(chunk) = rx.recv().await {
        let written = match stdin.write_all(&chunk).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // Child closed its stdin or exited; nothing more can be delivered
            debug!("stopped forwarding input to child: {}", e);
            break;
        }
    }
}

/// Best-effort SIGTERM to the child. The child is not waited for.
pub fn terminate(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(pid, "failed to signal child process: {}", e);
    }
}

/// Name of a signal number as reported to the user, e.g. `SIGKILL`.
pub fn signal_name(signo: i32) -> String {
    Signal::try_from(signo)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {}", signo))
}
