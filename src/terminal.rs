//! Terminal input mode control.
//!
//! The keypress listener needs stdin in raw mode for the duration of a run:
//! keystrokes arrive one by one, are not echoed, and Ctrl+C reaches us as a
//! byte instead of a SIGINT. Output post-processing is left untouched because
//! the child shares our stdout and expects `\n` to start a new line.

use std::io;
use std::sync::{Arc, Mutex};

use crossterm::tty::IsTty;
use nix::sys::termios::{
    self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
    Termios,
};

/// Switches an input device in and out of raw mode.
pub trait TerminalMode: Send {
    fn enable_raw(&mut self) -> io::Result<()>;

    /// Puts the device back the way `enable_raw` found it.
    /// Calling it while not in raw mode does nothing.
    fn restore(&mut self) -> io::Result<()>;
}

/// A terminal mode shared between the listener and its dispose handle.
pub type SharedTerminal = Arc<Mutex<Box<dyn TerminalMode>>>;

pub fn shared(terminal: impl TerminalMode + 'static) -> SharedTerminal {
    Arc::new(Mutex::new(Box::new(terminal)))
}

/// Raw mode on the process's stdin via termios.
///
/// When stdin is not a terminal (piped input, CI) both operations are no-ops.
#[derive(Default)]
pub struct StdinTerminal {
    saved: Option<Termios>,
}

impl StdinTerminal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TerminalMode for StdinTerminal {
    fn enable_raw(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        if self.saved.is_some() || !stdin.is_tty() {
            return Ok(());
        }

        let original = termios::tcgetattr(&stdin)?;
        let mut raw = original.clone();
        make_raw(&mut raw);
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)?;
        self.saved = Some(original);

        tracing::debug!("stdin switched to raw mode");
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        let Some(original) = self.saved.take() else {
            return Ok(());
        };
        termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &original)?;

        tracing::debug!("stdin mode restored");
        Ok(())
    }
}

/// Clears input processing, echo, canonical mode and signal keys.
///
/// Unlike `cfmakeraw`, output processing (`OPOST`/`ONLCR`) stays on.
fn make_raw(t: &mut Termios) {
    t.input_flags &= !(InputFlags::BRKINT
        | InputFlags::ICRNL
        | InputFlags::INPCK
        | InputFlags::ISTRIP
        | InputFlags::IXON);
    t.output_flags |= OutputFlags::ONLCR;
    t.control_flags |= ControlFlags::CS8;
    t.local_flags &= !(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::IEXTEN | LocalFlags::ISIG);
    t.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    t.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_raw_keeps_output_processing() -> anyhow::Result<()> {
        // Build a termios from whatever the test process has, if anything
        let Ok(mut t) = termios::tcgetattr(io::stdin()) else {
            return Ok(());
        };
        t.output_flags |= OutputFlags::OPOST;
        make_raw(&mut t);

        assert!(t.output_flags.contains(OutputFlags::OPOST));
        assert!(t.output_flags.contains(OutputFlags::ONLCR));
        assert!(!t.local_flags.contains(LocalFlags::ECHO));
        assert!(!t.local_flags.contains(LocalFlags::ICANON));
        assert!(!t.local_flags.contains(LocalFlags::ISIG));
        assert_eq!(t.control_chars[SpecialCharacterIndices::VMIN as usize], 1);
        Ok(())
    }

    #[test]
    fn test_restore_without_enable_is_noop() -> anyhow::Result<()> {
        let mut terminal = StdinTerminal::new();
        terminal.restore()?;
        terminal.restore()?;
        Ok(())
    }
}
