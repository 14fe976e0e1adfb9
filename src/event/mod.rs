//! Terminal input events.
//!
//! Raw stdin is read on a dedicated thread so the supervisor's event loop is
//! never blocked by a pending read. Chunks are delivered in the order they
//! were read through a bounded channel.
//!
//! # Submodules
//!
//! - `keys`: decoding raw chunks into key events, kill-gesture detection

pub mod keys;

use std::io::{Read, Result};
use std::thread;

use tokio::sync::mpsc::{self, Receiver};

pub use keys::{decode_keys, is_kill_gesture};

// Keystrokes are small; a paste can fill one read
const INPUT_READ_BUFFER: usize = 4096;
const INPUT_CHANNEL_CAPACITY: usize = 64;

/// A source of raw input chunks for the keypress listener.
///
/// Opening the source starts delivery. The supervisor opens it only once the
/// child is running, so nothing is consumed from stdin while the selector
/// prompt owns the terminal.
pub trait InputSource {
    fn open(&mut self) -> Receiver<Result<Vec<u8>>>;
}

/// Reads the process's own stdin.
#[derive(Debug, Default)]
pub struct StdinSource;

impl InputSource for StdinSource {
    /// Spawns the reader thread.
    ///
    /// The thread exits on EOF, on a read error (after forwarding it), or as
    /// soon as the receiver has been dropped.
    fn open(&mut self) -> Receiver<Result<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        thread::spawn(move || {
            let mut stdin = std::io::stdin();
            let mut buf = [0u8; INPUT_READ_BUFFER];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        if tx.blocking_send(Err(e)).is_err() {
                            tracing::debug!("Input receiver dropped before read error was delivered");
                        }
                        break;
                    }
                }
            }
        });
        rx
    }
}

/// An input source backed by an existing channel.
///
/// Used where input is produced in-process rather than read from stdin.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Option<Receiver<Result<Vec<u8>>>>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<Result<Vec<u8>>>) -> Self {
        Self { rx: Some(rx) }
    }
}

impl InputSource for ChannelSource {
    /// Hands out the wrapped receiver. A second open yields a closed channel.
    fn open(&mut self) -> Receiver<Result<Vec<u8>>> {
        self.rx.take().unwrap_or_else(|| mpsc::channel(1).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_delivers_in_order() -> anyhow::Result<()> {
        let (tx, rx) = mpsc::channel(4);
        let mut source = ChannelSource::new(rx);
        let mut opened = source.open();

        tx.send(Ok(b"ab".to_vec())).await?;
        tx.send(Ok(b"c".to_vec())).await?;
        drop(tx);

        let mut received = Vec::new();
        while let Some(Ok(chunk)) = opened.recv().await {
            received.extend(chunk);
        }
        assert_eq!(received, b"abc");
        Ok(())
    }

    #[tokio::test]
    async fn test_channel_source_second_open_is_closed() {
        let (_tx, rx) = mpsc::channel(1);
        let mut source = ChannelSource::new(rx);
        let _first = source.open();
        let mut second = source.open();
        assert!(second.recv().await.is_none());
    }
}
