// SPDX-License-Identifier: GPL-3.0-only
//! Link read loop
//!
//! Runs on its own thread, decodes newline-terminated lines from the link and
//! pushes them into the message FIFO in arrival order. The loop never touches
//! the write half, so it cannot block outbound messages.

use super::link::LinkReader;
use super::message::Inbound;
use crossbeam_channel::Sender;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest line accepted before the partial buffer is discarded
const MAX_LINE_LEN: usize = 1024;

/// Pause after an empty read that was not a hang-up, or after a read error
const IDLE_BACKOFF: Duration = Duration::from_millis(20);
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Consecutive EIO errors treated as a lost TTY
const MAX_IO_ERRORS: u32 = 5;

/// Splits a byte stream into trimmed, non-empty lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Skipping the rest of an overlong line
    discarding: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                let line = String::from_utf8_lossy(&self.buffer).trim().to_string();
                self.buffer.clear();
                if !line.is_empty() {
                    lines.push(line);
                }
            } else if self.discarding {
                continue;
            } else if self.buffer.len() >= MAX_LINE_LEN {
                warn!(len = self.buffer.len(), "Discarding overlong line from link");
                self.buffer.clear();
                self.discarding = true;
            } else {
                self.buffer.push(byte);
            }
        }
        lines
    }
}

/// Handle to a running read loop thread
pub struct ReadLoop {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl ReadLoop {
    /// Start reading `reader` into `fifo` on a new thread
    pub fn start(name: &str, mut reader: LinkReader, fifo: Sender<Inbound>) -> Self {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting link read loop");

        let thread_handle = thread::Builder::new()
            .name("link-reader".to_string())
            .spawn(move || {
                let mut decoder = LineDecoder::new();
                let mut buf = [0u8; 256];
                let mut consecutive_errors: u32 = 0;

                while !stop_signal_clone.load(Ordering::SeqCst) {
                    let read = match reader.read(&mut buf) {
                        Ok(0) if reader.hung_up() => {
                            info!(name = %name_clone, "Link closed by peer");
                            break;
                        }
                        Ok(0) => {
                            thread::sleep(IDLE_BACKOFF);
                            continue;
                        }
                        Ok(n) => n,
                        Err(e)
                            if matches!(
                                e.kind(),
                                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                            ) =>
                        {
                            continue;
                        }
                        Err(e) if e.raw_os_error() == Some(libc::EIO) => {
                            consecutive_errors += 1;
                            if consecutive_errors >= MAX_IO_ERRORS {
                                error!(name = %name_clone, error = %e, "Link lost");
                                break;
                            }
                            thread::sleep(ERROR_BACKOFF);
                            continue;
                        }
                        Err(e) => {
                            consecutive_errors += 1;
                            if consecutive_errors == 1 || consecutive_errors % 50 == 0 {
                                error!(
                                    name = %name_clone,
                                    error = %e,
                                    consecutive_errors,
                                    "Error reading from link"
                                );
                            }
                            thread::sleep(ERROR_BACKOFF);
                            continue;
                        }
                    };
                    consecutive_errors = 0;

                    for line in decoder.push(&buf[..read]) {
                        debug!(line = %line, "Received from controller board");
                        if fifo.send(Inbound::parse(&line)).is_err() {
                            debug!(name = %name_clone, "Message FIFO closed");
                            return;
                        }
                    }
                }

                info!(name = %name_clone, "Link read loop exiting");
            });

        let thread_handle = match thread_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(name = %name, error = %e, "Failed to spawn link read loop");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            name: name.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the loop to stop and wait for the thread to exit
    pub fn stop(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!(name = %self.name, "Link read loop thread panicked");
            }
        }
    }
}

impl Drop for ReadLoop {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
