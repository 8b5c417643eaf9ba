// SPDX-License-Identifier: GPL-3.0-only

//! Message transport to the controller board
//!
//! ```text
//!  link ──▶ read loop thread ──▶ FIFO (unbounded) ──▶ receive(timeout)
//!  link ◀──────────────────────────────────────────── send(message)
//! ```
//!
//! The read loop is the only producer and the controller loop the only
//! consumer of the FIFO. Messages are never dropped while connected; they queue
//! while the controller is busy capturing or printing.

pub mod link;
pub mod message;
pub mod read_loop;

pub use link::{Link, SerialLink};
pub use message::{Inbound, MessageSink, Outbound};

use crate::errors::TransportError;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use link::LinkWriter;
use read_loop::ReadLoop;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connected line-protocol transport
pub struct MessageTransport {
    endpoint: String,
    writer: Option<LinkWriter>,
    inbox: Receiver<Inbound>,
    read_loop: Option<ReadLoop>,
}

impl MessageTransport {
    /// Open `link` and start the read loop
    ///
    /// Fails with [`TransportError::LinkUnavailable`] if the link cannot be opened.
    pub fn connect<L: Link>(link: L) -> Result<Self, TransportError> {
        let endpoint = link.name();
        let (reader, writer) = link
            .open()
            .map_err(|source| TransportError::LinkUnavailable {
                path: endpoint.clone(),
                source,
            })?;

        let (fifo, inbox) = crossbeam_channel::unbounded();
        let read_loop = ReadLoop::start(&endpoint, reader, fifo);

        info!(endpoint = %endpoint, "Connected to controller board");

        Ok(Self {
            endpoint,
            writer: Some(writer),
            inbox,
            read_loop: Some(read_loop),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Write one message line
    pub fn send(&mut self, message: Outbound) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::Disconnected)?;
        let line = format!("{}\n", message);
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(TransportError::WriteError)?;
        debug!(message = %message, "Sent to controller board");
        Ok(())
    }

    /// Oldest queued message, waiting at most `timeout`
    ///
    /// Returns `None` on timeout or once disconnected.
    pub fn receive(&self, timeout: Duration) -> Option<Inbound> {
        if !self.is_connected() {
            return None;
        }
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                warn!(endpoint = %self.endpoint, "Link read loop has stopped");
                None
            }
        }
    }

    /// Whether the read loop thread is still feeding the FIFO
    pub fn is_reading(&self) -> bool {
        self.read_loop.as_ref().is_some_and(ReadLoop::is_running)
    }

    /// Number of messages waiting in the FIFO
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Stop the read loop and release the link. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(read_loop) = self.read_loop.take() {
            read_loop.stop();
        }
        if self.writer.take().is_some() {
            let discarded = self.inbox.try_iter().count();
            info!(endpoint = %self.endpoint, discarded, "Disconnected from controller board");
        }
    }
}

impl MessageSink for MessageTransport {
    fn send(&mut self, message: Outbound) -> Result<(), TransportError> {
        MessageTransport::send(self, message)
    }
}

impl Drop for MessageTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
