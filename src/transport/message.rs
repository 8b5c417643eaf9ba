// SPDX-License-Identifier: GPL-3.0-only

//! Line protocol spoken with the controller board
//!
//! Every message is one newline-terminated, case-sensitive line.

use std::fmt;

/// Message received from the controller board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `SESSION_START`
    SessionStart,
    /// `CAPTURE_<n>`, n >= 1
    Capture(u32),
    /// `ALL_CAPTURED`
    AllCaptured,
    /// `ABORT`
    Abort,
    /// `ERROR` reported by the board
    Error,
    /// Anything else; kept so it can be logged as a protocol violation
    Unrecognized(String),
}

impl Inbound {
    /// Decode one line. Surrounding whitespace (including `\r`) is ignored.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "SESSION_START" => Inbound::SessionStart,
            "ALL_CAPTURED" => Inbound::AllCaptured,
            "ABORT" => Inbound::Abort,
            "ERROR" => Inbound::Error,
            _ => line
                .strip_prefix("CAPTURE_")
                .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|&n| n > 0)
                .map(Inbound::Capture)
                .unwrap_or_else(|| Inbound::Unrecognized(line.to_string())),
        }
    }
}

impl fmt::Display for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inbound::SessionStart => write!(f, "SESSION_START"),
            Inbound::Capture(n) => write!(f, "CAPTURE_{}", n),
            Inbound::AllCaptured => write!(f, "ALL_CAPTURED"),
            Inbound::Abort => write!(f, "ABORT"),
            Inbound::Error => write!(f, "ERROR"),
            Inbound::Unrecognized(line) => write!(f, "{}", line),
        }
    }
}

/// Message sent to the controller board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    /// Booth initialised
    Ready,
    /// Photo `n` captured
    CaptureAck(u32),
    /// Strip composed, print submission starting
    Printing,
    /// Strip handed to the printer
    Complete,
    /// Session failed
    Error,
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outbound::Ready => write!(f, "READY"),
            Outbound::CaptureAck(n) => write!(f, "CAPTURE_ACK_{}", n),
            Outbound::Printing => write!(f, "PRINTING"),
            Outbound::Complete => write!(f, "COMPLETE"),
            Outbound::Error => write!(f, "ERROR"),
        }
    }
}

/// Destination for outbound messages
///
/// Implemented by the transport; tests record into a `Vec`.
pub trait MessageSink {
    fn send(&mut self, message: Outbound) -> Result<(), crate::errors::TransportError>;
}

impl MessageSink for Vec<Outbound> {
    fn send(&mut self, message: Outbound) -> Result<(), crate::errors::TransportError> {
        self.push(message);
        Ok(())
    }
}
