// SPDX-License-Identifier: GPL-3.0-only

//! One-way status reporting
//!
//! The session state machine reports progress through a [`StatusSink`].
//! Reports never flow back and never fail the caller; a sink that cannot
//! deliver only logs.
//!
//! - [`client`]: HTTP delivery to the booth dashboard
//! - [`metrics`]: Host health snapshot

pub mod client;
pub mod metrics;

pub use client::{BoothIdentity, DashboardClient};
pub use metrics::SystemMetrics;

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

/// One captured photo as reported to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    pub number: u32,
    pub captured_at: DateTime<Local>,
    pub file_size: u64,
    pub file_name: String,
}

/// Outcome of a session that reached printing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub started_at: DateTime<Local>,
    pub photos: Vec<PhotoRecord>,
    pub printed: bool,
    pub printed_at: DateTime<Local>,
    pub print_duration_seconds: f64,
    /// `completed` or `failed`
    pub status: &'static str,
}

/// Status payloads accepted by a sink
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    /// Booth came online
    Registration,
    SessionStarted {
        session_id: Uuid,
        started_at: DateTime<Local>,
    },
    PhotoCaptured(PhotoRecord),
    SessionFinished(SessionRecord),
    Error {
        error_type: &'static str,
        message: String,
    },
    Health(SystemMetrics),
}

impl StatusReport {
    /// Short name for logs
    pub fn label(&self) -> &'static str {
        match self {
            StatusReport::Registration => "registration",
            StatusReport::SessionStarted { .. } => "session-started",
            StatusReport::PhotoCaptured(_) => "photo-captured",
            StatusReport::SessionFinished(_) => "session-finished",
            StatusReport::Error { .. } => "error",
            StatusReport::Health(_) => "health",
        }
    }
}

/// Receiver of status reports
pub trait StatusSink: Send {
    fn report(&self, report: StatusReport);
}

/// Sink used when the dashboard is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn report(&self, report: StatusReport) {
        tracing::trace!(report = report.label(), "Status report dropped (dashboard disabled)");
    }
}
