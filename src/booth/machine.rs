// SPDX-License-Identifier: GPL-3.0-only

//! Session state machine
//!
//! ```text
//!            SESSION_START
//!   Idle ─────────────────▶ Active ──CAPTURE_N──▶ Active (+ CAPTURE_ACK_N)
//!    ▲                        │
//!    │ ABORT                  │ ALL_CAPTURED
//!    │                        ▼
//!    │                    Processing ──▶ Printing ──▶ Completed (+ COMPLETE)
//!    │                        │              │
//!    │                        └──────┬───────┘
//!    │                               ▼
//!    └────────────────────────── Error (+ ERROR)
//! ```
//!
//! Completed and Error are resting states; the next `SESSION_START` begins a
//! fresh session from either. Out-of-state and unrecognised messages are
//! protocol violations: logged, never answered, and they change nothing.
//!
//! All work happens synchronously inside [`SessionMachine::handle`] on the
//! caller's thread. Messages that arrive meanwhile wait in the transport FIFO.

use super::session::{PhotoStrip, Session, SessionStatus};
use crate::backends::camera::Camera;
use crate::backends::printer::Printer;
use crate::config::BoothConfig;
use crate::dashboard::{PhotoRecord, SessionRecord, StatusReport, StatusSink};
use crate::errors::BoothError;
use crate::pipelines::strip::{StripPipeline, capture_photo};
use crate::transport::{Inbound, MessageSink, Outbound};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// External collaborators driven by the machine
pub struct Capabilities {
    pub camera: Box<dyn Camera>,
    pub printer: Box<dyn Printer>,
    pub status: Box<dyn StatusSink>,
}

pub struct SessionMachine {
    photo_count: u32,
    capture_timeout: Duration,
    photos_to_keep: usize,
    pipeline: StripPipeline,
    camera: Box<dyn Camera>,
    printer: Box<dyn Printer>,
    status_sink: Box<dyn StatusSink>,
    status: SessionStatus,
    session: Option<Session>,
    last_strip: Option<PhotoStrip>,
}

impl SessionMachine {
    pub fn new(config: &BoothConfig, pipeline: StripPipeline, capabilities: Capabilities) -> Self {
        Self {
            photo_count: config.session.photo_count,
            capture_timeout: config.session.capture_timeout(),
            photos_to_keep: config.storage.photos_to_keep,
            pipeline,
            camera: capabilities.camera,
            printer: capabilities.printer,
            status_sink: capabilities.status,
            status: SessionStatus::Idle,
            session: None,
            last_strip: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The live session, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Strip of the most recent completed session
    pub fn last_strip(&self) -> Option<&PhotoStrip> {
        self.last_strip.as_ref()
    }

    pub fn status_sink(&self) -> &dyn StatusSink {
        self.status_sink.as_ref()
    }

    /// Apply one inbound message, emitting replies to `out`
    pub fn handle(&mut self, message: Inbound, out: &mut dyn MessageSink) {
        debug!(message = %message, status = %self.status, "Handling message");

        match message {
            Inbound::SessionStart => self.start_session(),
            Inbound::Capture(sequence) => self.capture(sequence, out),
            Inbound::AllCaptured => self.finish_session(out),
            Inbound::Abort => self.abort(),
            Inbound::Error => self.external_error(),
            Inbound::Unrecognized(line) => {
                self.violation(format!("unrecognised message {:?}", line));
            }
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            info!(from = %self.status, to = %status, "Session transition");
        }
        self.status = status;
        if let Some(session) = self.session.as_mut() {
            session.status = status;
        }
    }

    fn violation(&self, detail: String) {
        let err = BoothError::ProtocolViolation(detail);
        warn!(status = %self.status, error = %err, "Ignoring message");
    }

    fn emit(&self, out: &mut dyn MessageSink, message: Outbound) {
        if let Err(e) = out.send(message) {
            error!(message = %message, error = %e, "Failed to send to controller board");
        }
    }

    fn start_session(&mut self) {
        if !self.status.accepts_new_session() {
            self.violation(format!("SESSION_START while {}", self.status));
            return;
        }
        if let Some(previous) = self.session.take() {
            if previous.status == SessionStatus::Active {
                info!(
                    session_id = %previous.id,
                    captured = previous.captured.len(),
                    "Discarding incomplete session"
                );
            }
        }

        let session = Session::new(self.photo_count);
        info!(session_id = %session.id, photos = self.photo_count, "Session started");
        self.status_sink.report(StatusReport::SessionStarted {
            session_id: session.id,
            started_at: session.started_at,
        });
        self.session = Some(session);
        self.set_status(SessionStatus::Active);
    }

    fn capture(&mut self, sequence: u32, out: &mut dyn MessageSink) {
        if self.status != SessionStatus::Active {
            self.violation(format!("CAPTURE_{} while {}", sequence, self.status));
            return;
        }
        let Some(session) = self.session.as_ref() else {
            self.violation(format!("CAPTURE_{} without a session", sequence));
            return;
        };
        if !session.in_range(sequence) {
            self.violation(format!(
                "CAPTURE_{} outside 1..={}",
                sequence, session.expected_photo_count
            ));
            return;
        }

        let result = capture_photo(
            self.camera.as_mut(),
            self.pipeline.dirs(),
            sequence,
            self.capture_timeout,
        );

        match result {
            Ok(photo) => {
                let record = photo_record(&photo);
                if let Some(session) = self.session.as_mut() {
                    if let Some(replaced) = session.record(photo) {
                        debug!(sequence, replaced = %replaced.storage_location.display(), "Photo retaken");
                    }
                }
                self.emit(out, Outbound::CaptureAck(sequence));
                self.status_sink.report(StatusReport::PhotoCaptured(record));
            }
            Err(e) => self.fail(e.into(), out),
        }
    }

    fn finish_session(&mut self, out: &mut dyn MessageSink) {
        if self.status != SessionStatus::Active {
            self.violation(format!("ALL_CAPTURED while {}", self.status));
            return;
        }
        self.set_status(SessionStatus::Processing);

        let result = match self.session.as_ref() {
            Some(session) => self.pipeline.run(
                session.id,
                session.captured.values(),
                session.expected_photo_count,
            ),
            None => Err(BoothError::ProtocolViolation(
                "ALL_CAPTURED without a session".into(),
            )),
        };
        let strip = match result {
            Ok(strip) => strip,
            Err(e) => {
                self.fail(e, out);
                return;
            }
        };

        self.set_status(SessionStatus::Printing);
        self.emit(out, Outbound::Printing);

        let print_started = Instant::now();
        let printed = self.printer.print(&strip.storage_location);
        self.report_finished(printed.is_ok(), print_started.elapsed());

        match printed {
            Ok(()) => {
                self.emit(out, Outbound::Complete);
                self.set_status(SessionStatus::Completed);
                self.retain(&strip);
                self.last_strip = Some(strip);
            }
            Err(e) => self.fail(e.into(), out),
        }
    }

    fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session_id = %session.id, captured = session.captured.len(), "Session aborted");
        }
        self.set_status(SessionStatus::Idle);
    }

    fn external_error(&mut self) {
        warn!(status = %self.status, "Controller board reported an error");
        self.session = None;
        self.set_status(SessionStatus::Error);
        self.status_sink.report(StatusReport::Error {
            error_type: "controller",
            message: "controller board reported ERROR".into(),
        });
    }

    /// Session-scoped failure: report, answer `ERROR`, rest in Error
    fn fail(&mut self, err: BoothError, out: &mut dyn MessageSink) {
        error!(
            kind = err.kind(),
            error = %err,
            session_id = ?self.session.as_ref().map(|s| s.id),
            "Session failed"
        );
        self.status_sink.report(StatusReport::Error {
            error_type: err.kind(),
            message: err.to_string(),
        });
        self.emit(out, Outbound::Error);
        self.set_status(SessionStatus::Error);
    }

    fn report_finished(&self, printed: bool, print_duration: Duration) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        self.status_sink
            .report(StatusReport::SessionFinished(SessionRecord {
                session_id: session.id,
                started_at: session.started_at,
                photos: session.captured.values().map(photo_record).collect(),
                printed,
                printed_at: chrono::Local::now(),
                print_duration_seconds: print_duration.as_secs_f64(),
                status: if printed { "completed" } else { "failed" },
            }));
    }

    /// Archive the printed strip and apply the retention limit
    fn retain(&self, strip: &PhotoStrip) {
        let dirs = self.pipeline.dirs();
        match dirs.archive(&strip.storage_location) {
            Ok(path) => debug!(path = %path.display(), "Strip archived"),
            Err(e) => warn!(error = %e, "Failed to archive strip"),
        }
        dirs.prune(self.photos_to_keep);
    }
}

fn photo_record(photo: &super::session::CapturedPhoto) -> PhotoRecord {
    let location = &photo.storage_location;
    PhotoRecord {
        number: photo.sequence_number,
        captured_at: photo.captured_at,
        file_size: std::fs::metadata(location).map(|m| m.len()).unwrap_or(0),
        file_name: location
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::TestPatternCamera;
    use crate::errors::{CaptureError, PrintError, SubmitError};
    use crate::storage::BoothDirs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    struct Prints(Arc<Mutex<Vec<std::path::PathBuf>>>);

    impl Printer for Prints {
        fn print(&mut self, strip: &Path) -> Result<(), PrintError> {
            self.0.lock().unwrap().push(strip.to_path_buf());
            Ok(())
        }
    }

    struct Jammed;

    impl Printer for Jammed {
        fn print(&mut self, _strip: &Path) -> Result<(), PrintError> {
            Err(PrintError::Primary(SubmitError::Failed {
                backend: "cups",
                reason: "paper jam".into(),
            }))
        }
    }

    #[derive(Default, Clone)]
    struct Recorded(Arc<Mutex<Vec<StatusReport>>>);

    impl StatusSink for Recorded {
        fn report(&self, report: StatusReport) {
            self.0.lock().unwrap().push(report);
        }
    }

    /// Fails the capture whose 1-based call index matches
    struct FlakyCamera {
        inner: TestPatternCamera,
        calls: u32,
        fail_on: u32,
    }

    impl Camera for FlakyCamera {
        fn capture(&mut self, timeout: Duration) -> Result<Vec<u8>, CaptureError> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(CaptureError::Timeout(timeout));
            }
            self.inner.capture(timeout)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn machine(
        base: &Path,
        camera: Box<dyn Camera>,
        printer: Box<dyn Printer>,
        status: Recorded,
    ) -> SessionMachine {
        let config = BoothConfig::default();
        let dirs = BoothDirs::new(base);
        dirs.ensure().unwrap();
        SessionMachine::new(
            &config,
            StripPipeline::from_config(&config, dirs),
            Capabilities {
                camera,
                printer,
                status: Box::new(status),
            },
        )
    }

    fn pattern() -> Box<dyn Camera> {
        Box::new(TestPatternCamera::new(320, 240, [120, 80, 40]))
    }

    #[test]
    fn test_full_session() {
        let temp = tempfile::tempdir().unwrap();
        let printed = Arc::new(Mutex::new(Vec::new()));
        let status = Recorded::default();
        let mut m = machine(temp.path(), pattern(), Box::new(Prints(printed.clone())), status.clone());
        let mut out = Vec::new();

        m.handle(Inbound::SessionStart, &mut out);
        for n in 1..=4 {
            m.handle(Inbound::Capture(n), &mut out);
        }
        m.handle(Inbound::AllCaptured, &mut out);

        assert_eq!(
            out,
            vec![
                Outbound::CaptureAck(1),
                Outbound::CaptureAck(2),
                Outbound::CaptureAck(3),
                Outbound::CaptureAck(4),
                Outbound::Printing,
                Outbound::Complete,
            ]
        );
        assert_eq!(m.status(), SessionStatus::Completed);
        assert_eq!(m.last_strip().unwrap().frames, vec![1, 2, 3, 4]);
        assert_eq!(printed.lock().unwrap().len(), 1);

        let reports = status.0.lock().unwrap();
        assert!(matches!(
            reports.last(),
            Some(StatusReport::SessionFinished(SessionRecord { printed: true, .. }))
        ));
    }

    #[test]
    fn test_out_of_state_messages_are_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let mut m = machine(temp.path(), pattern(), Box::new(Jammed), Recorded::default());
        let mut out = Vec::new();

        m.handle(Inbound::Capture(1), &mut out);
        m.handle(Inbound::AllCaptured, &mut out);
        m.handle(Inbound::Unrecognized("HELLO".into()), &mut out);

        assert!(out.is_empty());
        assert_eq!(m.status(), SessionStatus::Idle);
        assert!(m.session().is_none());
    }

    #[test]
    fn test_out_of_range_capture_is_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let mut m = machine(temp.path(), pattern(), Box::new(Jammed), Recorded::default());
        let mut out = Vec::new();

        m.handle(Inbound::SessionStart, &mut out);
        m.handle(Inbound::Capture(5), &mut out);

        assert!(out.is_empty());
        assert_eq!(m.status(), SessionStatus::Active);
        assert!(m.session().unwrap().captured.is_empty());
    }

    #[test]
    fn test_capture_failure_rests_in_error() {
        let temp = tempfile::tempdir().unwrap();
        let camera = Box::new(FlakyCamera {
            inner: TestPatternCamera::new(64, 64, [0, 0, 0]),
            calls: 0,
            fail_on: 3,
        });
        let status = Recorded::default();
        let mut m = machine(temp.path(), camera, Box::new(Jammed), status.clone());
        let mut out = Vec::new();

        m.handle(Inbound::SessionStart, &mut out);
        for n in 1..=3 {
            m.handle(Inbound::Capture(n), &mut out);
        }
        assert_eq!(
            out,
            vec![Outbound::CaptureAck(1), Outbound::CaptureAck(2), Outbound::Error]
        );
        assert_eq!(m.status(), SessionStatus::Error);

        m.handle(Inbound::Capture(4), &mut out);
        m.handle(Inbound::AllCaptured, &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(m.status(), SessionStatus::Error);

        assert!(status.0.lock().unwrap().iter().any(|r| matches!(
            r,
            StatusReport::Error {
                error_type: "camera",
                ..
            }
        )));
    }

    #[test]
    fn test_print_failure() {
        let temp = tempfile::tempdir().unwrap();
        let mut m = machine(temp.path(), pattern(), Box::new(Jammed), Recorded::default());
        let mut out = Vec::new();

        m.handle(Inbound::SessionStart, &mut out);
        for n in 1..=4 {
            m.handle(Inbound::Capture(n), &mut out);
        }
        m.handle(Inbound::AllCaptured, &mut out);

        assert_eq!(&out[4..], &[Outbound::Printing, Outbound::Error]);
        assert_eq!(m.status(), SessionStatus::Error);
        assert!(m.last_strip().is_none());
    }

    #[test]
    fn test_abort_and_external_error() {
        let temp = tempfile::tempdir().unwrap();
        let mut m = machine(temp.path(), pattern(), Box::new(Jammed), Recorded::default());
        let mut out = Vec::new();

        m.handle(Inbound::SessionStart, &mut out);
        m.handle(Inbound::Capture(1), &mut out);
        m.handle(Inbound::Abort, &mut out);
        assert_eq!(m.status(), SessionStatus::Idle);
        assert!(m.session().is_none());

        m.handle(Inbound::SessionStart, &mut out);
        m.handle(Inbound::Error, &mut out);
        assert_eq!(m.status(), SessionStatus::Error);
        assert!(m.session().is_none());
        assert_eq!(out, vec![Outbound::CaptureAck(1)]);
    }
}
