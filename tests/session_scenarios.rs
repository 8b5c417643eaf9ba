// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end session scenarios over an in-memory serial link

use photobooth::backends::camera::{Camera, TestPatternCamera};
use photobooth::backends::printer::{PrintBackend, PrintJob, Printer, PrinterDispatch};
use photobooth::booth::{BoothController, Capabilities, SessionMachine, SessionStatus};
use photobooth::config::{BoothConfig, PrinterConfig};
use photobooth::dashboard::NullSink;
use photobooth::errors::{CaptureError, SubmitError};
use photobooth::pipelines::strip::StripPipeline;
use photobooth::storage::BoothDirs;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Print backend with a fixed outcome, counting submissions
struct FixedBackend {
    name: &'static str,
    available: bool,
    submissions: Arc<AtomicUsize>,
}

impl PrintBackend for FixedBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn submit(&self, _file: &Path, _job: &PrintJob) -> Result<(), SubmitError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if self.available {
            Ok(())
        } else {
            Err(SubmitError::Unavailable {
                backend: self.name,
                reason: "no printers found".into(),
            })
        }
    }
}

/// Camera failing on one specific call
struct FailsOnCall {
    call: u32,
    fail_on: u32,
}

impl Camera for FailsOnCall {
    fn capture(&mut self, timeout: Duration) -> Result<Vec<u8>, CaptureError> {
        self.call += 1;
        if self.call == self.fail_on {
            return Err(CaptureError::Timeout(timeout));
        }
        TestPatternCamera::new(160, 120, [200, 200, 200]).capture(timeout)
    }

    fn name(&self) -> &str {
        "fails-on-call"
    }
}

struct Harness {
    booth: BoothController,
    board: UnixStream,
    lines: BufReader<UnixStream>,
    dirs: BoothDirs,
    _temp: tempfile::TempDir,
}

impl Harness {
    fn new(camera: Box<dyn Camera>, printer: Box<dyn Printer>) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let mut config = BoothConfig::default();
        config.session.poll_interval_ms = 10;
        config.storage.base_dir = Some(temp.path().to_path_buf());

        let dirs = BoothDirs::new(temp.path());
        dirs.ensure().unwrap();
        let machine = SessionMachine::new(
            &config,
            StripPipeline::from_config(&config, dirs.clone()),
            Capabilities {
                camera,
                printer,
                status: Box::new(NullSink),
            },
        );

        let (ours, board) = UnixStream::pair().unwrap();
        board
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let mut booth = BoothController::new(&config, machine);
        booth.initialize(ours).unwrap();

        let lines = BufReader::new(board.try_clone().unwrap());
        Self {
            booth,
            board,
            lines,
            dirs,
            _temp: temp,
        }
    }

    fn with_printer(printer: Box<dyn Printer>) -> Self {
        Self::new(Box::new(TestPatternCamera::new(640, 480, [90, 90, 90])), printer)
    }

    /// Write lines as the controller board would
    fn board_says(&mut self, lines: &[&str]) {
        for line in lines {
            writeln!(self.board, "{}", line).unwrap();
        }
    }

    /// Poll until `count` messages have been handled
    fn process(&mut self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut handled = 0;
        while handled < count {
            assert!(Instant::now() < deadline, "timed out waiting for messages");
            if self.booth.poll_once().unwrap() {
                handled += 1;
            }
        }
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.lines.read_line(&mut line).unwrap();
        line.trim_end().to_string()
    }

    fn strips(&self) -> usize {
        std::fs::read_dir(&self.dirs.output).unwrap().count()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.booth.shutdown();
    }
}

fn dispatch(primary_available: bool, fallback_available: bool) -> (PrinterDispatch, Arc<AtomicUsize>) {
    let fallback_submissions = Arc::new(AtomicUsize::new(0));
    let dispatch = PrinterDispatch::new(
        Box::new(FixedBackend {
            name: "cups",
            available: primary_available,
            submissions: Arc::new(AtomicUsize::new(0)),
        }),
        Box::new(FixedBackend {
            name: "lpr",
            available: fallback_available,
            submissions: fallback_submissions.clone(),
        }),
        &PrinterConfig::default(),
    );
    (dispatch, fallback_submissions)
}

#[test]
fn test_four_photo_session() {
    let (printer, _) = dispatch(true, true);
    let mut h = Harness::with_printer(Box::new(printer));
    assert_eq!(h.read_line(), "READY");

    h.board_says(&[
        "SESSION_START",
        "CAPTURE_1",
        "CAPTURE_2",
        "CAPTURE_3",
        "CAPTURE_4",
        "ALL_CAPTURED",
    ]);
    h.process(6);

    let replies: Vec<String> = (0..6).map(|_| h.read_line()).collect();
    assert_eq!(
        replies,
        vec![
            "CAPTURE_ACK_1",
            "CAPTURE_ACK_2",
            "CAPTURE_ACK_3",
            "CAPTURE_ACK_4",
            "PRINTING",
            "COMPLETE"
        ]
    );
    assert_eq!(h.booth.status(), SessionStatus::Completed);
    assert_eq!(h.strips(), 1);

    let strip = h.booth.machine().last_strip().unwrap();
    assert_eq!(strip.frames, vec![1, 2, 3, 4]);
    let decoded = image::open(&strip.storage_location).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (600, 1220));
    assert!(h.dirs.archive.join(strip.storage_location.file_name().unwrap()).is_file());
}

#[test]
fn test_capture_failure_blocks_completion() {
    let (printer, _) = dispatch(true, true);
    let camera = Box::new(FailsOnCall { call: 0, fail_on: 3 });
    let mut h = Harness::new(camera, Box::new(printer));
    assert_eq!(h.read_line(), "READY");

    h.board_says(&["SESSION_START", "CAPTURE_1", "CAPTURE_2", "CAPTURE_3"]);
    h.process(4);
    assert_eq!(h.read_line(), "CAPTURE_ACK_1");
    assert_eq!(h.read_line(), "CAPTURE_ACK_2");
    assert_eq!(h.read_line(), "ERROR");
    assert_eq!(h.booth.status(), SessionStatus::Error);

    // Ignored until the next SESSION_START
    h.board_says(&["CAPTURE_4", "ALL_CAPTURED"]);
    h.process(2);
    assert_eq!(h.booth.status(), SessionStatus::Error);
    assert_eq!(h.strips(), 0);

    h.board_says(&["SESSION_START", "CAPTURE_1"]);
    h.process(2);
    assert_eq!(h.read_line(), "CAPTURE_ACK_1");
    assert_eq!(h.booth.status(), SessionStatus::Active);
}

#[test]
fn test_unavailable_printer_uses_fallback() {
    let (printer, fallback_submissions) = dispatch(false, true);
    let mut h = Harness::with_printer(Box::new(printer));
    assert_eq!(h.read_line(), "READY");

    h.board_says(&["SESSION_START", "CAPTURE_1", "CAPTURE_2", "CAPTURE_3", "CAPTURE_4", "ALL_CAPTURED"]);
    h.process(6);

    let replies: Vec<String> = (0..6).map(|_| h.read_line()).collect();
    assert_eq!(&replies[4..], &["PRINTING", "COMPLETE"]);
    assert_eq!(fallback_submissions.load(Ordering::SeqCst), 1);
    assert_eq!(h.booth.status(), SessionStatus::Completed);
}

#[test]
fn test_no_printer_at_all_is_an_error() {
    let (printer, fallback_submissions) = dispatch(false, false);
    let mut h = Harness::with_printer(Box::new(printer));
    assert_eq!(h.read_line(), "READY");

    h.board_says(&["SESSION_START", "CAPTURE_1", "CAPTURE_2", "CAPTURE_3", "CAPTURE_4", "ALL_CAPTURED"]);
    h.process(6);

    let replies: Vec<String> = (0..6).map(|_| h.read_line()).collect();
    assert_eq!(&replies[4..], &["PRINTING", "ERROR"]);
    assert_eq!(fallback_submissions.load(Ordering::SeqCst), 1);
    assert_eq!(h.booth.status(), SessionStatus::Error);
}

#[test]
fn test_gap_in_captures_yields_error() {
    let (printer, _) = dispatch(true, true);
    let mut h = Harness::with_printer(Box::new(printer));
    assert_eq!(h.read_line(), "READY");

    h.board_says(&["SESSION_START", "CAPTURE_1", "CAPTURE_2", "CAPTURE_4", "ALL_CAPTURED"]);
    h.process(5);

    let replies: Vec<String> = (0..4).map(|_| h.read_line()).collect();
    assert_eq!(replies, vec!["CAPTURE_ACK_1", "CAPTURE_ACK_2", "CAPTURE_ACK_4", "ERROR"]);
    assert_eq!(h.booth.status(), SessionStatus::Error);
    assert_eq!(h.strips(), 0);
}

#[test]
fn test_stray_messages_are_silent() {
    let (printer, _) = dispatch(true, true);
    let mut h = Harness::with_printer(Box::new(printer));
    assert_eq!(h.read_line(), "READY");

    h.board_says(&["CAPTURE_1", "ALL_CAPTURED", "capture_1", "HELLO", "SESSION_START", "CAPTURE_9"]);
    h.process(6);
    assert_eq!(h.booth.status(), SessionStatus::Active);
    assert!(h.booth.machine().session().unwrap().captured.is_empty());

    // The next reply on the wire is the ack for this capture, nothing earlier
    h.board_says(&["CAPTURE_2"]);
    h.process(1);
    assert_eq!(h.read_line(), "CAPTURE_ACK_2");
}

#[test]
fn test_new_session_discards_previous_captures() {
    let (printer, _) = dispatch(true, true);
    let mut h = Harness::with_printer(Box::new(printer));
    assert_eq!(h.read_line(), "READY");

    h.board_says(&["SESSION_START", "CAPTURE_1", "CAPTURE_2"]);
    h.process(3);
    let first_id = h.booth.machine().session().unwrap().id;

    h.board_says(&["SESSION_START"]);
    h.process(1);
    let session = h.booth.machine().session().unwrap();
    assert_ne!(session.id, first_id);
    assert!(session.captured.is_empty());
    assert_eq!(h.booth.status(), SessionStatus::Active);
}

#[test]
fn test_retaken_photo_overwrites() {
    let (printer, _) = dispatch(true, true);
    let mut h = Harness::with_printer(Box::new(printer));
    assert_eq!(h.read_line(), "READY");

    h.board_says(&["SESSION_START", "CAPTURE_2", "CAPTURE_1", "CAPTURE_2", "CAPTURE_4", "CAPTURE_3", "ALL_CAPTURED"]);
    h.process(7);

    let replies: Vec<String> = (0..7).map(|_| h.read_line()).collect();
    assert_eq!(replies.last().map(String::as_str), Some("COMPLETE"));
    assert_eq!(h.booth.machine().last_strip().unwrap().frames, vec![1, 2, 3, 4]);
}
