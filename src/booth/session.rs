// SPDX-License-Identifier: GPL-3.0-only

//! Session data model

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Where the booth is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Active,
    Processing,
    Printing,
    Completed,
    Error,
}

impl SessionStatus {
    /// A new `SESSION_START` is accepted from these states
    pub fn accepts_new_session(self) -> bool {
        matches!(
            self,
            SessionStatus::Idle
                | SessionStatus::Active
                | SessionStatus::Completed
                | SessionStatus::Error
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Active => "active",
            SessionStatus::Processing => "processing",
            SessionStatus::Printing => "printing",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// One stored capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub sequence_number: u32,
    pub storage_location: PathBuf,
    pub captured_at: DateTime<Local>,
}

/// Tone-processed counterpart of a [`CapturedPhoto`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPhoto {
    pub sequence_number: u32,
    pub storage_location: PathBuf,
}

/// The composed, printable artifact of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoStrip {
    pub session_id: Uuid,
    pub storage_location: PathBuf,
    /// Sequence numbers in the order they appear top to bottom
    pub frames: Vec<u32>,
    pub created_at: DateTime<Local>,
}

/// One photo-capture-to-print cycle
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub status: SessionStatus,
    pub expected_photo_count: u32,
    /// Keyed by sequence number; a repeated capture overwrites
    pub captured: BTreeMap<u32, CapturedPhoto>,
    pub started_at: DateTime<Local>,
}

impl Session {
    pub fn new(expected_photo_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Active,
            expected_photo_count,
            captured: BTreeMap::new(),
            started_at: Local::now(),
        }
    }

    /// `sequence` is a valid photo index for this session
    pub fn in_range(&self, sequence: u32) -> bool {
        (1..=self.expected_photo_count).contains(&sequence)
    }

    /// Store a capture, returning the one it replaced
    pub fn record(&mut self, photo: CapturedPhoto) -> Option<CapturedPhoto> {
        self.captured.insert(photo.sequence_number, photo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(sequence_number: u32, name: &str) -> CapturedPhoto {
        CapturedPhoto {
            sequence_number,
            storage_location: PathBuf::from(name),
            captured_at: Local::now(),
        }
    }

    #[test]
    fn test_new_session_is_active_and_empty() {
        let session = Session::new(4);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.captured.is_empty());
        assert!(session.in_range(1) && session.in_range(4));
        assert!(!session.in_range(0) && !session.in_range(5));
    }

    #[test]
    fn test_duplicate_capture_overwrites() {
        let mut session = Session::new(4);
        assert!(session.record(photo(2, "a.jpg")).is_none());
        let replaced = session.record(photo(2, "b.jpg")).unwrap();
        assert_eq!(replaced.storage_location, PathBuf::from("a.jpg"));
        assert_eq!(session.captured.len(), 1);
        assert_eq!(
            session.captured[&2].storage_location,
            PathBuf::from("b.jpg")
        );
    }

    #[test]
    fn test_sequences_are_sorted() {
        let mut session = Session::new(4);
        for n in [3, 1, 4, 2] {
            session.record(photo(n, "x.jpg"));
        }
        let sequences: Vec<u32> = session.captured.keys().copied().collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_new_session_accepted_when_resting() {
        assert!(SessionStatus::Idle.accepts_new_session());
        assert!(SessionStatus::Error.accepts_new_session());
        assert!(!SessionStatus::Processing.accepts_new_session());
    }
}
