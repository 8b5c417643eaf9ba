// SPDX-License-Identifier: MPL-2.0

//! Capability providers used by the booth
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             Session state machine            │
//! └───────────┬───────────────────────┬──────────┘
//!             │ capture()             │ print()
//! ┌───────────┴──────────┐ ┌──────────┴───────────┐
//! │        Camera        │ │   PrinterDispatch    │
//! │  command / pattern   │ │  lp  ──▶ lpr (once)  │
//! └───────────┬──────────┘ └──────────┬───────────┘
//!             └──── process (bounded) ┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Still capture through an external tool or a test pattern
//! - [`printer`]: Print submission with a single fallback path
//! - [`process`]: Subprocess execution with a deadline

pub mod camera;
pub mod printer;
pub mod process;

pub use camera::{Camera, CommandCamera, TestPatternCamera, camera_from_config};
pub use printer::{CupsBackend, LprBackend, PrintBackend, PrintJob, Printer, PrinterDispatch};
