// SPDX-License-Identifier: MPL-2.0

//! Photo Booth - unattended photo booth controller
//!
//! Receives session signals from a controller board over a serial link,
//! captures a fixed number of photos, turns them into a black & white strip
//! and prints it, reporting progress back over the same link.
//!
//! # Architecture
//!
//! ```text
//! link ─▶ read loop ─▶ FIFO ─▶ controller loop ─▶ session machine
//!                                                   │
//!                        camera ◀── capture ◀───────┤
//!                 tone ─▶ compose ◀── pipeline ◀────┤
//!                       lp / lpr ◀── printer ◀──────┤
//!                  dashboard ◀── status sink ◀──────┘
//! ```
//!
//! - [`transport`]: Line protocol, serial link and read loop
//! - [`booth`]: Session model, state machine and controller loop
//! - [`pipelines`]: Capture storage, tone processing and strip composition
//! - [`backends`]: Camera and printer capability providers
//! - [`dashboard`]: One-way status reporting
//! - [`config`]: TOML configuration
//! - [`storage`]: Working directories and retention

pub mod backends;
pub mod booth;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod errors;
pub mod pipelines;
pub mod storage;
pub mod transport;

// Re-export commonly used types
pub use booth::{BoothController, SessionMachine, SessionStatus};
pub use config::BoothConfig;
pub use errors::{BoothError, BoothResult};
pub use transport::{Inbound, MessageTransport, Outbound};
