// SPDX-License-Identifier: GPL-3.0-only

//! Booth session orchestration
//!
//! - [`session`]: Session data model
//! - [`machine`]: State machine turning controller messages into actions
//! - [`controller`]: Poll loop and lifecycle

pub mod controller;
pub mod machine;
pub mod session;

pub use controller::BoothController;
pub use machine::{Capabilities, SessionMachine};
pub use session::{CapturedPhoto, PhotoStrip, ProcessedPhoto, Session, SessionStatus};
