// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines
//!
//! - [`strip`]: capture storage, B&W tone processing and strip composition

pub mod strip;
