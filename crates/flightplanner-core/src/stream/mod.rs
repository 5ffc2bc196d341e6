// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

//! Incremental plan streaming.
//!
//! The backend streams route planning as blank-line separated blocks:
//!
//! ```text
//! event: progress
//! data: {"phase": "route", "message": "Computing route", "percent": 0.2}
//!
//! event: done
//! data: {"plan": {...}}
//! ```
//!
//! [`frame::FrameDecoder`] cuts the byte stream into blocks, [`event`] turns a
//! block into a typed [`PlanStreamEvent`], and [`session::run_session`] pumps
//! one response body until a terminal event or cancellation.

pub mod event;
pub mod frame;
pub mod session;

pub use event::{parse_block, PlanStreamEvent, ProgressEvent, RawEvent, StreamError};
pub use frame::FrameDecoder;
pub use session::{run_session, PlanStreamHandler, SessionEnd};
