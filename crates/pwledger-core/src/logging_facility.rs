//! Structured logging facility for pwledger
//!
//! This module provides:
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! Boundary events (start/end/end_error) are emitted only by the session
//! layer. Store, command and merge internals log at debug level.
//!
//! # Usage
//!
//! ```rust
//! use pwledger_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, OpOutcome, TestCapture};
