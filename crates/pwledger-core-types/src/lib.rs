//! Core types shared across pwledger facilities
//!
//! This crate provides foundational types used by the error, logging and
//! session layers:
//!
//! - **Correlation types**: SessionId, OperationId
//! - **Sensitive data**: Sensitive<T> marker for automatic redaction
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::{OperationId, SessionId};
pub use sensitive::Sensitive;
