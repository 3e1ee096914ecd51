//! pwledger core - in-memory credential store with reversible commands
//!
//! This crate provides:
//! - The entry model (fields, entry types, password history)
//! - `EntryStore`: UUID-keyed entries, base/dependent links, GTU uniqueness
//! - Reversible `Command`s and the undo/redo `TransactionLog`
//! - Compare, merge and synchronize between two stores
//! - Trait seams for persistence, attachments and reporting
//!
//! Nothing here performs I/O; hosts plug backends in through `backends`.

pub mod backends;
pub mod clock;
pub mod commands;
pub mod compare;
pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod merge;
pub mod model;
pub mod store;
pub mod sync;
pub mod txlog;

// Re-export commonly used types
pub use backends::{AttachmentBackend, MemoryAttachments, PersistenceBackend, ReportSink, VecReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use commands::{Command, ExecContext, Outcome};
pub use compare::{compare, CompareOptions, CompareResult};
pub use config::CoreConfig;
pub use errors::{ExError, ExErrorKind, Result, VaultError};
pub use merge::{merge, MergeOptions, MergePlan, MergeReport};
pub use model::{Entry, EntryType, FieldSet, FieldType};
pub use store::EntryStore;
pub use sync::{synchronize, SyncPlan, SyncReport};
pub use txlog::TransactionLog;
