//! Canonical schema constants for structured logging and events
//!
//! These constants keep field keys consistent between the logging macros,
//! the session boundary and test assertions.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_SESSION_ID: &str = "session_id";

// Entity identifiers
pub const FIELD_ENTRY_UUID: &str = "entry_uuid";
pub const FIELD_BASE_UUID: &str = "base_uuid";
pub const FIELD_GROUP_PATH: &str = "group_path";

// Command / transaction fields
pub const FIELD_COMMAND_KIND: &str = "command_kind";
pub const FIELD_CHANGED: &str = "changed";
pub const FIELD_ALTERED: &str = "altered";

// Collection sizes
pub const FIELD_ENTRY_COUNT: &str = "entry_count";
pub const FIELD_UNDO_DEPTH: &str = "undo_depth";
pub const FIELD_REDO_DEPTH: &str = "redo_depth";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
