use thiserror::Error;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code used for programmatic handling,
/// for log assertions (`err_code`) and by host applications deciding how to
/// present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Caller-logic errors (abort only the attempted command)
    InvalidInput,
    DuplicateUuid,
    EntryNotFound,
    NotFound,
    AlreadyExists,

    // Store consistency
    DuplicateGtu,
    ReferentialIntegrity,
    CapacityExceeded,

    // Transaction log
    NothingToUndo,
    NothingToRedo,

    // Backends
    AttachmentNotFound,
    Authentication,
    Corrupt,
    Io,
    Locked,
    Serialization,
    Config,
    Cancelled,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::DuplicateUuid => "ERR_DUPLICATE_UUID",
            ExErrorKind::EntryNotFound => "ERR_ENTRY_NOT_FOUND",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::DuplicateGtu => "ERR_DUPLICATE_GTU",
            ExErrorKind::ReferentialIntegrity => "ERR_REFERENTIAL_INTEGRITY",
            ExErrorKind::CapacityExceeded => "ERR_CAPACITY_EXCEEDED",
            ExErrorKind::NothingToUndo => "ERR_NOTHING_TO_UNDO",
            ExErrorKind::NothingToRedo => "ERR_NOTHING_TO_REDO",
            ExErrorKind::AttachmentNotFound => "ERR_ATTACHMENT_NOT_FOUND",
            ExErrorKind::Authentication => "ERR_AUTHENTICATION",
            ExErrorKind::Corrupt => "ERR_CORRUPT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Locked => "ERR_LOCKED",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification plus context, built with the `with_*` methods.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context (entry UUID, group path, file path)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for vault operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    // ===== Caller-logic errors =====
    /// An entry with this UUID is already in the store
    #[error("Duplicate entry UUID: {uuid}")]
    DuplicateUuid { uuid: String },

    /// No live entry has this UUID
    #[error("Entry not found: {uuid}")]
    EntryNotFound { uuid: String },

    /// Input rejected before touching the store
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Empty group already registered
    #[error("Empty group already exists: {path}")]
    EmptyGroupExists { path: String },

    /// Empty group not registered
    #[error("Empty group not found: {path}")]
    EmptyGroupNotFound { path: String },

    // ===== Store consistency =====
    /// Two entries share the same group/title/user triple
    #[error("Duplicate group/title/user: [{group}] [{title}] [{user}]")]
    DuplicateGtu {
        group: String,
        title: String,
        user: String,
    },

    /// The store's GTU index was never built or has been invalidated
    #[error("Store '{store}' has not been validated for group/title/user uniqueness")]
    GtuNotValidated { store: String },

    /// A dependent references a missing or wrong-typed base
    #[error("Referential integrity violation on {uuid} (base {base_uuid}): {reason}")]
    ReferentialIntegrity {
        uuid: String,
        base_uuid: String,
        reason: String,
    },

    /// A base cannot be removed while dependents still point at it
    #[error("Entry {uuid} still has {count} dependents")]
    BaseHasDependents { uuid: String, count: usize },

    /// History max beyond the hard cap
    #[error("History capacity {requested} exceeds maximum {max}")]
    CapacityExceeded { requested: usize, max: usize },

    // ===== Transaction log =====
    /// Undo stack is empty
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Redo stack is empty
    #[error("Nothing to redo")]
    NothingToRedo,

    // ===== Backends =====
    /// Attachment backend has nothing stored for this entry
    #[error("Attachment not found for entry {uuid}")]
    AttachmentNotFound { uuid: String },

    /// Wrong passphrase
    #[error("Authentication failed for {path}")]
    Authentication { path: String },

    /// Backend content is unreadable
    #[error("Corrupt vault {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// I/O failure
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Advisory lock is held by someone else
    #[error("{path} is locked by {holder}")]
    Locked { path: String, holder: String },

    /// Unlock of a lock this process does not hold
    #[error("No lock held on {path}")]
    LockNotHeld { path: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Staged operation was abandoned before completing
    #[error("Operation cancelled: {op}")]
    Cancelled { op: String },

    // ===== Internal =====
    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A composite command failed and could not fully unwind
    #[error("Unwind failed after child failure: {message}")]
    UnwindFailed { message: String },

    /// Internal error (should never happen)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VaultError {
    /// Short-hand for `EntryNotFound`
    pub fn not_found(uuid: impl std::fmt::Display) -> Self {
        VaultError::EntryNotFound {
            uuid: uuid.to_string(),
        }
    }

    /// Canonical kind for this error
    pub fn kind(&self) -> ExErrorKind {
        ExError::from(self.clone()).kind()
    }
}

/// Conversion from VaultError to ExError
impl From<VaultError> for ExError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::DuplicateUuid { uuid } => ExError::new(ExErrorKind::DuplicateUuid)
                .with_entity_id(uuid)
                .with_message("Entry UUID already present"),

            VaultError::EntryNotFound { uuid } => ExError::new(ExErrorKind::EntryNotFound)
                .with_entity_id(uuid)
                .with_message("Entry not found"),

            VaultError::InvalidInput { reason } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(reason)
            }

            VaultError::EmptyGroupExists { path } => ExError::new(ExErrorKind::AlreadyExists)
                .with_entity_id(path)
                .with_message("Empty group already exists"),

            VaultError::EmptyGroupNotFound { path } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(path)
                .with_message("Empty group not found"),

            VaultError::DuplicateGtu { group, title, user } => {
                ExError::new(ExErrorKind::DuplicateGtu).with_message(format!(
                    "Duplicate group/title/user: [{}] [{}] [{}]",
                    group, title, user
                ))
            }

            VaultError::GtuNotValidated { store } => ExError::new(ExErrorKind::DuplicateGtu)
                .with_entity_id(store)
                .with_message("Store not validated for group/title/user uniqueness"),

            VaultError::ReferentialIntegrity {
                uuid,
                base_uuid,
                reason,
            } => ExError::new(ExErrorKind::ReferentialIntegrity)
                .with_entity_id(uuid)
                .with_message(format!("Base {}: {}", base_uuid, reason)),

            VaultError::BaseHasDependents { uuid, count } => {
                ExError::new(ExErrorKind::ReferentialIntegrity)
                    .with_entity_id(uuid)
                    .with_message(format!("Still has {} dependents", count))
            }

            VaultError::CapacityExceeded { requested, max } => {
                ExError::new(ExErrorKind::CapacityExceeded)
                    .with_message(format!("Requested {} exceeds maximum {}", requested, max))
            }

            VaultError::NothingToUndo => {
                ExError::new(ExErrorKind::NothingToUndo).with_message("Undo stack is empty")
            }

            VaultError::NothingToRedo => {
                ExError::new(ExErrorKind::NothingToRedo).with_message("Redo stack is empty")
            }

            VaultError::AttachmentNotFound { uuid } => {
                ExError::new(ExErrorKind::AttachmentNotFound)
                    .with_entity_id(uuid)
                    .with_message("Attachment not found")
            }

            VaultError::Authentication { path } => ExError::new(ExErrorKind::Authentication)
                .with_entity_id(path)
                .with_message("Passphrase rejected"),

            VaultError::Corrupt { path, reason } => ExError::new(ExErrorKind::Corrupt)
                .with_entity_id(path)
                .with_message(reason),

            VaultError::Io { message } => ExError::new(ExErrorKind::Io).with_message(message),

            VaultError::Locked { path, holder } => ExError::new(ExErrorKind::Locked)
                .with_entity_id(path)
                .with_message(format!("Locked by {}", holder)),

            VaultError::LockNotHeld { path } => ExError::new(ExErrorKind::Locked)
                .with_entity_id(path)
                .with_message("No lock held"),

            VaultError::Config { message } => {
                ExError::new(ExErrorKind::Config).with_message(message)
            }

            VaultError::Cancelled { op } => ExError::new(ExErrorKind::Cancelled)
                .with_op(op)
                .with_message("Operation cancelled before commit"),

            VaultError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            VaultError::UnwindFailed { message } => ExError::new(ExErrorKind::Internal)
                .with_op("multi_command_unwind")
                .with_message(message),

            VaultError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to VaultError
impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Conversion from std::io::Error to VaultError
impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Io {
            message: err.to_string(),
        }
    }
}
