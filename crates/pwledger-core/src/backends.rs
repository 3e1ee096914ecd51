//! External collaborator seams
//!
//! The core never touches disk formats, encryption or blob storage itself.
//! It talks to these traits; hosts plug in real implementations and tests use
//! the in-memory ones defined here.

use pwledger_core_types::Sensitive;
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

use crate::errors::{Result, VaultError};
use crate::store::EntryStore;

/// Loads and saves whole stores, and arbitrates advisory file locks
pub trait PersistenceBackend: Send + Sync {
    /// # Errors
    ///
    /// `Authentication` for a wrong passphrase, `Corrupt` for unreadable
    /// content, `Io` for filesystem failures.
    fn load(&self, path: &Path, passphrase: &Sensitive<String>) -> Result<EntryStore>;

    /// # Errors
    ///
    /// `Io` or `Serialization` on failure; the previous file must survive.
    fn save(&self, store: &EntryStore, path: &Path, passphrase: &Sensitive<String>)
        -> Result<()>;

    /// Take the advisory lock on `path`
    ///
    /// # Errors
    ///
    /// `Locked { holder }` naming the current locker.
    fn lock(&self, path: &Path) -> Result<()>;

    /// # Errors
    ///
    /// `LockNotHeld` if this process does not hold the lock.
    fn unlock(&self, path: &Path) -> Result<()>;
}

/// Blob storage for entry attachments, keyed by entry UUID
pub trait AttachmentBackend: Send {
    /// Store (or overwrite) the attachment; returns the reference recorded on
    /// the entry
    ///
    /// # Errors
    ///
    /// Backend-specific I/O failures.
    fn put(&mut self, uuid: Uuid, bytes: &[u8]) -> Result<String>;

    /// # Errors
    ///
    /// `AttachmentNotFound` if nothing is stored for `uuid`.
    fn get(&self, uuid: Uuid) -> Result<Vec<u8>>;

    /// Deleting a missing attachment is not an error
    ///
    /// # Errors
    ///
    /// Backend-specific I/O failures.
    fn delete(&mut self, uuid: Uuid) -> Result<()>;
}

/// Append-only audit sink for compare/merge/synchronize/import reports
pub trait ReportSink: Send {
    fn write_line(&mut self, line: &str);
}

/// Content-addressed reference for attachment bytes
pub fn attachment_ref(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("sha256:{}", hex::encode(digest))
}

/// Attachment backend held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryAttachments {
    blobs: HashMap<Uuid, Vec<u8>>,
}

impl MemoryAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn contains(&self, uuid: Uuid) -> bool {
        self.blobs.contains_key(&uuid)
    }
}

impl AttachmentBackend for MemoryAttachments {
    fn put(&mut self, uuid: Uuid, bytes: &[u8]) -> Result<String> {
        self.blobs.insert(uuid, bytes.to_vec());
        Ok(attachment_ref(bytes))
    }

    fn get(&self, uuid: Uuid) -> Result<Vec<u8>> {
        self.blobs
            .get(&uuid)
            .cloned()
            .ok_or_else(|| VaultError::AttachmentNotFound {
                uuid: uuid.to_string(),
            })
    }

    fn delete(&mut self, uuid: Uuid) -> Result<()> {
        if self.blobs.remove(&uuid).is_none() {
            tracing::debug!(entry_uuid = %uuid, "attachment delete: nothing stored");
        }
        Ok(())
    }
}

/// Report sink collecting lines in memory
#[derive(Debug, Default, Clone)]
pub struct VecReport {
    pub lines: Vec<String>,
}

impl VecReport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for VecReport {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Report sink that forwards each line to tracing at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReport;

impl ReportSink for TracingReport {
    fn write_line(&mut self, line: &str) {
        tracing::info!(report_line = line);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_attachments_roundtrip() {
        let mut backend = MemoryAttachments::new();
        let uuid = Uuid::new_v4();

        let r = backend.put(uuid, b"blob").unwrap();

        assert!(r.starts_with("sha256:"));
        assert_eq!(backend.get(uuid).unwrap(), b"blob");
        backend.delete(uuid).unwrap();
        assert!(matches!(
            backend.get(uuid),
            Err(VaultError::AttachmentNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_missing_attachment_is_ok() {
        let mut backend = MemoryAttachments::new();
        assert!(backend.delete(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_attachment_ref_is_content_addressed() {
        assert_eq!(attachment_ref(b"x"), attachment_ref(b"x"));
        assert_ne!(attachment_ref(b"x"), attachment_ref(b"y"));
    }
}
