//! Session: one open vault with its undo history and collaborators
//!
//! ## Logging Ownership
//!
//! The session owns lifecycle logging for every public operation:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! The core crate below it uses only `tracing::debug!()` for internal details.

#![allow(clippy::result_large_err)]

use pwledger_core::backends::{AttachmentBackend, MemoryAttachments, PersistenceBackend, ReportSink};
use pwledger_core::clock::{Clock, SystemClock};
use pwledger_core::commands::{Command, ExecContext, Outcome};
use pwledger_core::compare::{self, write_report, CompareOptions, CompareResult, SubgroupFilter};
use pwledger_core::errors::{Result, VaultError};
use pwledger_core::merge::{self, MergeOptions, MergePlan, MergeReport};
use pwledger_core::model::{Entry, FieldSet};
use pwledger_core::store::EntryStore;
use pwledger_core::sync::{self, SyncPlan, SyncReport};
use pwledger_core::txlog::TransactionLog;
use pwledger_core::{log_op_end, log_op_error, log_op_start};
use pwledger_core_types::{SessionId, Sensitive};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::staging::Staged;

/// A single-writer handle on one vault
///
/// Every mutation of the store goes through `execute` (or an operation built
/// on it) so it can be undone. The one exception is `touch_access_time`.
pub struct Session {
    id: SessionId,
    config: EngineConfig,
    store: EntryStore,
    log: TransactionLog,
    clock: Arc<dyn Clock>,
    attachments: Box<dyn AttachmentBackend>,
    backend: Arc<dyn PersistenceBackend>,
    path: Option<PathBuf>,
}

impl Session {
    /// Session with an empty, unsaved store, the system clock and in-memory
    /// attachments
    pub fn new(config: EngineConfig, backend: Arc<dyn PersistenceBackend>) -> Self {
        let mut store = EntryStore::new();
        if let Err(e) = store.initialise_gtu() {
            warn!(error = %e, "empty store failed validation");
        }
        Self {
            id: SessionId::new(),
            config,
            store,
            log: TransactionLog::new(),
            clock: Arc::new(SystemClock),
            attachments: Box::new(MemoryAttachments::new()),
            backend,
            path: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_attachments(mut self, attachments: Box<dyn AttachmentBackend>) -> Self {
        self.attachments = attachments;
        self
    }

    // ===== Accessors =====

    /// Correlation id attached to every boundary log line
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Path of the open vault, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.path.is_some()
    }

    /// Attachment bytes stored for an entry
    ///
    /// # Errors
    ///
    /// `AttachmentNotFound` if nothing is stored.
    pub fn attachment(&self, uuid: Uuid) -> Result<Vec<u8>> {
        self.attachments.get(uuid)
    }

    fn with_context<T>(
        &mut self,
        f: impl FnOnce(&mut TransactionLog, &mut EntryStore, &mut ExecContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut ctx = ExecContext {
            config: &self.config.core,
            clock: self.clock.as_ref(),
            attachments: self.attachments.as_mut(),
        };
        f(&mut self.log, &mut self.store, &mut ctx)
    }

    // ===== Vault lifecycle =====

    /// Lock and load a vault, replacing the session's store
    ///
    /// A vault whose entries are not GTU-unique still opens, but compare,
    /// merge and synchronize refuse it until the duplicates are resolved.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if a vault is already open
    /// - `Locked` if another process holds the vault
    /// - `Authentication`, `Corrupt`, `Io` from the backend (the lock is
    ///   released again)
    pub fn open(&mut self, path: &Path, passphrase: &Sensitive<String>) -> Result<usize> {
        log_op_start!("vault_open", session_id = self.id.as_str(), path = %path.display());
        let start = Instant::now();

        let entry_count = self.open_impl(path, passphrase).map_err(|e| {
            log_op_error!(
                "vault_open",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "vault_open",
            duration_ms = start.elapsed().as_millis() as u64,
            entry_count = entry_count
        );
        Ok(entry_count)
    }

    fn open_impl(&mut self, path: &Path, passphrase: &Sensitive<String>) -> Result<usize> {
        if let Some(open) = &self.path {
            return Err(VaultError::InvalidInput {
                reason: format!("{} is already open", open.display()),
            });
        }

        self.backend.lock(path)?;
        let mut store = match self.backend.load(path, passphrase) {
            Ok(store) => store,
            Err(e) => {
                if let Err(unlock_err) = self.backend.unlock(path) {
                    warn!(error = %unlock_err, "unlock after failed load");
                }
                return Err(e);
            }
        };
        if let Err(e) = store.initialise_gtu() {
            warn!(error = %e, "vault opened with duplicate group/title/user");
        }

        let entry_count = store.count();
        self.store = store;
        self.log.clear_commands();
        self.path = Some(path.to_path_buf());
        Ok(entry_count)
    }

    /// Write the store back to the open vault and clear the dirty flag
    ///
    /// # Errors
    ///
    /// `InvalidInput` if no vault is open, otherwise the backend's error.
    pub fn save(&mut self, passphrase: &Sensitive<String>) -> Result<()> {
        log_op_start!("vault_save", session_id = self.id.as_str());
        let start = Instant::now();

        let result = match self.path.clone() {
            Some(path) => self.save_impl(&path, passphrase),
            None => Err(VaultError::InvalidInput {
                reason: "no vault is open".to_string(),
            }),
        };
        result.map_err(|e| {
            log_op_error!(
                "vault_save",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "vault_save",
            duration_ms = start.elapsed().as_millis() as u64,
            entry_count = self.store.count()
        );
        Ok(())
    }

    /// Save to a new path and make it the session's vault
    ///
    /// The new path is locked before writing; the previous path, if any, is
    /// unlocked afterwards.
    ///
    /// # Errors
    ///
    /// `Locked` if the new path is held elsewhere, otherwise the backend's
    /// error.
    pub fn save_as(&mut self, path: &Path, passphrase: &Sensitive<String>) -> Result<()> {
        log_op_start!("vault_save_as", session_id = self.id.as_str(), path = %path.display());
        let start = Instant::now();

        self.save_as_impl(path, passphrase).map_err(|e| {
            log_op_error!(
                "vault_save_as",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "vault_save_as",
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(())
    }

    fn save_as_impl(&mut self, path: &Path, passphrase: &Sensitive<String>) -> Result<()> {
        if self.path.as_deref() == Some(path) {
            return self.save_impl(path, passphrase);
        }

        self.backend.lock(path)?;
        if let Err(e) = self.save_impl(path, passphrase) {
            if let Err(unlock_err) = self.backend.unlock(path) {
                warn!(error = %unlock_err, "unlock after failed save");
            }
            return Err(e);
        }
        if let Some(previous) = self.path.replace(path.to_path_buf()) {
            self.backend.unlock(&previous)?;
        }
        Ok(())
    }

    fn save_impl(&mut self, path: &Path, passphrase: &Sensitive<String>) -> Result<()> {
        self.backend.save(&self.store, path, passphrase)?;
        self.store.set_dirty(false);
        Ok(())
    }

    /// Drop the store and its history and release the vault lock
    ///
    /// Unsaved changes are discarded.
    ///
    /// # Errors
    ///
    /// The backend's unlock error; the session is closed regardless.
    pub fn close(&mut self) -> Result<()> {
        log_op_start!("vault_close", session_id = self.id.as_str());
        let start = Instant::now();

        let result = self.close_impl();
        result.map_err(|e| {
            log_op_error!(
                "vault_close",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "vault_close",
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(())
    }

    fn close_impl(&mut self) -> Result<()> {
        if self.store.is_dirty() {
            warn!(entry_count = self.store.count(), "closing with unsaved changes");
        }
        self.log.clear_commands();
        self.store = EntryStore::new();
        if let Err(e) = self.store.initialise_gtu() {
            warn!(error = %e, "empty store failed validation");
        }
        match self.path.take() {
            Some(path) => self.backend.unlock(&path),
            None => Ok(()),
        }
    }

    // ===== Commands =====

    /// Run a command through the transaction log
    ///
    /// # Errors
    ///
    /// The command's error; the store is unchanged.
    pub fn execute(&mut self, command: Command) -> Result<Outcome> {
        let kind = command.kind_name();
        log_op_start!("command_execute", session_id = self.id.as_str(), command_kind = kind);
        let start = Instant::now();

        let outcome = self
            .with_context(|log, store, ctx| log.execute(command, store, ctx))
            .map_err(|e| {
                log_op_error!(
                    "command_execute",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    command_kind = kind
                );
                e
            })?;

        log_op_end!(
            "command_execute",
            duration_ms = start.elapsed().as_millis() as u64,
            command_kind = kind,
            altered = outcome.altered
        );
        Ok(outcome)
    }

    /// Reverse the most recent command
    ///
    /// # Errors
    ///
    /// `NothingToUndo` on an empty stack, or the command's undo error.
    pub fn undo(&mut self) -> Result<()> {
        log_op_start!("command_undo", session_id = self.id.as_str());
        let start = Instant::now();

        self.with_context(|log, store, ctx| log.undo(store, ctx))
            .map_err(|e| {
                log_op_error!(
                    "command_undo",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e
            })?;

        log_op_end!(
            "command_undo",
            duration_ms = start.elapsed().as_millis() as u64,
            undo_depth = self.log.undo_depth()
        );
        Ok(())
    }

    /// Re-run the most recently undone command
    ///
    /// # Errors
    ///
    /// `NothingToRedo` on an empty stack, or the command's error.
    pub fn redo(&mut self) -> Result<Outcome> {
        log_op_start!("command_redo", session_id = self.id.as_str());
        let start = Instant::now();

        let outcome = self
            .with_context(|log, store, ctx| log.redo(store, ctx))
            .map_err(|e| {
                log_op_error!(
                    "command_redo",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e
            })?;

        log_op_end!(
            "command_redo",
            duration_ms = start.elapsed().as_millis() as u64,
            redo_depth = self.log.redo_depth()
        );
        Ok(outcome)
    }

    /// Stamp an entry's access time; not undoable
    ///
    /// # Errors
    ///
    /// `EntryNotFound` if absent.
    pub fn touch_access_time(&mut self, uuid: Uuid) -> Result<()> {
        let now = self.clock.now();
        self.store.touch_access_time(uuid, now)
    }

    /// Rebuild the store's group/title/user index
    ///
    /// Compare, merge and synchronize need a validated store. Commands keep
    /// a validated store validated; this is for a store that was opened, or
    /// edited into, a duplicate state once the duplicate is resolved.
    ///
    /// # Errors
    ///
    /// `DuplicateGtu` naming the first clash; the store stays unvalidated.
    pub fn validate_gtu(&mut self) -> Result<()> {
        log_op_start!("vault_validate_gtu", session_id = self.id.as_str());
        let start = Instant::now();

        self.store.initialise_gtu().map_err(|e| {
            log_op_error!(
                "vault_validate_gtu",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "vault_validate_gtu",
            duration_ms = start.elapsed().as_millis() as u64,
            entry_count = self.store.count()
        );
        Ok(())
    }

    // ===== Cross-store operations =====

    /// Compare the session's store with another and write the report
    ///
    /// # Errors
    ///
    /// `GtuNotValidated` if either store is not validated.
    pub fn compare(
        &self,
        other: &EntryStore,
        options: &CompareOptions,
        sink: &mut dyn ReportSink,
    ) -> Result<CompareResult> {
        log_op_start!("vault_compare", session_id = self.id.as_str(), other = other.name());
        let start = Instant::now();

        let result = compare::compare(&self.store, other, options).map_err(|e| {
            log_op_error!(
                "vault_compare",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;
        write_report(&result, self.store.name(), other.name(), sink);

        log_op_end!(
            "vault_compare",
            duration_ms = start.elapsed().as_millis() as u64,
            conflicts = result.conflicts.len(),
            identical = result.identical.len()
        );
        Ok(result)
    }

    /// Import entries from `source` as one undoable step
    ///
    /// # Errors
    ///
    /// `GtuNotValidated` if either store is not validated, or the command's
    /// error (nothing is imported).
    pub fn merge(
        &mut self,
        source: &EntryStore,
        options: &MergeOptions,
        sink: &mut dyn ReportSink,
    ) -> Result<MergeReport> {
        log_op_start!("vault_merge", session_id = self.id.as_str(), source = source.name());
        let start = Instant::now();

        let report = self.merge_impl(source, options, sink).map_err(|e| {
            log_op_error!(
                "vault_merge",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "vault_merge",
            duration_ms = start.elapsed().as_millis() as u64,
            imported = report.total_imported()
        );
        Ok(report)
    }

    fn merge_impl(
        &mut self,
        source: &EntryStore,
        options: &MergeOptions,
        sink: &mut dyn ReportSink,
    ) -> Result<MergeReport> {
        let MergePlan { command, report } = merge::merge(
            &self.store,
            source,
            options,
            &self.config.core,
            self.clock.as_ref(),
            sink,
        )?;
        if report.total_imported() > 0 {
            self.with_context(|log, store, ctx| log.execute(command, store, ctx))?;
        }
        Ok(report)
    }

    /// Copy `fields` from GTU-matched `source` entries as one undoable step
    ///
    /// # Errors
    ///
    /// `GtuNotValidated` if either store is not validated, or the command's
    /// error (nothing is changed).
    pub fn synchronize(
        &mut self,
        source: &EntryStore,
        fields: FieldSet,
        filter: Option<&SubgroupFilter>,
        sink: &mut dyn ReportSink,
    ) -> Result<SyncReport> {
        log_op_start!("vault_synchronize", session_id = self.id.as_str(), source = source.name());
        let start = Instant::now();

        let result = sync::synchronize(&self.store, source, fields, filter, sink).and_then(
            |SyncPlan { command, report }| {
                if report.updated_count() > 0 {
                    self.with_context(|log, store, ctx| log.execute(command, store, ctx))?;
                }
                Ok(report)
            },
        );
        let report = result.map_err(|e| {
            log_op_error!(
                "vault_synchronize",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "vault_synchronize",
            duration_ms = start.elapsed().as_millis() as u64,
            updated = report.updated_count()
        );
        Ok(report)
    }

    // ===== Staged I/O =====

    /// Load another vault off-thread and validate it for merging
    ///
    /// Must be called from within a tokio runtime.
    pub fn stage_import(&self, path: &Path, passphrase: &Sensitive<String>) -> Staged<EntryStore> {
        let backend = Arc::clone(&self.backend);
        let path = path.to_path_buf();
        let passphrase = passphrase.clone();
        Staged::spawn("vault_import_load", move || {
            let mut store = backend.load(&path, &passphrase)?;
            store.initialise_gtu()?;
            Ok(store)
        })
    }

    /// Read an attachment file off-thread
    ///
    /// Must be called from within a tokio runtime.
    pub fn stage_attachment(&self, path: &Path) -> Staged<Vec<u8>> {
        let path = path.to_path_buf();
        Staged::spawn("attachment_read", move || Ok(std::fs::read(&path)?))
    }

    /// Load `path` in the background, then merge it as one undoable step
    ///
    /// Nothing is committed unless the load succeeds.
    ///
    /// # Errors
    ///
    /// The load error (`Authentication`, `Corrupt`, `Io`, `DuplicateGtu`,
    /// `Cancelled`) or any `merge` error.
    pub async fn import(
        &mut self,
        path: &Path,
        passphrase: &Sensitive<String>,
        options: &MergeOptions,
        sink: &mut dyn ReportSink,
    ) -> Result<MergeReport> {
        log_op_start!("vault_import", session_id = self.id.as_str(), path = %path.display());
        let start = Instant::now();

        let staged = self.stage_import(path, passphrase);
        let result = match staged.wait().await {
            Ok(source) => self.merge_impl(&source, options, sink),
            Err(e) => Err(e),
        };
        let report = result.map_err(|e| {
            log_op_error!(
                "vault_import",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "vault_import",
            duration_ms = start.elapsed().as_millis() as u64,
            imported = report.total_imported()
        );
        Ok(report)
    }

    /// Read an attachment file in the background, then add `entry` with it
    ///
    /// Nothing is committed unless the read succeeds.
    ///
    /// # Errors
    ///
    /// `Io` or `Cancelled` from the read, or the add command's error.
    pub async fn add_entry_with_attachment(
        &mut self,
        entry: Entry,
        attachment_path: &Path,
    ) -> Result<Outcome> {
        log_op_start!("attachment_add", session_id = self.id.as_str(), entry_uuid = %entry.uuid);
        let start = Instant::now();

        let staged = self.stage_attachment(attachment_path);
        let result = match staged.wait().await {
            Ok(bytes) => self.with_context(|log, store, ctx| {
                log.execute(Command::add_with_attachment(entry, bytes), store, ctx)
            }),
            Err(e) => Err(e),
        };
        let outcome = result.map_err(|e| {
            log_op_error!(
                "attachment_add",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "attachment_add",
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(outcome)
    }
}
