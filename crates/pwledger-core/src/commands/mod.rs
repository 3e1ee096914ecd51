//! Reversible commands
//!
//! Every mutation of an `EntryStore` that the user may undo is expressed as
//! a `Command`. Each variant carries plain data: the request, plus the
//! pre-images it captures on first execution so `undo` restores the exact
//! prior content. A command is all-or-nothing: when `execute` returns an
//! error the store is as it was before the call.
//!
//! Commands are normally run through `TransactionLog::execute`, which adds
//! undo/redo bookkeeping and dirty tracking.

pub mod dependents;
pub mod entries;
pub mod groups;
pub mod multi;
pub mod password;
pub mod policies;

use pwledger_core_types::Sensitive;
use uuid::Uuid;

use crate::backends::AttachmentBackend;
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::errors::Result;
use crate::model::{DependentKind, Entry, FieldType, FieldValue};
use crate::store::EntryStore;

pub use dependents::MoveDependents;
pub use entries::{AddEntry, DeleteEntry, DeletedGraph, EditField, EditRecord};
pub use groups::{EmptyGroupAction, ManageEmptyGroups, RenameGroup};
pub use multi::MultiCommand;
pub use password::{BulkHistoryUpdate, HistoryAction, UpdatePassword};
pub use policies::{ManagePolicies, PolicyAction};

/// Collaborators a command may need while running
pub struct ExecContext<'a> {
    pub config: &'a CoreConfig,
    pub clock: &'a dyn Clock,
    pub attachments: &'a mut dyn AttachmentBackend,
}

/// Observable effect of running a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    /// The store content changed
    pub changed: bool,
    /// Number of entries or groups touched
    pub altered: usize,
}

impl Outcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn touched(altered: usize) -> Self {
        Self {
            changed: altered > 0,
            altered,
        }
    }

    pub(crate) fn absorb(&mut self, other: Outcome) {
        self.changed |= other.changed;
        self.altered += other.altered;
    }
}

/// Command enum covering every reversible operation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert an entry (optionally as a dependent, optionally with an attachment)
    Add(AddEntry),
    /// Remove an entry, cascading through its dependents
    Delete(DeleteEntry),
    /// Replace a whole record
    EditRecord(EditRecord),
    /// Change one field
    EditField(EditField),
    /// Set a new password, feeding the old one into history
    UpdatePassword(UpdatePassword),
    /// Move a group subtree to a new path
    RenameGroup(RenameGroup),
    /// Change history settings across the store
    BulkHistoryUpdate(BulkHistoryUpdate),
    /// Maintain the explicitly created empty groups
    ManageEmptyGroups(ManageEmptyGroups),
    /// Re-point dependents from one base to another
    MoveDependents(MoveDependents),
    /// Add, change or remove a named password policy
    ManagePolicies(ManagePolicies),
    /// Ordered composite, executed and undone as one unit
    Multi(MultiCommand),
}

impl Command {
    // ===== Constructors =====

    pub fn add(entry: Entry) -> Self {
        Command::Add(AddEntry::new(entry, None))
    }

    pub fn add_with_attachment(entry: Entry, bytes: Vec<u8>) -> Self {
        Command::Add(AddEntry::new(entry, Some(bytes)))
    }

    /// Add `entry` as an alias or shortcut of `base`
    pub fn add_dependent(entry: Entry, base: Uuid, kind: DependentKind) -> Self {
        Command::Add(AddEntry::new(entry.into_dependent(base, kind), None))
    }

    pub fn delete(uuid: Uuid) -> Self {
        Command::Delete(DeleteEntry::new(uuid))
    }

    pub fn edit_record(old: Entry, new: Entry) -> Self {
        Command::EditRecord(EditRecord::new(old, new))
    }

    pub fn edit_field(uuid: Uuid, field: FieldType, value: FieldValue) -> Self {
        Command::EditField(EditField::new(uuid, field, value))
    }

    pub fn update_password(uuid: Uuid, password: impl Into<String>) -> Self {
        Command::UpdatePassword(UpdatePassword::new(uuid, Sensitive::new(password.into())))
    }

    pub fn rename_group(old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Command::RenameGroup(RenameGroup::new(old_path.into(), new_path.into()))
    }

    pub fn bulk_history(action: HistoryAction, new_max: usize) -> Self {
        Command::BulkHistoryUpdate(BulkHistoryUpdate::new(action, new_max))
    }

    pub fn empty_groups(action: EmptyGroupAction) -> Self {
        Command::ManageEmptyGroups(ManageEmptyGroups::new(action))
    }

    pub fn move_dependents(from_base: Uuid, to_base: Uuid, kind: DependentKind) -> Self {
        Command::MoveDependents(MoveDependents::new(from_base, to_base, kind))
    }

    pub fn policy(action: PolicyAction) -> Self {
        Command::ManagePolicies(ManagePolicies::new(action))
    }

    pub fn multi(commands: Vec<Command>) -> Self {
        Command::Multi(MultiCommand::new(commands))
    }

    // ===== Dispatch =====

    /// Run the command
    ///
    /// # Errors
    ///
    /// Any `VaultError` from the variant; the store is left unchanged.
    pub fn execute(&mut self, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<Outcome> {
        tracing::debug!(command_kind = self.kind_name(), "execute");
        match self {
            Command::Add(c) => c.execute(store, ctx),
            Command::Delete(c) => c.execute(store, ctx),
            Command::EditRecord(c) => c.execute(store),
            Command::EditField(c) => c.execute(store, ctx),
            Command::UpdatePassword(c) => c.execute(store, ctx),
            Command::RenameGroup(c) => c.execute(store),
            Command::BulkHistoryUpdate(c) => c.execute(store, ctx),
            Command::ManageEmptyGroups(c) => c.execute(store),
            Command::MoveDependents(c) => c.execute(store),
            Command::ManagePolicies(c) => c.execute(store),
            Command::Multi(c) => c.execute(store, ctx),
        }
    }

    /// Reverse a previous successful `execute`
    ///
    /// # Errors
    ///
    /// Only if the store was changed behind the log's back since `execute`.
    pub fn undo(&mut self, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<()> {
        tracing::debug!(command_kind = self.kind_name(), "undo");
        match self {
            Command::Add(c) => c.undo(store, ctx),
            Command::Delete(c) => c.undo(store, ctx),
            Command::EditRecord(c) => c.undo(store),
            Command::EditField(c) => c.undo(store),
            Command::UpdatePassword(c) => c.undo(store),
            Command::RenameGroup(c) => c.undo(store),
            Command::BulkHistoryUpdate(c) => c.undo(store),
            Command::ManageEmptyGroups(c) => c.undo(store),
            Command::MoveDependents(c) => c.undo(store),
            Command::ManagePolicies(c) => c.undo(store),
            Command::Multi(c) => c.undo(store, ctx),
        }
    }

    /// Stable name for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Command::Add(_) => "add",
            Command::Delete(_) => "delete",
            Command::EditRecord(_) => "edit_record",
            Command::EditField(_) => "edit_field",
            Command::UpdatePassword(_) => "update_password",
            Command::RenameGroup(_) => "rename_group",
            Command::BulkHistoryUpdate(_) => "bulk_history_update",
            Command::ManageEmptyGroups(_) => "manage_empty_groups",
            Command::MoveDependents(_) => "move_dependents",
            Command::ManagePolicies(_) => "manage_policies",
            Command::Multi(_) => "multi",
        }
    }
}
