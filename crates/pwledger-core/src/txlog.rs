//! Undo/redo bookkeeping for one store

use crate::commands::{Command, ExecContext, Outcome};
use crate::errors::{Result, VaultError};
use crate::store::EntryStore;

/// A command that ran, with the store flags seen just before it ran
#[derive(Debug, Clone, PartialEq)]
struct Recorded {
    command: Command,
    dirty_before: bool,
    gtu_validated_before: bool,
}

/// Undo and redo stacks for a single `EntryStore`
///
/// The log never owns the store; the caller passes the same store to every
/// call. Not thread-safe.
#[derive(Debug, Clone, Default)]
pub struct TransactionLog {
    undo: Vec<Recorded>,
    redo: Vec<Recorded>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a command and record it for undo
    ///
    /// Clears the redo stack. A command that reports no change leaves the
    /// dirty flag as it was. A store that was GTU-validated before the
    /// command is re-validated after it.
    ///
    /// # Errors
    ///
    /// The command's error; nothing is recorded and the store is unchanged.
    pub fn execute(
        &mut self,
        mut command: Command,
        store: &mut EntryStore,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Outcome> {
        let dirty_before = store.is_dirty();
        let gtu_validated_before = store.is_gtu_validated();

        let outcome = command.execute(store, ctx)?;
        if outcome.changed {
            store.mark_dirty();
        }
        revalidate(store, gtu_validated_before, "execute");

        self.undo.push(Recorded {
            command,
            dirty_before,
            gtu_validated_before,
        });
        self.redo.clear();
        tracing::debug!(
            undo_depth = self.undo.len(),
            changed = outcome.changed,
            altered = outcome.altered,
            "command recorded"
        );
        Ok(outcome)
    }

    /// Reverse the most recent command
    ///
    /// Restores the dirty flag and, when the store was GTU-validated before
    /// the command, re-validates it.
    ///
    /// # Errors
    ///
    /// `NothingToUndo` on an empty stack, or the command's undo error (the
    /// command stays on the undo stack, except after `UnwindFailed`, which
    /// drops it).
    pub fn undo(&mut self, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<()> {
        let mut recorded = self.undo.pop().ok_or(VaultError::NothingToUndo)?;

        if let Err(e) = recorded.command.undo(store, ctx) {
            if matches!(e, VaultError::UnwindFailed { .. }) {
                tracing::warn!(
                    command_kind = recorded.command.kind_name(),
                    error = %e,
                    "command dropped from undo history"
                );
            } else {
                self.undo.push(recorded);
            }
            return Err(e);
        }

        store.set_dirty(recorded.dirty_before);
        revalidate(store, recorded.gtu_validated_before, "undo");
        self.redo.push(recorded);
        Ok(())
    }

    /// Re-run the most recently undone command
    ///
    /// # Errors
    ///
    /// `NothingToRedo` on an empty stack, or the command's error (the command
    /// stays on the redo stack).
    pub fn redo(&mut self, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<Outcome> {
        let mut recorded = self.redo.pop().ok_or(VaultError::NothingToRedo)?;

        recorded.dirty_before = store.is_dirty();
        recorded.gtu_validated_before = store.is_gtu_validated();
        let outcome = match recorded.command.execute(store, ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.redo.push(recorded);
                return Err(e);
            }
        };
        if outcome.changed {
            store.mark_dirty();
        }
        revalidate(store, recorded.gtu_validated_before, "redo");
        self.undo.push(recorded);
        Ok(outcome)
    }

    /// Drop both stacks without running anything
    pub fn clear_commands(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn any_to_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn any_to_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Kind of the command `undo` would reverse next
    pub fn peek_undo(&self) -> Option<&'static str> {
        self.undo.last().map(|r| r.command.kind_name())
    }
}

/// Rebuild the GTU index a command invalidated
///
/// A duplicate leaves the store unvalidated; compare, merge and synchronize
/// refuse it until the caller resolves the clash.
fn revalidate(store: &mut EntryStore, was_validated: bool, step: &'static str) {
    if was_validated && !store.is_gtu_validated() {
        if let Err(e) = store.initialise_gtu() {
            tracing::warn!(step, error = %e, "store no longer GTU-unique");
        }
    }
}
