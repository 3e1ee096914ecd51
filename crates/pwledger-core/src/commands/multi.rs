//! Composite command

use super::{Command, ExecContext, Outcome};
use crate::errors::{Result, VaultError};
use crate::store::EntryStore;

/// Ordered list of commands treated as a single undoable unit
///
/// Sub-commands run in order. If one fails, those already run are undone in
/// reverse order and the original error is returned, so a failed composite
/// leaves the store untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiCommand {
    commands: Vec<Command>,
}

impl MultiCommand {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub(crate) fn execute(
        &mut self,
        store: &mut EntryStore,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Outcome> {
        let mut outcome = Outcome::unchanged();
        for i in 0..self.commands.len() {
            match self.commands[i].execute(store, ctx) {
                Ok(step) => outcome.absorb(step),
                Err(e) => {
                    tracing::debug!(failed_at = i, "multi command failed, unwinding");
                    for done in self.commands[..i].iter_mut().rev() {
                        if let Err(unwind) = done.undo(store, ctx) {
                            return Err(VaultError::UnwindFailed {
                                message: format!("{} (while unwinding after: {})", unwind, e),
                            });
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(outcome)
    }

    /// Undo every sub-command in reverse order
    ///
    /// If one fails, the sub-commands already undone are run again so the
    /// composite stays fully applied and can be retried.
    pub(crate) fn undo(&mut self, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<()> {
        for i in (0..self.commands.len()).rev() {
            if let Err(e) = self.commands[i].undo(store, ctx) {
                tracing::debug!(failed_at = i, "multi command undo failed, reapplying");
                for undone in self.commands[i + 1..].iter_mut() {
                    if let Err(reapply) = undone.execute(store, ctx) {
                        return Err(VaultError::UnwindFailed {
                            message: format!("{} (while reapplying after: {})", reapply, e),
                        });
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}
