//! Password change and password-history commands

use pwledger_core_types::Sensitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ExecContext, Outcome};
use crate::config::HistoryConfig;
use crate::errors::{Result, VaultError};
use crate::model::{Entry, PasswordHistory};
use crate::store::EntryStore;

const SECONDS_PER_DAY: i64 = 86_400;

/// Apply a password change to an entry value
///
/// Pushes the outgoing password (stamped with its pmtime, or ctime when the
/// password was never modified) into history when history is enabled, sets
/// the new password, restamps pmtime and recomputes xtime from the
/// interval. An entry with no history header gets one from `cfg` first when
/// `save_by_default` is set.
///
/// # Errors
///
/// Returns `InvalidInput` for dependents, which borrow their base's password.
pub(crate) fn apply_password_change(
    entry: &mut Entry,
    password: Sensitive<String>,
    now: i64,
    cfg: &HistoryConfig,
) -> Result<()> {
    if entry.is_dependent() {
        return Err(VaultError::InvalidInput {
            reason: format!("{} is a dependent; change its base's password", entry.uuid),
        });
    }

    if entry.history.is_none() && cfg.save_by_default {
        entry.history = Some(PasswordHistory::new(true, cfg.clamp_max(cfg.default_max)));
    }

    let outgoing_at = if entry.pmtime != 0 {
        entry.pmtime
    } else {
        entry.ctime
    };
    if let Some(history) = entry.history.as_mut() {
        let cap = cfg.clamp_max(history.max);
        if cap != history.max {
            history.set_max(cap);
        }
        let evicted = history.push(entry.password.clone(), outgoing_at);
        if !evicted.is_empty() {
            tracing::debug!(entry_uuid = %entry.uuid, evicted = evicted.len(), "history trimmed");
        }
    }

    entry.password = password;
    entry.pmtime = now;
    if entry.xtime_interval != 0 {
        entry.xtime = now + i64::from(entry.xtime_interval) * SECONDS_PER_DAY;
    }
    Ok(())
}

// ===== UpdatePassword =====

/// Set a new password on one entry
///
/// The timestamp is taken once, on first execute, so redo reproduces the
/// same pmtime, xtime and history stamps.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePassword {
    uuid: Uuid,
    password: Sensitive<String>,
    stamped_at: Option<i64>,
    before: Option<Entry>,
}

impl UpdatePassword {
    pub fn new(uuid: Uuid, password: Sensitive<String>) -> Self {
        Self {
            uuid,
            password,
            stamped_at: None,
            before: None,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub(crate) fn execute(
        &mut self,
        store: &mut EntryStore,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Outcome> {
        let before = store.get(self.uuid)?.clone();
        let now = *self.stamped_at.get_or_insert_with(|| ctx.clock.now());

        let mut after = before.clone();
        apply_password_change(&mut after, self.password.clone(), now, &ctx.config.history)?;
        store.replace(after)?;

        self.before = Some(before);
        Ok(Outcome::touched(1))
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore) -> Result<()> {
        let before = self.before.clone().ok_or_else(|| VaultError::Internal {
            message: format!("password update of {} undone before execute", self.uuid),
        })?;
        store.replace(before)?;
        Ok(())
    }
}

// ===== BulkHistoryUpdate =====

/// Store-wide history setting change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryAction {
    /// Turn history off wherever it is on (items are kept)
    StopSaving,
    /// Turn history on: entries without a header get one with the given max,
    /// disabled headers are re-enabled with their own max
    StartSaving,
    /// Change the max of enabled entries whose saved count fits the new max
    SetMax,
}

/// Apply a `HistoryAction` to every non-dependent entry
#[derive(Debug, Clone, PartialEq)]
pub struct BulkHistoryUpdate {
    action: HistoryAction,
    new_max: usize,
    /// Prior history of every entry this command altered, by UUID
    altered: Vec<(Uuid, Option<PasswordHistory>)>,
}

impl BulkHistoryUpdate {
    pub fn new(action: HistoryAction, new_max: usize) -> Self {
        Self {
            action,
            new_max,
            altered: Vec::new(),
        }
    }

    /// UUIDs altered by the last execute
    pub fn altered(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.altered.iter().map(|(uuid, _)| *uuid)
    }

    pub(crate) fn execute(
        &mut self,
        store: &mut EntryStore,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Outcome> {
        let max = ctx.config.history.clamp_max(self.new_max);
        let candidates: Vec<Uuid> = store
            .iter()
            .filter(|e| !e.is_dependent())
            .map(|e| e.uuid)
            .collect();

        let mut altered = Vec::new();
        for uuid in candidates {
            let entry = store.get_mut(uuid)?;
            let prior = entry.history.clone();
            let touched = match self.action {
                HistoryAction::StopSaving => match entry.history.as_mut() {
                    Some(h) if h.enabled => {
                        h.enabled = false;
                        true
                    }
                    _ => false,
                },
                HistoryAction::StartSaving => {
                    if let Some(h) = entry.history.as_mut() {
                        let was_disabled = !h.enabled;
                        h.enabled = true;
                        was_disabled
                    } else {
                        entry.history = Some(PasswordHistory::new(true, max));
                        true
                    }
                }
                HistoryAction::SetMax => match entry.history.as_mut() {
                    Some(h) if h.enabled && h.len() <= max && h.max != max => {
                        h.max = max;
                        true
                    }
                    _ => false,
                },
            };
            if touched {
                altered.push((uuid, prior));
            }
        }

        tracing::debug!(action = ?self.action, max, altered = altered.len(), "bulk history update");
        let count = altered.len();
        self.altered = altered;
        Ok(Outcome::touched(count))
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore) -> Result<()> {
        for (uuid, prior) in &self.altered {
            store.get_mut(*uuid)?.history = prior.clone();
        }
        Ok(())
    }
}
