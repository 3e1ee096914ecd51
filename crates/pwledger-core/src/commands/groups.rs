//! Group commands: subtree rename and empty-group maintenance

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Outcome;
use crate::errors::{Result, VaultError};
use crate::store::{in_group, EntryStore};

/// Rebase `path` from `old` to `new` if it lies in the `old` subtree
fn rebase(path: &str, old: &str, new: &str) -> Option<String> {
    if path == old {
        Some(new.to_string())
    } else if in_group(path, old) {
        Some(format!("{}{}", new, &path[old.len()..]))
    } else {
        None
    }
}

// ===== RenameGroup =====

/// Rename a group and every group below it
///
/// Undo uses the recorded UUID → prior-group pairs rather than renaming
/// back, so entries that already sat under `new_path` before the rename are
/// left where they were.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameGroup {
    old_path: String,
    new_path: String,
    renamed: Vec<(Uuid, String)>,
    prior_empty_groups: Option<Vec<String>>,
}

impl RenameGroup {
    pub fn new(old_path: String, new_path: String) -> Self {
        Self {
            old_path,
            new_path,
            renamed: Vec::new(),
            prior_empty_groups: None,
        }
    }

    /// Entries moved by the last execute, with their prior groups
    pub fn renamed(&self) -> &[(Uuid, String)] {
        &self.renamed
    }

    pub(crate) fn execute(&mut self, store: &mut EntryStore) -> Result<Outcome> {
        if self.old_path.is_empty() {
            return Err(VaultError::InvalidInput {
                reason: "cannot rename the root group".to_string(),
            });
        }
        if self.old_path == self.new_path {
            return Ok(Outcome::unchanged());
        }

        let moves: Vec<(Uuid, String, String)> = store
            .iter()
            .filter_map(|e| {
                rebase(&e.group, &self.old_path, &self.new_path)
                    .map(|g| (e.uuid, e.group.clone(), g))
            })
            .collect();

        let mut renamed = Vec::with_capacity(moves.len());
        for (uuid, prior, next) in moves {
            store.get_mut(uuid)?.group = next;
            renamed.push((uuid, prior));
        }
        if !renamed.is_empty() {
            store.invalidate_gtu();
        }

        let groups: Vec<String> = store
            .empty_groups()
            .iter()
            .map(|g| rebase(g, &self.old_path, &self.new_path).unwrap_or_else(|| g.clone()))
            .collect();
        let empty_changed = groups.as_slice() != store.empty_groups();
        let prior = store.replace_empty_groups(groups);

        tracing::debug!(
            group_path = %self.old_path,
            new_path = %self.new_path,
            entries = renamed.len(),
            "rename group"
        );
        let count = renamed.len();
        self.renamed = renamed;
        self.prior_empty_groups = Some(prior);
        Ok(Outcome {
            changed: count > 0 || empty_changed,
            altered: count,
        })
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore) -> Result<()> {
        for (uuid, prior) in &self.renamed {
            store.get_mut(*uuid)?.group = prior.clone();
        }
        if !self.renamed.is_empty() {
            store.invalidate_gtu();
        }
        if let Some(prior) = self.prior_empty_groups.take() {
            store.replace_empty_groups(prior);
        }
        Ok(())
    }
}

// ===== ManageEmptyGroups =====

/// Change to the set of explicitly created empty groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyGroupAction {
    Add(String),
    Remove(String),
    Rename { from: String, to: String },
    /// Add every listed group not already present
    AddAll(Vec<String>),
    /// Replace the whole set
    ReplaceAll(Vec<String>),
    /// Rebase every empty group under `from` onto `to`
    RenamePath { from: String, to: String },
}

/// Reversible edit of the empty-group set
#[derive(Debug, Clone, PartialEq)]
pub struct ManageEmptyGroups {
    action: EmptyGroupAction,
    prior: Option<Vec<String>>,
}

impl ManageEmptyGroups {
    pub fn new(action: EmptyGroupAction) -> Self {
        Self {
            action,
            prior: None,
        }
    }

    fn next_groups(&self, current: &[String]) -> Result<Vec<String>> {
        let mut groups = current.to_vec();
        let has = |g: &str| current.iter().any(|c| c == g);

        match &self.action {
            EmptyGroupAction::Add(path) => {
                if path.is_empty() {
                    return Err(VaultError::InvalidInput {
                        reason: "empty group path".to_string(),
                    });
                }
                if has(path) {
                    return Err(VaultError::EmptyGroupExists { path: path.clone() });
                }
                groups.push(path.clone());
            }
            EmptyGroupAction::Remove(path) => {
                if !has(path) {
                    return Err(VaultError::EmptyGroupNotFound { path: path.clone() });
                }
                groups.retain(|g| g != path);
            }
            EmptyGroupAction::Rename { from, to } => {
                if !has(from) {
                    return Err(VaultError::EmptyGroupNotFound { path: from.clone() });
                }
                if from != to && has(to) {
                    return Err(VaultError::EmptyGroupExists { path: to.clone() });
                }
                for g in groups.iter_mut().filter(|g| *g == from) {
                    *g = to.clone();
                }
            }
            EmptyGroupAction::AddAll(paths) => {
                for p in paths {
                    if !p.is_empty() && !groups.contains(p) {
                        groups.push(p.clone());
                    }
                }
            }
            EmptyGroupAction::ReplaceAll(paths) => {
                groups.clear();
                for p in paths {
                    if !p.is_empty() && !groups.contains(p) {
                        groups.push(p.clone());
                    }
                }
            }
            EmptyGroupAction::RenamePath { from, to } => {
                for g in groups.iter_mut() {
                    if let Some(next) = rebase(g, from, to) {
                        *g = next;
                    }
                }
            }
        }
        Ok(groups)
    }

    pub(crate) fn execute(&mut self, store: &mut EntryStore) -> Result<Outcome> {
        let next = self.next_groups(store.empty_groups())?;
        if next.as_slice() == store.empty_groups() {
            self.prior = Some(next);
            return Ok(Outcome::unchanged());
        }
        let altered = next.len().abs_diff(store.empty_groups().len()).max(1);
        self.prior = Some(store.replace_empty_groups(next));
        Ok(Outcome::touched(altered))
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore) -> Result<()> {
        let prior = self.prior.take().ok_or_else(|| VaultError::Internal {
            message: "empty-group change undone before execute".to_string(),
        })?;
        store.replace_empty_groups(prior);
        Ok(())
    }
}
