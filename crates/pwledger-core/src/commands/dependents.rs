//! Re-pointing dependents between bases

use uuid::Uuid;

use super::Outcome;
use crate::errors::{Result, VaultError};
use crate::model::DependentKind;
use crate::store::EntryStore;

/// Move every dependent of `kind` from one base to another
///
/// The source base reverts to Normal once it has no dependents left and the
/// target is promoted; both follow from the store's link bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveDependents {
    from_base: Uuid,
    to_base: Uuid,
    kind: DependentKind,
    moved: Vec<Uuid>,
}

impl MoveDependents {
    pub fn new(from_base: Uuid, to_base: Uuid, kind: DependentKind) -> Self {
        Self {
            from_base,
            to_base,
            kind,
            moved: Vec::new(),
        }
    }

    pub fn moved(&self) -> &[Uuid] {
        &self.moved
    }

    fn repoint(store: &mut EntryStore, uuids: &[Uuid], base: Uuid) -> Result<()> {
        for uuid in uuids {
            let mut entry = store.get(*uuid)?.clone();
            entry.base_uuid = Some(base);
            store.replace(entry)?;
        }
        Ok(())
    }

    pub(crate) fn execute(&mut self, store: &mut EntryStore) -> Result<Outcome> {
        if self.from_base == self.to_base {
            return Err(VaultError::InvalidInput {
                reason: "source and target base are the same entry".to_string(),
            });
        }
        store.get(self.from_base)?;
        store.get(self.to_base)?;

        let moving = store.dependents(self.from_base, self.kind);
        if moving.is_empty() {
            self.moved.clear();
            return Ok(Outcome::unchanged());
        }

        // The first re-point validates the target; nothing has moved if it fails.
        let mut done = Vec::with_capacity(moving.len());
        for uuid in &moving {
            if let Err(e) = Self::repoint(store, std::slice::from_ref(uuid), self.to_base) {
                Self::repoint(store, &done, self.from_base)?;
                return Err(e);
            }
            done.push(*uuid);
        }

        tracing::debug!(
            base_uuid = %self.from_base,
            to_base = %self.to_base,
            moved = done.len(),
            "move dependents"
        );
        let count = done.len();
        self.moved = done;
        Ok(Outcome::touched(count))
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore) -> Result<()> {
        Self::repoint(store, &self.moved, self.from_base)
    }
}
