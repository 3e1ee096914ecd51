use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::model::{DependentKind, EntryType};

/// Index of base → dependent links
///
/// The authoritative link lives on the dependent (`Entry::base_uuid`); this
/// index is the reverse direction, kept in step by `EntryStore` so a base's
/// dependents can be found without scanning. Sets are ordered so cascades
/// visit dependents deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyResolver {
    aliases: BTreeMap<Uuid, BTreeSet<Uuid>>,
    shortcuts: BTreeMap<Uuid, BTreeSet<Uuid>>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: DependentKind) -> &BTreeMap<Uuid, BTreeSet<Uuid>> {
        match kind {
            DependentKind::Alias => &self.aliases,
            DependentKind::Shortcut => &self.shortcuts,
        }
    }

    fn map_mut(&mut self, kind: DependentKind) -> &mut BTreeMap<Uuid, BTreeSet<Uuid>> {
        match kind {
            DependentKind::Alias => &mut self.aliases,
            DependentKind::Shortcut => &mut self.shortcuts,
        }
    }

    /// Record `dependent` under `base`
    pub fn link(&mut self, base: Uuid, dependent: Uuid, kind: DependentKind) {
        self.map_mut(kind).entry(base).or_default().insert(dependent);
    }

    /// Drop one link; returns how many dependents of `kind` the base still has
    pub fn unlink(&mut self, base: Uuid, dependent: Uuid, kind: DependentKind) -> usize {
        let map = self.map_mut(kind);
        let remaining = match map.get_mut(&base) {
            Some(set) => {
                set.remove(&dependent);
                set.len()
            }
            None => 0,
        };
        if remaining == 0 {
            map.remove(&base);
        }
        remaining
    }

    /// Dependents of `kind`, ordered by UUID
    pub fn dependents(&self, base: Uuid, kind: DependentKind) -> Vec<Uuid> {
        self.map(kind)
            .get(&base)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, base: Uuid, kind: DependentKind) -> usize {
        self.map(kind).get(&base).map_or(0, BTreeSet::len)
    }

    /// Dependents of either kind
    pub fn total(&self, base: Uuid) -> usize {
        self.count(base, DependentKind::Alias) + self.count(base, DependentKind::Shortcut)
    }

    /// Type a non-dependent entry must carry given its current dependents
    pub fn derived_type(&self, base: Uuid) -> EntryType {
        if self.count(base, DependentKind::Alias) > 0 {
            EntryType::AliasBase
        } else if self.count(base, DependentKind::Shortcut) > 0 {
            EntryType::ShortcutBase
        } else {
            EntryType::Normal
        }
    }
}
