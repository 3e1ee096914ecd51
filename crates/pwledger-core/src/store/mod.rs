//! In-memory entry store
//!
//! One flat UUID-keyed map holds every entry. Base/dependent relationships
//! are UUID fields resolved through the store, with `DependencyResolver`
//! keeping the reverse index. Not thread-safe: a store has a single writer.

pub mod resolver;

use pwledger_core_types::Sensitive;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::errors::{Result, VaultError};
use crate::model::{DependentKind, Entry, EntryType, Gtu, GtuKey};
pub use resolver::DependencyResolver;

/// Store content, independent of caches and flags
///
/// Used to assert exact round-trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// Entries ordered by UUID
    pub entries: Vec<Entry>,
    pub empty_groups: Vec<String>,
    pub policies: BTreeMap<String, String>,
}

/// Keyed entry collection with GTU lookup and a dirty flag
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    name: String,
    pub(crate) entries: HashMap<Uuid, Entry>,
    resolver: DependencyResolver,
    /// Present only while the store is known to be GTU-unique
    gtu_index: Option<HashMap<GtuKey, Uuid>>,
    empty_groups: Vec<String>,
    /// Named password policies: name → encoded policy
    policies: BTreeMap<String, String>,
    dirty: bool,
}

impl EntryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::with_name("current")
    }

    /// Create an empty store with a label used in error context
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a store from loaded entries
    ///
    /// Non-dependents are inserted before dependents so every link resolves.
    /// The result is clean (not dirty) and not yet GTU-validated.
    ///
    /// # Errors
    ///
    /// Returns the first `insert` failure (`DuplicateUuid`,
    /// `ReferentialIntegrity`).
    pub fn from_entries(
        name: impl Into<String>,
        entries: Vec<Entry>,
        empty_groups: Vec<String>,
    ) -> Result<Self> {
        let mut store = Self::with_name(name);
        let (dependents, others): (Vec<Entry>, Vec<Entry>) =
            entries.into_iter().partition(Entry::is_dependent);
        for entry in others.into_iter().chain(dependents) {
            store.insert(entry)?;
        }
        store.empty_groups = empty_groups;
        store.dirty = false;
        Ok(store)
    }

    /// Attach the named policies loaded alongside the entries
    pub fn with_policies(mut self, policies: BTreeMap<String, String>) -> Self {
        self.policies = policies;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ===== Lookup =====

    /// Get an entry by UUID
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if no entry has this UUID.
    pub fn get(&self, uuid: Uuid) -> Result<&Entry> {
        self.entries
            .get(&uuid)
            .ok_or_else(|| VaultError::not_found(uuid))
    }

    /// Mutable access for commands
    ///
    /// Callers must not change `uuid`, `entry_type` or `base_uuid`, and must
    /// call `invalidate_gtu` if they change group, title or user.
    pub(crate) fn get_mut(&mut self, uuid: Uuid) -> Result<&mut Entry> {
        self.entries
            .get_mut(&uuid)
            .ok_or_else(|| VaultError::not_found(uuid))
    }

    pub fn find(&self, uuid: Uuid) -> Option<&Entry> {
        self.entries.get(&uuid)
    }

    pub fn contains(&self, uuid: Uuid) -> bool {
        self.entries.contains_key(&uuid)
    }

    /// Case-insensitive lookup by group/title/user
    ///
    /// Uses the validated index when present; otherwise scans and returns
    /// the match with the lowest UUID.
    pub fn find_by_gtu(&self, group: &str, title: &str, user: &str) -> Option<&Entry> {
        self.find_by_key(&Gtu::new(group, title, user).key())
    }

    pub fn find_by_key(&self, key: &GtuKey) -> Option<&Entry> {
        match &self.gtu_index {
            Some(index) => index.get(key).and_then(|uuid| self.entries.get(uuid)),
            None => self
                .entries
                .values()
                .filter(|e| &e.gtu_key() == key)
                .min_by_key(|e| e.uuid),
        }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by normalized GTU, then UUID
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        let mut all: Vec<&Entry> = self.entries.values().collect();
        all.sort_by_cached_key(|e| (e.gtu_key(), e.uuid));
        all.into_iter()
    }

    /// Content snapshot for exact comparisons
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut entries: Vec<Entry> = self.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.uuid);
        StoreSnapshot {
            entries,
            empty_groups: self.empty_groups.clone(),
            policies: self.policies.clone(),
        }
    }

    // ===== Structural mutation =====

    /// Insert a new entry
    ///
    /// A dependent links to its base and promotes it (Normal → AliasBase or
    /// ShortcutBase). A non-dependent is stored as Normal.
    ///
    /// # Errors
    ///
    /// - `DuplicateUuid` if the UUID is taken
    /// - `ReferentialIntegrity` if a dependent's base is missing, is itself a
    ///   dependent, or already carries dependents of the other kind
    pub fn insert(&mut self, mut entry: Entry) -> Result<()> {
        if self.entries.contains_key(&entry.uuid) {
            return Err(VaultError::DuplicateUuid {
                uuid: entry.uuid.to_string(),
            });
        }

        match link_of(&entry)? {
            Some((base, kind)) => {
                self.check_base(entry.uuid, base, kind)?;
                self.resolver.link(base, entry.uuid, kind);
                self.get_mut(base)?.entry_type = kind.base_type();
            }
            None => entry.entry_type = EntryType::Normal,
        }

        tracing::debug!(entry_uuid = %entry.uuid, entry_type = ?entry.entry_type, "insert");
        self.entries.insert(entry.uuid, entry);
        self.invalidate_gtu();
        Ok(())
    }

    /// Remove an entry
    ///
    /// Removing the last dependent of a base demotes the base to Normal.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if absent
    /// - `BaseHasDependents` if the entry is still referenced
    pub fn remove(&mut self, uuid: Uuid) -> Result<Entry> {
        let entry = self.get(uuid)?;
        let count = self.resolver.total(uuid);
        if count > 0 {
            return Err(VaultError::BaseHasDependents {
                uuid: uuid.to_string(),
                count,
            });
        }
        if let Some((base, kind)) = link_of(entry)? {
            self.unlink(base, uuid, kind);
        }

        let removed = self
            .entries
            .remove(&uuid)
            .ok_or_else(|| VaultError::not_found(uuid))?;
        tracing::debug!(entry_uuid = %uuid, "remove");
        self.invalidate_gtu();
        Ok(removed)
    }

    /// Replace an entry with a new version carrying the same UUID
    ///
    /// A changed dependent link is re-validated and re-linked; bases are
    /// promoted/demoted to match. Returns the previous version.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if absent
    /// - `BaseHasDependents` if a base would become a dependent
    /// - `ReferentialIntegrity` if the new link does not resolve
    pub fn replace(&mut self, mut entry: Entry) -> Result<Entry> {
        let uuid = entry.uuid;
        let old = self.get(uuid)?;
        let old_link = link_of(old)?;
        let new_link = link_of(&entry)?;
        let gtu_changed = old.gtu() != entry.gtu();

        if old_link != new_link {
            if new_link.is_some() && self.resolver.total(uuid) > 0 {
                return Err(VaultError::BaseHasDependents {
                    uuid: uuid.to_string(),
                    count: self.resolver.total(uuid),
                });
            }
            if let Some((base, kind)) = new_link {
                self.check_base(uuid, base, kind)?;
            }
            if let Some((base, kind)) = old_link {
                self.unlink(base, uuid, kind);
            }
            if let Some((base, kind)) = new_link {
                self.resolver.link(base, uuid, kind);
                self.get_mut(base)?.entry_type = kind.base_type();
            }
        }
        if new_link.is_none() {
            entry.entry_type = self.resolver.derived_type(uuid);
        }

        let previous = self
            .entries
            .insert(uuid, entry)
            .ok_or_else(|| VaultError::not_found(uuid))?;
        if gtu_changed {
            self.invalidate_gtu();
        }
        Ok(previous)
    }

    fn check_base(&self, dependent: Uuid, base: Uuid, kind: DependentKind) -> Result<()> {
        let violation = |reason: &str| VaultError::ReferentialIntegrity {
            uuid: dependent.to_string(),
            base_uuid: base.to_string(),
            reason: reason.to_string(),
        };
        if base == dependent {
            return Err(violation("entry cannot depend on itself"));
        }
        let base_entry = self
            .entries
            .get(&base)
            .ok_or_else(|| violation("base does not exist"))?;
        if base_entry.is_dependent() {
            return Err(violation("base is itself a dependent"));
        }
        let current = self.resolver.derived_type(base);
        if current != EntryType::Normal && current != kind.base_type() {
            return Err(violation("base already has dependents of the other kind"));
        }
        Ok(())
    }

    fn unlink(&mut self, base: Uuid, dependent: Uuid, kind: DependentKind) {
        if self.resolver.unlink(base, dependent, kind) == 0 {
            let derived = self.resolver.derived_type(base);
            if let Some(b) = self.entries.get_mut(&base) {
                b.entry_type = derived;
            }
        }
    }

    // ===== Dependency queries =====

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// Dependents of `kind` attached to `base`, ordered by UUID
    pub fn dependents(&self, base: Uuid, kind: DependentKind) -> Vec<Uuid> {
        self.resolver.dependents(base, kind)
    }

    /// Password that applies to this entry: its base's for a dependent
    pub fn effective_password<'a>(&'a self, entry: &'a Entry) -> &'a Sensitive<String> {
        match entry.base_uuid.and_then(|b| self.entries.get(&b)) {
            Some(base) if entry.is_dependent() => &base.password,
            _ => &entry.password,
        }
    }

    /// Full referential-integrity sweep
    ///
    /// # Errors
    ///
    /// Returns `ReferentialIntegrity` for the first broken link found.
    pub fn validate_references(&self) -> Result<()> {
        for entry in self.iter() {
            let violation = |reason: String| VaultError::ReferentialIntegrity {
                uuid: entry.uuid.to_string(),
                base_uuid: entry.base_uuid.map(|b| b.to_string()).unwrap_or_default(),
                reason,
            };
            match link_of(entry)? {
                Some((base, kind)) => {
                    let base_entry = self
                        .entries
                        .get(&base)
                        .ok_or_else(|| violation("base does not exist".to_string()))?;
                    if base_entry.entry_type != kind.base_type() {
                        return Err(violation(format!(
                            "base has type {:?}, expected {:?}",
                            base_entry.entry_type,
                            kind.base_type()
                        )));
                    }
                }
                None => {
                    let derived = self.resolver.derived_type(entry.uuid);
                    if entry.entry_type != derived {
                        return Err(violation(format!(
                            "type {:?} does not match {} dependents",
                            entry.entry_type,
                            self.resolver.total(entry.uuid)
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    // ===== GTU validation =====

    /// Build the GTU index, failing on the first duplicate
    ///
    /// # Errors
    ///
    /// Returns `DuplicateGtu` naming the colliding triple; the store stays
    /// unvalidated.
    pub fn initialise_gtu(&mut self) -> Result<()> {
        self.gtu_index = None;
        let mut index = HashMap::with_capacity(self.entries.len());
        for entry in self.iter() {
            if index.insert(entry.gtu_key(), entry.uuid).is_some() {
                return Err(VaultError::DuplicateGtu {
                    group: entry.group.clone(),
                    title: entry.title.clone(),
                    user: entry.user.clone(),
                });
            }
        }
        self.gtu_index = Some(index);
        Ok(())
    }

    pub fn is_gtu_validated(&self) -> bool {
        self.gtu_index.is_some()
    }

    pub fn invalidate_gtu(&mut self) {
        self.gtu_index = None;
    }

    /// # Errors
    ///
    /// Returns `GtuNotValidated` unless `initialise_gtu` has succeeded since
    /// the last GTU-affecting mutation.
    pub fn require_validated(&self) -> Result<()> {
        if self.is_gtu_validated() {
            Ok(())
        } else {
            Err(VaultError::GtuNotValidated {
                store: self.name.clone(),
            })
        }
    }

    pub fn gtu_in_use(&self, key: &GtuKey) -> bool {
        self.find_by_key(key).is_some()
    }

    /// A title based on `title` whose GTU is free both here and in `taken`
    ///
    /// Tries `title` first, then `title (2)`, `title (3)`, ...
    pub fn unique_title(
        &self,
        group: &str,
        title: &str,
        user: &str,
        taken: &std::collections::HashSet<GtuKey>,
    ) -> String {
        let free = |t: &str| {
            let key = Gtu::new(group, t, user).key();
            !self.gtu_in_use(&key) && !taken.contains(&key)
        };
        if free(title) {
            return title.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{} ({})", title, n);
            if free(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // ===== Groups =====

    /// Explicitly created groups that have no entries
    pub fn empty_groups(&self) -> &[String] {
        &self.empty_groups
    }

    pub fn is_empty_group(&self, path: &str) -> bool {
        self.empty_groups.iter().any(|g| g == path)
    }

    /// Swap the empty-group list, returning the previous one
    pub(crate) fn replace_empty_groups(&mut self, groups: Vec<String>) -> Vec<String> {
        std::mem::replace(&mut self.empty_groups, groups)
    }

    /// Whether any entry lives in `path` or below it
    pub fn group_has_entries(&self, path: &str) -> bool {
        self.entries.values().any(|e| in_group(&e.group, path))
    }

    // ===== Named policies =====

    pub fn policies(&self) -> &BTreeMap<String, String> {
        &self.policies
    }

    pub fn policy(&self, name: &str) -> Option<&str> {
        self.policies.get(name).map(String::as_str)
    }

    /// Entries whose `policy_name` is `name`
    pub fn policy_users(&self, name: &str) -> usize {
        self.entries.values().filter(|e| e.policy_name == name).count()
    }

    /// Set or clear one named policy, returning the previous value
    pub(crate) fn set_policy(&mut self, name: &str, policy: Option<String>) -> Option<String> {
        match policy {
            Some(p) => self.policies.insert(name.to_string(), p),
            None => self.policies.remove(name),
        }
    }

    // ===== Dirty tracking =====

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set the dirty flag (hosts clear it after a successful save)
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Record an access without going through the command layer
    ///
    /// Not undoable, but marks the store dirty.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if absent.
    pub fn touch_access_time(&mut self, uuid: Uuid, now: i64) -> Result<()> {
        self.get_mut(uuid)?.atime = now;
        self.dirty = true;
        Ok(())
    }
}

/// Dependent link declared by an entry
///
/// # Errors
///
/// `ReferentialIntegrity` when `entry_type` and `base_uuid` disagree.
fn link_of(entry: &Entry) -> Result<Option<(Uuid, DependentKind)>> {
    match (entry.entry_type.dependent_kind(), entry.base_uuid) {
        (Some(kind), Some(base)) => Ok(Some((base, kind))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(VaultError::ReferentialIntegrity {
            uuid: entry.uuid.to_string(),
            base_uuid: String::new(),
            reason: "dependent has no base".to_string(),
        }),
        (None, Some(base)) => Err(VaultError::ReferentialIntegrity {
            uuid: entry.uuid.to_string(),
            base_uuid: base.to_string(),
            reason: format!("{:?} entry cannot carry a base", entry.entry_type),
        }),
    }
}

/// `group` equals `path` or is a descendant of it
pub fn in_group(group: &str, path: &str) -> bool {
    group == path
        || (group.len() > path.len()
            && group.starts_with(path)
            && group.as_bytes()[path.len()] == b'.')
}
