//! Entry-level commands: add, delete, whole-record edit, single-field edit

use uuid::Uuid;

use super::password::apply_password_change;
use super::{ExecContext, Outcome};
use crate::backends::AttachmentBackend;
use crate::errors::{Result, VaultError};
use crate::model::{Entry, EntryType, FieldType, FieldValue};
use crate::store::EntryStore;

// ===== Add =====

/// Insert one entry, plus its attachment
///
/// An entry without a creation time is stamped from the clock on first
/// execute.
#[derive(Debug, Clone, PartialEq)]
pub struct AddEntry {
    entry: Entry,
    attachment: Option<Vec<u8>>,
}

impl AddEntry {
    pub fn new(entry: Entry, attachment: Option<Vec<u8>>) -> Self {
        Self { entry, attachment }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub(crate) fn execute(
        &mut self,
        store: &mut EntryStore,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Outcome> {
        let uuid = self.entry.uuid;
        if self.entry.ctime == 0 {
            self.entry.ctime = ctx.clock.now();
        }
        store.insert(self.entry.clone())?;

        if let Some(bytes) = &self.attachment {
            match ctx.attachments.put(uuid, bytes) {
                Ok(reference) => store.get_mut(uuid)?.attachment_ref = Some(reference),
                Err(e) => {
                    store.remove(uuid)?;
                    return Err(e);
                }
            }
        }
        Ok(Outcome::touched(1))
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<()> {
        store.remove(self.entry.uuid)?;
        if self.attachment.is_some() {
            ctx.attachments.delete(self.entry.uuid)?;
        }
        Ok(())
    }
}

// ===== Delete =====

/// Everything a delete removed or rewrote
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedGraph {
    pub root: Entry,
    pub root_attachment: Option<Vec<u8>>,
    /// Shortcuts removed with a ShortcutBase, with their attachments
    pub shortcuts: Vec<(Entry, Option<Vec<u8>>)>,
    /// Pre-images of aliases turned into normal entries when their
    /// AliasBase was deleted
    pub promoted_aliases: Vec<Entry>,
}

/// Remove an entry and apply the dependency cascade
///
/// - ShortcutBase: the base and all its shortcuts go.
/// - AliasBase: the base goes; every alias becomes a normal entry holding
///   the base's password.
/// - Dependent: only the dependent goes; a base left with no dependents
///   reverts to Normal.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteEntry {
    uuid: Uuid,
    captured: Option<DeletedGraph>,
}

impl DeleteEntry {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            captured: None,
        }
    }

    /// Graph captured by the last execute
    pub fn captured(&self) -> Option<&DeletedGraph> {
        self.captured.as_ref()
    }

    fn capture(&self, store: &EntryStore, ctx: &ExecContext<'_>) -> Result<DeletedGraph> {
        let root = store.get(self.uuid)?.clone();
        let root_attachment = load_attachment(&root, &*ctx.attachments)?;

        let mut shortcuts = Vec::new();
        let mut promoted_aliases = Vec::new();
        match root.entry_type {
            EntryType::ShortcutBase => {
                for dep in store.dependents(root.uuid, crate::model::DependentKind::Shortcut) {
                    let entry = store.get(dep)?.clone();
                    let bytes = load_attachment(&entry, &*ctx.attachments)?;
                    shortcuts.push((entry, bytes));
                }
            }
            EntryType::AliasBase => {
                for dep in store.dependents(root.uuid, crate::model::DependentKind::Alias) {
                    promoted_aliases.push(store.get(dep)?.clone());
                }
            }
            _ => {}
        }

        Ok(DeletedGraph {
            root,
            root_attachment,
            shortcuts,
            promoted_aliases,
        })
    }

    pub(crate) fn execute(
        &mut self,
        store: &mut EntryStore,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Outcome> {
        let graph = self.capture(store, ctx)?;

        if let Err(e) = remove_graph(&graph, store, ctx) {
            restore_graph(&graph, store, ctx)?;
            return Err(e);
        }

        let altered = 1 + graph.shortcuts.len() + graph.promoted_aliases.len();
        tracing::debug!(
            entry_uuid = %self.uuid,
            shortcuts_removed = graph.shortcuts.len(),
            aliases_promoted = graph.promoted_aliases.len(),
            "delete cascade"
        );
        self.captured = Some(graph);
        Ok(Outcome::touched(altered))
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<()> {
        let graph = self.captured.as_ref().ok_or_else(|| VaultError::Internal {
            message: format!("delete of {} undone before execute", self.uuid),
        })?;
        restore_graph(graph, store, ctx)
    }
}

fn load_attachment(entry: &Entry, attachments: &dyn AttachmentBackend) -> Result<Option<Vec<u8>>> {
    match entry.attachment_ref {
        Some(_) => attachments.get(entry.uuid).map(Some),
        None => Ok(None),
    }
}

fn remove_graph(graph: &DeletedGraph, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<()> {
    let root = &graph.root;

    for (shortcut, bytes) in &graph.shortcuts {
        store.remove(shortcut.uuid)?;
        if bytes.is_some() {
            ctx.attachments.delete(shortcut.uuid)?;
        }
    }

    for alias in &graph.promoted_aliases {
        let mut promoted = alias.clone();
        promoted.entry_type = EntryType::Normal;
        promoted.base_uuid = None;
        promoted.password = root.password.clone();
        store.replace(promoted)?;
    }

    store.remove(root.uuid)?;
    if graph.root_attachment.is_some() {
        ctx.attachments.delete(root.uuid)?;
    }
    Ok(())
}

/// Put a removed graph back; safe to call on a partially removed graph
fn restore_graph(graph: &DeletedGraph, store: &mut EntryStore, ctx: &mut ExecContext<'_>) -> Result<()> {
    let root = &graph.root;
    if !store.contains(root.uuid) {
        store.insert(root.clone())?;
    }
    if let Some(bytes) = &graph.root_attachment {
        ctx.attachments.put(root.uuid, bytes)?;
    }

    for (shortcut, bytes) in &graph.shortcuts {
        if !store.contains(shortcut.uuid) {
            store.insert(shortcut.clone())?;
        }
        if let Some(bytes) = bytes {
            ctx.attachments.put(shortcut.uuid, bytes)?;
        }
    }

    for alias in &graph.promoted_aliases {
        store.replace(alias.clone())?;
    }
    Ok(())
}

// ===== EditRecord =====

/// Replace a whole record; the pre-image is taken from the store at execute
#[derive(Debug, Clone, PartialEq)]
pub struct EditRecord {
    old: Entry,
    new: Entry,
    before: Option<Entry>,
}

impl EditRecord {
    pub fn new(old: Entry, new: Entry) -> Self {
        Self {
            old,
            new,
            before: None,
        }
    }

    /// The snapshot the caller edited from
    pub fn old(&self) -> &Entry {
        &self.old
    }

    pub fn new_record(&self) -> &Entry {
        &self.new
    }

    pub(crate) fn execute(&mut self, store: &mut EntryStore) -> Result<Outcome> {
        if self.old.uuid != self.new.uuid {
            return Err(VaultError::InvalidInput {
                reason: format!(
                    "edit cannot change UUID {} to {}",
                    self.old.uuid, self.new.uuid
                ),
            });
        }
        let before = store.replace(self.new.clone())?;
        let changed = store.get(self.new.uuid)? != &before;
        self.before = Some(before);
        Ok(Outcome {
            changed,
            altered: usize::from(changed),
        })
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore) -> Result<()> {
        let before = self.before.clone().ok_or_else(|| VaultError::Internal {
            message: format!("edit of {} undone before execute", self.new.uuid),
        })?;
        store.replace(before)?;
        Ok(())
    }
}

// ===== EditField =====

/// Change a single field
///
/// A password edit follows the same rules as `UpdatePassword`: the old
/// password enters history and pmtime/xtime are restamped.
#[derive(Debug, Clone, PartialEq)]
pub struct EditField {
    uuid: Uuid,
    field: FieldType,
    value: FieldValue,
    stamped_at: Option<i64>,
    before: Option<Entry>,
}

impl EditField {
    pub fn new(uuid: Uuid, field: FieldType, value: FieldValue) -> Self {
        Self {
            uuid,
            field,
            value,
            stamped_at: None,
            before: None,
        }
    }

    pub fn field(&self) -> FieldType {
        self.field
    }

    pub(crate) fn execute(
        &mut self,
        store: &mut EntryStore,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Outcome> {
        let before = store.get(self.uuid)?.clone();
        let mut after = before.clone();

        match (self.field, &self.value) {
            (FieldType::Password, FieldValue::Secret(password)) => {
                let now = *self.stamped_at.get_or_insert_with(|| ctx.clock.now());
                apply_password_change(&mut after, password.clone(), now, &ctx.config.history)?;
            }
            (field, value) => after.set_field(field, value.clone())?,
        }

        if after == before {
            self.before = Some(before);
            return Ok(Outcome::unchanged());
        }
        store.replace(after)?;
        self.before = Some(before);
        Ok(Outcome::touched(1))
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore) -> Result<()> {
        let before = self.before.clone().ok_or_else(|| VaultError::Internal {
            message: format!("field edit of {} undone before execute", self.uuid),
        })?;
        store.replace(before)?;
        Ok(())
    }
}
