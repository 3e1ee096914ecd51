#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{passphrase, session, T0};
use pwledger_core::backends::PersistenceBackend;
use pwledger_core::commands::Command;
use pwledger_core::compare::CompareOptions;
use pwledger_core::merge::MergeOptions;
use pwledger_core::model::{Entry, FieldType};
use pwledger_core::{EntryStore, FieldSet, VaultError, VecReport};
use pwledger_core_types::Sensitive;
use pwledger_engine::JsonFileBackend;
use tempfile::tempdir;

fn validated(name: &str, entries: Vec<Entry>) -> EntryStore {
    let mut store = EntryStore::from_entries(name, entries, vec![]).unwrap();
    store.initialise_gtu().unwrap();
    store
}

#[test]
fn test_new_session_is_empty_and_validated() {
    let (session, _) = session();

    assert!(session.store().is_empty());
    assert!(session.store().is_gtu_validated());
    assert!(!session.is_open());
    assert!(!session.log().any_to_undo());
}

#[test]
fn test_save_as_close_and_reopen() {
    // GIVEN a session with one added entry saved to a new vault
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let (mut first, _) = session();
    let entry = Entry::new("Work", "mail", "alice", "pw");
    let uuid = entry.uuid;
    first.execute(Command::add(entry)).unwrap();
    first.save_as(&path, &passphrase()).unwrap();
    assert!(!first.store().is_dirty());
    assert_eq!(first.path(), Some(path.as_path()));

    // WHEN it is closed and another session opens the vault
    first.close().unwrap();
    let (mut second, _) = session();
    let count = second.open(&path, &passphrase()).unwrap();

    // THEN the entry is there, stamped with its creation time
    assert_eq!(count, 1);
    let loaded = second.store().get(uuid).unwrap();
    assert_eq!(loaded.title, "mail");
    assert_eq!(loaded.ctime, T0);
    assert!(second.store().is_gtu_validated());
    assert!(!second.log().any_to_undo());
}

#[test]
fn test_open_twice_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let (mut s, _) = session();
    s.save_as(&path, &passphrase()).unwrap();

    let result = s.open(&path, &passphrase());

    assert!(matches!(result, Err(VaultError::InvalidInput { .. })));
    assert!(s.is_open());
}

#[test]
fn test_open_locked_vault_fails() {
    // GIVEN a vault held open by one session
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let (mut holder, _) = session();
    holder.save_as(&path, &passphrase()).unwrap();

    // WHEN a second session opens it
    let (mut other, _) = session();
    let result = other.open(&path, &passphrase());

    // THEN it is locked out and stays closed
    assert!(matches!(result, Err(VaultError::Locked { .. })));
    assert!(!other.is_open());
}

#[test]
fn test_failed_open_releases_lock() {
    // GIVEN a saved, closed vault
    let dir = tempdir().unwrap();
    let path = dir.path().join("vault.json");
    let (mut writer, _) = session();
    writer.save_as(&path, &passphrase()).unwrap();
    writer.close().unwrap();

    // WHEN opening with the wrong passphrase
    let (mut s, _) = session();
    let result = s.open(&path, &Sensitive::new("wrong".to_string()));

    // THEN authentication fails and the lock is free again
    assert!(matches!(result, Err(VaultError::Authentication { .. })));
    assert!(JsonFileBackend::new().lock(&path).is_ok());
}

#[test]
fn test_save_without_vault_fails() {
    let (mut s, _) = session();
    let result = s.save(&passphrase());
    assert!(matches!(result, Err(VaultError::InvalidInput { .. })));
}

#[test]
fn test_save_as_moves_lock_to_new_path() {
    // GIVEN a session saved at one path
    let dir = tempdir().unwrap();
    let old_path = dir.path().join("old.json");
    let new_path = dir.path().join("new.json");
    let (mut s, _) = session();
    s.save_as(&old_path, &passphrase()).unwrap();

    // WHEN saving as another path
    s.save_as(&new_path, &passphrase()).unwrap();

    // THEN the old path is free and the new one is held
    let other_process = JsonFileBackend::new();
    assert!(other_process.lock(&old_path).is_ok());
    assert!(matches!(
        other_process.lock(&new_path),
        Err(VaultError::Locked { .. })
    ));
}

#[test]
fn test_execute_undo_redo_through_session() {
    // GIVEN a session
    let (mut s, _) = session();
    let entry = Entry::new("g", "t", "u", "p");
    let uuid = entry.uuid;

    // WHEN adding, undoing and redoing
    let outcome = s.execute(Command::add(entry)).unwrap();
    assert!(outcome.changed);
    assert!(s.store().is_dirty());
    s.undo().unwrap();
    assert!(!s.store().contains(uuid));
    assert!(!s.store().is_dirty());
    s.redo().unwrap();

    // THEN the entry is back and can be undone again
    assert!(s.store().contains(uuid));
    assert_eq!(s.log().peek_undo(), Some("add"));
}

#[test]
fn test_close_discards_history() {
    let (mut s, _) = session();
    s.execute(Command::add(Entry::new("g", "t", "u", "p")))
        .unwrap();

    s.close().unwrap();

    assert!(s.store().is_empty());
    assert!(matches!(s.undo(), Err(VaultError::NothingToUndo)));
}

#[test]
fn test_failed_command_leaves_store_unchanged() {
    let (mut s, _) = session();
    let before = s.store().snapshot();

    let result = s.execute(Command::delete(uuid::Uuid::new_v4()));

    assert!(matches!(result, Err(VaultError::EntryNotFound { .. })));
    assert_eq!(s.store().snapshot(), before);
    assert!(!s.log().any_to_undo());
}

#[test]
fn test_merge_is_one_undo_step() {
    // GIVEN a session and a source with two new entries
    let (mut s, _) = session();
    s.execute(Command::add(Entry::new("g", "kept", "", "p")))
        .unwrap();
    let source = validated(
        "other",
        vec![Entry::new("g", "a", "", "1"), Entry::new("g", "b", "", "2")],
    );
    let mut sink = VecReport::new();

    // WHEN merging
    let report = s.merge(&source, &MergeOptions::default(), &mut sink).unwrap();

    // THEN both arrive, and a single undo removes both
    assert_eq!(report.added, 2);
    assert_eq!(s.store().count(), 3);
    assert_eq!(s.log().undo_depth(), 2);
    s.undo().unwrap();
    assert_eq!(s.store().count(), 1);
    assert!(sink.lines.last().unwrap().starts_with("Merge completed"));
}

#[test]
fn test_merge_with_nothing_to_import_records_nothing() {
    let (mut s, _) = session();
    let source = validated("other", vec![]);

    let report = s
        .merge(&source, &MergeOptions::default(), &mut VecReport::new())
        .unwrap();

    assert_eq!(report.total_imported(), 0);
    assert!(!s.log().any_to_undo());
}

#[test]
fn test_synchronize_updates_password_and_undoes() {
    // GIVEN matching entries with different passwords
    let (mut s, _) = session();
    let mine = Entry::new("g", "t", "u", "old");
    let uuid = mine.uuid;
    s.execute(Command::add(mine)).unwrap();
    let source = validated("other", vec![Entry::new("g", "t", "u", "new")]);
    let fields: FieldSet = [FieldType::Password].into_iter().collect();

    // WHEN synchronizing the password
    let report = s
        .synchronize(&source, fields, None, &mut VecReport::new())
        .unwrap();

    // THEN it is copied, and undo restores it
    assert_eq!(report.updated_count(), 1);
    assert_eq!(s.store().get(uuid).unwrap().password.expose(), "new");
    s.undo().unwrap();
    assert_eq!(s.store().get(uuid).unwrap().password.expose(), "old");
}

#[test]
fn test_compare_writes_report() {
    let (mut s, _) = session();
    s.execute(Command::add(Entry::new("g", "t", "u", "p")))
        .unwrap();
    let mut theirs = Entry::new("g", "t", "u", "p");
    theirs.ctime = T0;
    let other = validated("other", vec![theirs]);
    let mut sink = VecReport::new();

    let result = s
        .compare(&other, &CompareOptions::default(), &mut sink)
        .unwrap();

    assert!(result.is_identical());
    assert_eq!(sink.lines[0], "Comparing 'current' with 'other'");
    assert_eq!(sink.lines[1], "Databases are identical (1 entries)");
}

#[test]
fn test_compare_against_unvalidated_store_fails() {
    let (s, _) = session();
    let other = EntryStore::from_entries("raw", vec![], vec![]).unwrap();

    let result = s.compare(&other, &CompareOptions::default(), &mut VecReport::new());

    assert!(matches!(result, Err(VaultError::GtuNotValidated { .. })));
}

#[test]
fn test_touch_access_time_is_not_undoable() {
    // GIVEN a saved entry and a later clock
    let (mut s, clock) = session();
    let entry = Entry::new("g", "t", "u", "p");
    let uuid = entry.uuid;
    s.execute(Command::add(entry)).unwrap();
    clock.advance(60);

    // WHEN touching its access time
    s.touch_access_time(uuid).unwrap();

    // THEN atime moves, the store is dirty, and only the add is undoable
    assert_eq!(s.store().get(uuid).unwrap().atime, T0 + 60);
    assert!(s.store().is_dirty());
    assert_eq!(s.log().undo_depth(), 1);
}

#[test]
fn test_execute_then_merge_twice() {
    // GIVEN a session edited through execute, undo and redo
    let (mut s, _) = session();
    s.execute(Command::add(Entry::new("g", "kept", "", "p")))
        .unwrap();
    s.execute(Command::add(Entry::new("g", "extra", "", "x")))
        .unwrap();
    s.undo().unwrap();
    s.redo().unwrap();

    // WHEN merging two sources one after the other
    let first = validated("first", vec![Entry::new("g", "a", "", "1")]);
    let second = validated("second", vec![Entry::new("g", "b", "", "2")]);
    let one = s.merge(&first, &MergeOptions::default(), &mut VecReport::new()).unwrap();
    let two = s.merge(&second, &MergeOptions::default(), &mut VecReport::new()).unwrap();

    // THEN both imports land as separate undo steps
    assert_eq!(one.added, 1);
    assert_eq!(two.added, 1);
    assert_eq!(s.store().count(), 4);
    assert_eq!(s.log().undo_depth(), 4);

    // AND compare and synchronize still accept the store
    let fields: FieldSet = [FieldType::Password].into_iter().collect();
    let third = validated("third", vec![Entry::new("g", "a", "", "new")]);
    let report = s
        .synchronize(&third, fields, None, &mut VecReport::new())
        .unwrap();
    assert_eq!(report.updated_count(), 1);
    let result = s
        .compare(&second, &CompareOptions::default(), &mut VecReport::new())
        .unwrap();
    assert_eq!(result.only_in_current.len(), 3);
}

#[test]
fn test_validate_gtu_after_resolving_duplicate() {
    // GIVEN a session where an add created a duplicate group/title/user
    let (mut s, _) = session();
    s.execute(Command::add(Entry::new("g", "t", "u", "1")))
        .unwrap();
    let twin = Entry::new("G", "T", "U", "2");
    let twin_uuid = twin.uuid;
    s.execute(Command::add(twin)).unwrap();
    assert!(!s.store().is_gtu_validated());
    assert!(matches!(s.validate_gtu(), Err(VaultError::DuplicateGtu { .. })));
    let source = validated("other", vec![]);
    assert!(matches!(
        s.merge(&source, &MergeOptions::default(), &mut VecReport::new()),
        Err(VaultError::GtuNotValidated { .. })
    ));

    // WHEN the duplicate is deleted and the store validated
    s.execute(Command::delete(twin_uuid)).unwrap();
    s.validate_gtu().unwrap();

    // THEN cross-store operations work again
    assert!(s.store().is_gtu_validated());
    let report = s
        .merge(&source, &MergeOptions::default(), &mut VecReport::new())
        .unwrap();
    assert_eq!(report.total_imported(), 0);
}
