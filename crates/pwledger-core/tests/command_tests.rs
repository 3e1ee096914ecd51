#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::Harness;
use pwledger_core::backends::AttachmentBackend;
use pwledger_core::commands::{Command, EmptyGroupAction, PolicyAction};
use pwledger_core::model::{DependentKind, Entry, EntryType, FieldType, FieldValue};
use pwledger_core::VaultError;

// ===== Add =====

#[test]
fn test_add_then_undo_restores_content_exactly() {
    // GIVEN a store with one entry
    let mut h = Harness::new();
    h.add("g", "first", "u", "p");
    let before = h.store.snapshot();

    // WHEN adding and undoing
    h.add("g", "second", "u", "p");
    assert_eq!(h.store.count(), 2);
    h.undo().unwrap();

    // THEN the content is back to the earlier snapshot
    assert_eq!(h.store.snapshot(), before);
}

#[test]
fn test_add_with_attachment_records_ref_and_undo_drops_blob() {
    // GIVEN an entry with attachment bytes
    let mut h = Harness::new();
    let entry = Entry::new("g", "doc", "u", "p");
    let uuid = entry.uuid;

    // WHEN adding it
    h.exec(Command::add_with_attachment(entry, b"scan".to_vec()))
        .unwrap();

    // THEN the entry carries the attachment reference
    let stored = h.store.get(uuid).unwrap();
    assert!(stored.attachment_ref.as_deref().unwrap().starts_with("sha256:"));
    assert_eq!(h.attachments.get(uuid).unwrap(), b"scan");

    // WHEN undoing
    h.undo().unwrap();

    // THEN both entry and blob are gone
    assert!(!h.store.contains(uuid));
    assert!(!h.attachments.contains(uuid));
}

#[test]
fn test_add_duplicate_uuid_is_not_recorded() {
    let mut h = Harness::new();
    let entry = Entry::new("g", "t", "u", "p");
    h.exec(Command::add(entry.clone())).unwrap();

    let result = h.exec(Command::add(entry));

    assert!(matches!(result, Err(VaultError::DuplicateUuid { .. })));
    assert_eq!(h.log.undo_depth(), 1);
}

// ===== Delete =====

#[test]
fn test_delete_shortcut_base_removes_all_and_undo_restores() {
    // GIVEN a shortcut base with two shortcuts and an unrelated entry
    let mut h = Harness::new();
    let base = h.add("g", "base", "u", "p");
    let s1 = h.add_dependent(base, DependentKind::Shortcut, "s1");
    let s2 = h.add_dependent(base, DependentKind::Shortcut, "s2");
    h.add("g", "other", "u", "p");
    let before = h.store.snapshot();
    assert_eq!(h.store.get(base).unwrap().entry_type, EntryType::ShortcutBase);

    // WHEN deleting the base
    let outcome = h.exec(Command::delete(base)).unwrap();

    // THEN exactly 1+K entries are removed
    assert_eq!(outcome.altered, 3);
    assert_eq!(h.store.count(), 1);
    assert!(!h.store.contains(s1) && !h.store.contains(s2));

    // WHEN undoing
    h.undo().unwrap();

    // THEN all entries and links are back
    assert_eq!(h.store.snapshot(), before);
    assert_eq!(h.store.dependents(base, DependentKind::Shortcut).len(), 2);
    h.store.validate_references().unwrap();
}

#[test]
fn test_delete_sole_alias_reverts_base_and_undo_restores() {
    // GIVEN an alias base with one alias
    let mut h = Harness::new();
    let base = h.add("g", "base", "u", "p");
    let alias = h.add_dependent(base, DependentKind::Alias, "a");

    // WHEN deleting the alias
    h.exec(Command::delete(alias)).unwrap();

    // THEN the base is Normal
    assert_eq!(h.store.get(base).unwrap().entry_type, EntryType::Normal);

    // WHEN undoing
    h.undo().unwrap();

    // THEN the base is an AliasBase again
    assert_eq!(h.store.get(base).unwrap().entry_type, EntryType::AliasBase);
    assert_eq!(h.store.get(alias).unwrap().base_uuid, Some(base));
}

#[test]
fn test_delete_alias_base_promotes_aliases_with_base_password() {
    // GIVEN an alias base with two aliases
    let mut h = Harness::new();
    let base = h.add("g", "base", "u", "s3cret");
    let a1 = h.add_dependent(base, DependentKind::Alias, "a1");
    let a2 = h.add_dependent(base, DependentKind::Alias, "a2");
    let before = h.store.snapshot();

    // WHEN deleting the base
    h.exec(Command::delete(base)).unwrap();

    // THEN every alias is a normal entry holding the base's password
    for alias in [a1, a2] {
        let e = h.store.get(alias).unwrap();
        assert_eq!(e.entry_type, EntryType::Normal);
        assert_eq!(e.base_uuid, None);
        assert_eq!(e.password.expose(), "s3cret");
    }

    // WHEN undoing
    h.undo().unwrap();

    // THEN the graph is exactly restored
    assert_eq!(h.store.snapshot(), before);
}

#[test]
fn test_delete_restores_attachment_on_undo() {
    let mut h = Harness::new();
    let entry = Entry::new("g", "doc", "u", "p");
    let uuid = entry.uuid;
    h.exec(Command::add_with_attachment(entry, b"pdf".to_vec()))
        .unwrap();

    h.exec(Command::delete(uuid)).unwrap();
    assert!(!h.attachments.contains(uuid));
    h.undo().unwrap();

    assert_eq!(h.attachments.get(uuid).unwrap(), b"pdf");
}

#[test]
fn test_delete_missing_entry_fails() {
    let mut h = Harness::new();

    let result = h.exec(Command::delete(uuid::Uuid::new_v4()));

    assert!(matches!(result, Err(VaultError::EntryNotFound { .. })));
    assert!(!h.log.any_to_undo());
}

// ===== Edit =====

#[test]
fn test_edit_record_and_undo() {
    let mut h = Harness::new();
    let uuid = h.add("g", "t", "u", "p");
    let old = h.store.get(uuid).unwrap().clone();
    let mut new = old.clone();
    new.title = "renamed".to_string();
    new.url = "https://example.org".to_string();

    let outcome = h.exec(Command::edit_record(old.clone(), new)).unwrap();

    assert!(outcome.changed);
    assert_eq!(h.store.get(uuid).unwrap().title, "renamed");
    h.undo().unwrap();
    assert_eq!(h.store.get(uuid).unwrap(), &old);
}

#[test]
fn test_edit_record_cannot_change_uuid() {
    let mut h = Harness::new();
    let uuid = h.add("g", "t", "u", "p");
    let old = h.store.get(uuid).unwrap().clone();
    let mut new = old.clone();
    new.uuid = uuid::Uuid::new_v4();

    let result = h.exec(Command::edit_record(old, new));

    assert!(matches!(result, Err(VaultError::InvalidInput { .. })));
}

#[test]
fn test_edit_field_text() {
    let mut h = Harness::new();
    let uuid = h.add("g", "t", "u", "p");

    h.exec(Command::edit_field(
        uuid,
        FieldType::Email,
        FieldValue::Text("bob@example.org".to_string()),
    ))
    .unwrap();

    assert_eq!(h.store.get(uuid).unwrap().email, "bob@example.org");
}

#[test]
fn test_edit_field_kind_mismatch_rejected() {
    let mut h = Harness::new();
    let uuid = h.add("g", "t", "u", "p");

    let result = h.exec(Command::edit_field(uuid, FieldType::CTime, FieldValue::Flag(true)));

    assert!(matches!(result, Err(VaultError::InvalidInput { .. })));
    assert_eq!(h.log.undo_depth(), 1);
}

#[test]
fn test_edit_field_password_feeds_history() {
    // GIVEN an entry created at T0
    let mut h = Harness::new();
    let uuid = h.add("g", "t", "u", "old");
    h.clock.advance(60);

    // WHEN the password field is edited
    h.exec(Command::edit_field(
        uuid,
        FieldType::Password,
        FieldValue::Secret("new".into()),
    ))
    .unwrap();

    // THEN the old password is in history and pmtime is stamped
    let e = h.store.get(uuid).unwrap();
    assert_eq!(e.password.expose(), "new");
    assert_eq!(e.pmtime, common::T0 + 60);
    let history = e.history.as_ref().unwrap();
    assert_eq!(history.newest().unwrap().password.expose(), "old");
}

// ===== Groups =====

#[test]
fn test_rename_group_moves_subtree_and_empty_groups() {
    // GIVEN entries under Work and Work.Mail, and an empty group Work.Old
    let mut h = Harness::new();
    let a = h.add("Work", "a", "", "");
    let b = h.add("Work.Mail", "b", "", "");
    let c = h.add("Workshop", "c", "", "");
    h.exec(Command::empty_groups(EmptyGroupAction::Add("Work.Old".to_string())))
        .unwrap();
    let before = h.store.snapshot();

    // WHEN renaming Work to Job
    let outcome = h.exec(Command::rename_group("Work", "Job")).unwrap();

    // THEN the subtree moved and the sibling prefix did not
    assert_eq!(outcome.altered, 2);
    assert_eq!(h.store.get(a).unwrap().group, "Job");
    assert_eq!(h.store.get(b).unwrap().group, "Job.Mail");
    assert_eq!(h.store.get(c).unwrap().group, "Workshop");
    assert!(h.store.is_empty_group("Job.Old"));

    // WHEN undoing
    h.undo().unwrap();

    // THEN everything is back
    assert_eq!(h.store.snapshot(), before);
}

#[test]
fn test_rename_root_group_rejected() {
    let mut h = Harness::new();

    let result = h.exec(Command::rename_group("", "x"));

    assert!(matches!(result, Err(VaultError::InvalidInput { .. })));
}

#[test]
fn test_empty_group_add_remove_and_errors() {
    let mut h = Harness::new();
    h.exec(Command::empty_groups(EmptyGroupAction::Add("A".to_string())))
        .unwrap();

    let dup = h.exec(Command::empty_groups(EmptyGroupAction::Add("A".to_string())));
    let missing = h.exec(Command::empty_groups(EmptyGroupAction::Remove("B".to_string())));

    assert!(matches!(dup, Err(VaultError::EmptyGroupExists { .. })));
    assert!(matches!(missing, Err(VaultError::EmptyGroupNotFound { .. })));

    h.exec(Command::empty_groups(EmptyGroupAction::Rename {
        from: "A".to_string(),
        to: "C".to_string(),
    }))
    .unwrap();
    assert_eq!(h.store.empty_groups(), ["C".to_string()]);

    h.undo().unwrap();
    assert_eq!(h.store.empty_groups(), ["A".to_string()]);
}

#[test]
fn test_empty_group_replace_all_dedupes() {
    let mut h = Harness::new();

    h.exec(Command::empty_groups(EmptyGroupAction::ReplaceAll(vec![
        "X".to_string(),
        "X".to_string(),
        "Y".to_string(),
    ])))
    .unwrap();

    assert_eq!(h.store.empty_groups(), ["X".to_string(), "Y".to_string()]);
}

// ===== MoveDependents =====

#[test]
fn test_move_dependents_between_bases() {
    // GIVEN base A with two aliases and a plain entry B
    let mut h = Harness::new();
    let a = h.add("g", "a", "", "pa");
    let b = h.add("g", "b", "", "pb");
    let d1 = h.add_dependent(a, DependentKind::Alias, "d1");
    let d2 = h.add_dependent(a, DependentKind::Alias, "d2");

    // WHEN moving the aliases to B
    let outcome = h.exec(Command::move_dependents(a, b, DependentKind::Alias)).unwrap();

    // THEN B is the base and A reverted
    assert_eq!(outcome.altered, 2);
    assert_eq!(h.store.get(a).unwrap().entry_type, EntryType::Normal);
    assert_eq!(h.store.get(b).unwrap().entry_type, EntryType::AliasBase);
    let alias = h.store.get(d1).unwrap();
    assert_eq!(h.store.effective_password(alias).expose(), "pb");

    // WHEN undoing
    h.undo().unwrap();

    // THEN the aliases point at A again
    assert_eq!(h.store.get(d2).unwrap().base_uuid, Some(a));
    assert_eq!(h.store.get(a).unwrap().entry_type, EntryType::AliasBase);
    assert_eq!(h.store.get(b).unwrap().entry_type, EntryType::Normal);
}

#[test]
fn test_move_dependents_onto_other_kind_base_fails_cleanly() {
    // GIVEN A with an alias and B with a shortcut
    let mut h = Harness::new();
    let a = h.add("g", "a", "", "");
    let b = h.add("g", "b", "", "");
    h.add_dependent(a, DependentKind::Alias, "alias");
    h.add_dependent(b, DependentKind::Shortcut, "shortcut");
    let before = h.store.snapshot();

    // WHEN moving A's aliases to B
    let result = h.exec(Command::move_dependents(a, b, DependentKind::Alias));

    // THEN it fails and nothing moved
    assert!(matches!(result, Err(VaultError::ReferentialIntegrity { .. })));
    assert_eq!(h.store.snapshot(), before);
}

// ===== Multi =====

#[test]
fn test_multi_unwinds_on_child_failure() {
    // GIVEN a composite whose second child collides with its first
    let mut h = Harness::new();
    let entry = Entry::new("g", "t", "u", "p");
    let before = h.store.snapshot();
    let multi = Command::multi(vec![
        Command::add(entry.clone()),
        Command::add(Entry::new("g", "t2", "u", "p")),
        Command::add(entry),
    ]);

    // WHEN executing
    let result = h.exec(multi);

    // THEN the original error surfaces and nothing remains
    assert!(matches!(result, Err(VaultError::DuplicateUuid { .. })));
    assert_eq!(h.store.snapshot(), before);
    assert!(!h.log.any_to_undo());
}

#[test]
fn test_multi_undoes_as_one_step() {
    let mut h = Harness::new();
    let multi = Command::multi(vec![
        Command::add(Entry::new("g", "a", "", "")),
        Command::add(Entry::new("g", "b", "", "")),
    ]);

    let outcome = h.exec(multi).unwrap();
    assert_eq!(outcome.altered, 2);
    h.undo().unwrap();

    assert!(h.store.is_empty());
    assert!(h.log.any_to_redo());
}

#[test]
fn test_policy_add_update_remove_and_undo() {
    // GIVEN an empty policy table
    let mut h = Harness::new();

    // WHEN adding then updating a policy
    h.exec(Command::policy(PolicyAction::Add {
        name: "strong".to_string(),
        policy: "p1".to_string(),
    }))
    .unwrap();
    h.exec(Command::policy(PolicyAction::Update {
        name: "strong".to_string(),
        policy: "p2".to_string(),
    }))
    .unwrap();

    // THEN the latest value is held and undo steps back through each
    assert_eq!(h.store.policy("strong"), Some("p2"));
    h.undo().unwrap();
    assert_eq!(h.store.policy("strong"), Some("p1"));
    h.undo().unwrap();
    assert!(h.store.policies().is_empty());

    // WHEN redoing the add and removing the policy
    h.redo().unwrap();
    h.exec(Command::policy(PolicyAction::Remove("strong".to_string())))
        .unwrap();

    // THEN it is gone until undone
    assert_eq!(h.store.policy("strong"), None);
    h.undo().unwrap();
    assert_eq!(h.store.policy("strong"), Some("p1"));
}

#[test]
fn test_policy_errors_leave_table_unchanged() {
    let mut h = Harness::new();
    h.exec(Command::policy(PolicyAction::Add {
        name: "strong".to_string(),
        policy: "p1".to_string(),
    }))
    .unwrap();
    let mut user = Entry::new("g", "t", "", "");
    user.policy_name = "strong".to_string();
    h.exec(Command::add(user)).unwrap();

    let duplicate = h.exec(Command::policy(PolicyAction::Add {
        name: "strong".to_string(),
        policy: "p2".to_string(),
    }));
    let missing = h.exec(Command::policy(PolicyAction::Update {
        name: "weak".to_string(),
        policy: "p2".to_string(),
    }));
    let in_use = h.exec(Command::policy(PolicyAction::Remove("strong".to_string())));

    for result in [duplicate, missing, in_use] {
        assert!(matches!(result, Err(VaultError::InvalidInput { .. })));
    }
    assert_eq!(h.store.policy("strong"), Some("p1"));
    assert_eq!(h.log.undo_depth(), 2);
}
