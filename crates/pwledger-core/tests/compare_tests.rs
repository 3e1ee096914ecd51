#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{validated_store, Harness};
use pwledger_core::compare::{compare, write_report, CompareOptions, FilterField, MatchRule, SubgroupFilter};
use pwledger_core::model::{DependentKind, Entry, FieldSet, FieldType};
use pwledger_core::{EntryStore, VaultError, VecReport};

fn sample() -> Vec<Entry> {
    vec![
        Entry::new("Work", "mail", "bob", "m1"),
        Entry::new("Work", "vpn", "bob", "v1"),
        Entry::new("Home", "bank", "alice", "b1"),
    ]
}

#[test]
fn test_compare_store_with_itself_is_identical() {
    // GIVEN two copies of the same entries
    let entries = sample();
    let a = validated_store("a", entries.clone());
    let b = validated_store("b", entries);

    // WHEN comparing
    let result = compare(&a, &b, &CompareOptions::default()).unwrap();

    // THEN every entry is identical
    assert!(result.is_identical());
    assert_eq!(result.identical.len(), 3);
}

#[test]
fn test_single_password_change_is_one_conflict() {
    // GIVEN B = A with one password changed
    let entries = sample();
    let mut changed = entries.clone();
    changed[1].password = "v2".into();
    let a = validated_store("a", entries);
    let b = validated_store("b", changed);

    // WHEN comparing
    let result = compare(&a, &b, &CompareOptions::default()).unwrap();

    // THEN exactly one conflict, on the password only
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].diffs, FieldSet::empty().with(FieldType::Password));
    assert_eq!(result.conflicts[0].gtu.title, "vpn");
    assert!(result.only_in_current.is_empty());
    assert!(result.only_in_comp.is_empty());
}

#[test]
fn test_only_in_partitions_sorted_by_gtu() {
    // GIVEN stores sharing one entry
    let shared = Entry::new("S", "shared", "", "p");
    let a = validated_store(
        "a",
        vec![shared.clone(), Entry::new("Z", "z", "", ""), Entry::new("A", "a", "", "")],
    );
    let b = validated_store("b", vec![shared, Entry::new("M", "m", "", "")]);

    // WHEN comparing
    let result = compare(&a, &b, &CompareOptions::default()).unwrap();

    // THEN the partitions are disjoint and ordered
    let only_current: Vec<&str> = result.only_in_current.iter().map(|i| i.gtu.title.as_str()).collect();
    assert_eq!(only_current, vec!["a", "z"]);
    assert_eq!(result.only_in_comp.len(), 1);
    assert_eq!(result.identical.len(), 1);
    assert_eq!(result.total(), 4);
}

#[test]
fn test_matching_ignores_uuid_and_case() {
    let a = validated_store("a", vec![Entry::new("Work", "Mail", "Bob", "p")]);
    let b = validated_store("b", vec![Entry::new("work", "mail", "bob", "p")]);

    let result = compare(&a, &b, &CompareOptions::default()).unwrap();

    assert_eq!(result.identical.len(), 1);
    assert_ne!(result.identical[0].uuid_current, result.identical[0].uuid_comp);
}

#[test]
fn test_alias_password_compared_through_base() {
    // GIVEN an alias in A whose base password differs from the plain entry in B
    let base = Entry::new("g", "base", "", "base-pw");
    let alias = Entry::new("g", "alias", "", "").into_dependent(base.uuid, DependentKind::Alias);
    let a = validated_store("a", vec![base.clone(), alias]);
    let b = validated_store(
        "b",
        vec![base, Entry::new("g", "alias", "", "base-pw")],
    );

    // WHEN comparing password only
    let options = CompareOptions {
        fields: FieldSet::empty().with(FieldType::Password),
        ..CompareOptions::default()
    };
    let result = compare(&a, &b, &options).unwrap();

    // THEN the alias matches the plain entry holding the same password
    assert!(result.is_identical());
}

#[test]
fn test_unknown_fields_flagged_not_diffed() {
    let plain = Entry::new("g", "t", "", "p");
    let mut odd = plain.clone();
    odd.unknown_fields.push(pwledger_core::model::UnknownField {
        code: 0x7f,
        data: vec![1, 2, 3],
    });
    let a = validated_store("a", vec![odd]);
    let b = validated_store("b", vec![plain]);

    let result = compare(&a, &b, &CompareOptions::default()).unwrap();

    assert_eq!(result.identical.len(), 1);
    assert!(result.identical[0].unknown_current);
    assert!(!result.identical[0].unknown_comp);
}

#[test]
fn test_subgroup_filter_restricts_both_sides() {
    let a = validated_store("a", sample());
    let b = validated_store("b", vec![Entry::new("Home", "tv", "", "")]);
    let options = CompareOptions {
        filter: Some(SubgroupFilter::new(FilterField::Group, MatchRule::Equals, "work")),
        ..CompareOptions::default()
    };

    let result = compare(&a, &b, &options).unwrap();

    assert_eq!(result.only_in_current.len(), 2);
    assert!(result.only_in_comp.is_empty());
}

#[test]
fn test_compare_requires_validated_stores() {
    let a = EntryStore::from_entries("a", sample(), vec![]).unwrap();
    let b = validated_store("b", sample());

    let result = compare(&a, &b, &CompareOptions::default());

    assert!(matches!(result, Err(VaultError::GtuNotValidated { .. })));
}

#[test]
fn test_report_for_identical_databases() {
    let a = validated_store("a", sample());
    let b = validated_store("b", sample());
    let result = compare(&a, &b, &CompareOptions::default()).unwrap();
    let mut sink = VecReport::new();

    write_report(&result, "a.psafe", "b.psafe", &mut sink);

    assert_eq!(sink.lines.len(), 2);
    assert_eq!(sink.lines[1], "Databases are identical (3 entries)");
}

#[test]
fn test_compare_after_edits_through_log() {
    // GIVEN a validated store taken through add, undo and redo
    let mut h = Harness::new();
    h.store.initialise_gtu().unwrap();
    let a = h.add("g", "a", "", "p");
    h.add("g", "b", "", "q");
    h.undo().unwrap();
    h.redo().unwrap();
    let other = validated_store("other", vec![Entry::new("g", "a", "", "p")]);

    // WHEN comparing it with another store
    let result = compare(&h.store, &other, &CompareOptions::default()).unwrap();

    // THEN the redone entry shows up as only in the current store
    assert_eq!(result.only_in_current.len(), 1);
    assert_eq!(result.only_in_current[0].gtu.title, "b");
    assert!(result.only_in_comp.is_empty());
    assert_eq!(result.total(), 2);
    assert!(result
        .conflicts
        .iter()
        .chain(&result.identical)
        .any(|item| item.uuid_current == Some(a)));
}
