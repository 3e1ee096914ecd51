use pwledger_core::errors::{ExError, ExErrorKind, VaultError};

#[test]
fn test_entry_not_found_verifiable_by_kind() {
    let err = VaultError::EntryNotFound {
        uuid: "e-unknown".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::EntryNotFound);
    assert_eq!(ex_err.code(), "ERR_ENTRY_NOT_FOUND");
    assert_eq!(ex_err.entity_id(), Some("e-unknown"));
}

#[test]
fn test_unvalidated_store_reports_duplicate_gtu_kind() {
    let err = VaultError::GtuNotValidated {
        store: "other".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::DuplicateGtu);
    assert_eq!(ex_err.entity_id(), Some("other"));
}

#[test]
fn test_base_has_dependents_is_referential() {
    let err = VaultError::BaseHasDependents {
        uuid: "b1".to_string(),
        count: 2,
    };

    assert_eq!(err.kind(), ExErrorKind::ReferentialIntegrity);
    assert!(ExError::from(err).message().contains("2 dependents"));
}

#[test]
fn test_locked_names_holder() {
    let err = VaultError::Locked {
        path: "/tmp/v.json".to_string(),
        holder: "bob@host:42".to_string(),
    };

    assert_eq!(err.to_string(), "/tmp/v.json is locked by bob@host:42");
    let ex_err: ExError = err.into();
    assert_eq!(ex_err.code(), "ERR_LOCKED");
    assert!(ex_err.message().contains("bob@host:42"));
}

#[test]
fn test_unwind_failure_carries_op() {
    let ex_err: ExError = VaultError::UnwindFailed {
        message: "boom".to_string(),
    }
    .into();

    assert_eq!(ex_err.kind(), ExErrorKind::Internal);
    assert_eq!(ex_err.op(), Some("multi_command_unwind"));
}

#[test]
fn test_io_error_converts() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");

    let err: VaultError = io.into();

    assert_eq!(err.kind(), ExErrorKind::Io);
}

#[test]
fn test_error_kind_code_mapping() {
    let kinds = vec![
        (ExErrorKind::DuplicateUuid, "ERR_DUPLICATE_UUID"),
        (ExErrorKind::EntryNotFound, "ERR_ENTRY_NOT_FOUND"),
        (ExErrorKind::DuplicateGtu, "ERR_DUPLICATE_GTU"),
        (ExErrorKind::ReferentialIntegrity, "ERR_REFERENTIAL_INTEGRITY"),
        (ExErrorKind::CapacityExceeded, "ERR_CAPACITY_EXCEEDED"),
        (ExErrorKind::NothingToUndo, "ERR_NOTHING_TO_UNDO"),
        (ExErrorKind::Authentication, "ERR_AUTHENTICATION"),
        (ExErrorKind::Corrupt, "ERR_CORRUPT"),
        (ExErrorKind::Io, "ERR_IO"),
        (ExErrorKind::Locked, "ERR_LOCKED"),
    ];

    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
    }
}

#[test]
fn test_display_includes_code_op_and_entity() {
    let ex_err = ExError::new(ExErrorKind::EntryNotFound)
        .with_op("entry_delete")
        .with_entity_id("e1")
        .with_message("Entry not found");

    assert_eq!(
        ex_err.to_string(),
        "[ERR_ENTRY_NOT_FOUND] in operation 'entry_delete': Entry not found (entity_id: e1)"
    );
}
