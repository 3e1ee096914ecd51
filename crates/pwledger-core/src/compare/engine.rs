//! Field-level comparison of two stores matched by GTU

use super::filter::{passes, SubgroupFilter};
use super::model::{CompareItem, CompareResult};
use crate::errors::Result;
use crate::model::{Entry, FieldSet, FieldType, FieldValue};
use crate::store::EntryStore;

/// Options for `compare`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOptions {
    /// Fields that count as a difference
    pub fields: FieldSet,
    pub filter: Option<SubgroupFilter>,
    /// Notes, URL and autotype consisting only of whitespace equal empty
    pub treat_whitespace_as_empty: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            fields: FieldSet::all_content(),
            filter: None,
            treat_whitespace_as_empty: true,
        }
    }
}

/// Value of `field` as compared: a dependent's password is its base's
fn compared_value(store: &EntryStore, entry: &Entry, field: FieldType, blank_ws: bool) -> FieldValue {
    let value = match field {
        FieldType::Password => FieldValue::Secret(store.effective_password(entry).clone()),
        other => entry.field_value(other),
    };
    if blank_ws && field.is_whitespace_sensitive_text() {
        value.normalized_blank()
    } else {
        value
    }
}

/// Tracked fields that differ between two matched entries
pub fn diff_fields(
    current: &EntryStore,
    a: &Entry,
    comp: &EntryStore,
    b: &Entry,
    fields: FieldSet,
    treat_whitespace_as_empty: bool,
) -> FieldSet {
    fields
        .iter()
        .filter(|f| {
            compared_value(current, a, *f, treat_whitespace_as_empty)
                != compared_value(comp, b, *f, treat_whitespace_as_empty)
        })
        .collect()
}

/// Compare `current` against `comp`
///
/// Both stores must be GTU-validated. The filter applies to both sides.
///
/// # Errors
///
/// `GtuNotValidated` when either store is not validated.
pub fn compare(
    current: &EntryStore,
    comp: &EntryStore,
    options: &CompareOptions,
) -> Result<CompareResult> {
    current.require_validated()?;
    comp.require_validated()?;

    let filter = options.filter.as_ref();
    let mut result = CompareResult::default();

    for a in current.iter().filter(|e| passes(filter, e)) {
        let Some(b) = comp.find_by_key(&a.gtu_key()) else {
            result.only_in_current.push(CompareItem {
                gtu: a.gtu(),
                uuid_current: Some(a.uuid),
                uuid_comp: None,
                diffs: FieldSet::empty(),
                unknown_current: a.has_unknown_fields(),
                unknown_comp: false,
            });
            continue;
        };

        let diffs = diff_fields(current, a, comp, b, options.fields, options.treat_whitespace_as_empty);
        let item = CompareItem {
            gtu: a.gtu(),
            uuid_current: Some(a.uuid),
            uuid_comp: Some(b.uuid),
            diffs,
            unknown_current: a.has_unknown_fields(),
            unknown_comp: b.has_unknown_fields(),
        };
        if diffs.is_empty() {
            result.identical.push(item);
        } else {
            result.conflicts.push(item);
        }
    }

    for b in comp.iter().filter(|e| passes(filter, e)) {
        if current.find_by_key(&b.gtu_key()).is_none() {
            result.only_in_comp.push(CompareItem {
                gtu: b.gtu(),
                uuid_current: None,
                uuid_comp: Some(b.uuid),
                diffs: FieldSet::empty(),
                unknown_current: false,
                unknown_comp: b.has_unknown_fields(),
            });
        }
    }

    tracing::debug!(
        only_in_current = result.only_in_current.len(),
        only_in_comp = result.only_in_comp.len(),
        conflicts = result.conflicts.len(),
        identical = result.identical.len(),
        "compare"
    );
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn validated(entries: Vec<Entry>) -> EntryStore {
        let mut store = EntryStore::from_entries("s", entries, vec![]).unwrap();
        store.initialise_gtu().unwrap();
        store
    }

    #[test]
    fn test_whitespace_notes_equal_empty_when_enabled() {
        let a = Entry::new("g", "t", "u", "p");
        let mut b = a.clone();
        b.notes = "  \n".to_string();
        let current = validated(vec![a]);
        let comp = validated(vec![b]);

        let lenient = compare(&current, &comp, &CompareOptions::default()).unwrap();
        let strict = compare(
            &current,
            &comp,
            &CompareOptions {
                treat_whitespace_as_empty: false,
                ..CompareOptions::default()
            },
        )
        .unwrap();

        assert!(lenient.is_identical());
        assert_eq!(strict.conflicts.len(), 1);
        assert!(strict.conflicts[0].diffs.contains(FieldType::Notes));
    }

    #[test]
    fn test_untracked_field_is_ignored() {
        let a = Entry::new("g", "t", "u", "p");
        let mut b = a.clone();
        b.url = "https://example.org".to_string();
        let options = CompareOptions {
            fields: FieldSet::empty().with(FieldType::Password),
            ..CompareOptions::default()
        };

        let result = compare(&validated(vec![a]), &validated(vec![b]), &options).unwrap();

        assert_eq!(result.identical.len(), 1);
    }
}
