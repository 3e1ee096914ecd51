//! Field synchronization between GTU-matched entries

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backends::ReportSink;
use crate::commands::Command;
use crate::compare::{passes, SubgroupFilter};
use crate::errors::Result;
use crate::model::{FieldSet, FieldType, Gtu};
use crate::store::EntryStore;

/// Outcome of planning a synchronize
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    /// `Multi` of one `EditRecord` per updated target entry
    pub command: Command,
    pub report: SyncReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Target entries that will change, ordered by GTU
    pub updated: Vec<(Uuid, Gtu)>,
    /// Matched target entries left alone because they are protected
    pub protected_skipped: usize,
    pub lines: Vec<String>,
}

impl SyncReport {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }
}

/// Fields synchronize may write: never identity, never attachment references
pub fn sync_fields(requested: FieldSet) -> FieldSet {
    let mut fields = requested.without_identity();
    fields.remove(FieldType::AttachmentRef);
    fields
}

/// Plan copying `fields` from `source` onto GTU-matched `target` entries
///
/// Source dependents and dependent targets are skipped, as are protected
/// targets. Only differing values are copied; an entry with nothing to copy
/// produces no command.
///
/// # Errors
///
/// `GtuNotValidated` when either store is not GTU-validated.
pub fn synchronize(
    target: &EntryStore,
    source: &EntryStore,
    fields: FieldSet,
    filter: Option<&SubgroupFilter>,
    sink: &mut dyn ReportSink,
) -> Result<SyncPlan> {
    target.require_validated()?;
    source.require_validated()?;

    let fields = sync_fields(fields);
    let mut report = SyncReport::default();
    let mut edits = Vec::new();

    for other in source
        .iter()
        .filter(|e| !e.is_dependent() && passes(filter, e))
    {
        let Some(current) = target.find_by_key(&other.gtu_key()) else {
            continue;
        };
        if current.is_dependent() {
            continue;
        }
        if current.protected {
            report.protected_skipped += 1;
            continue;
        }
        if current.uuid != other.uuid {
            tracing::debug!(
                entry_uuid = %current.uuid,
                source_uuid = %other.uuid,
                "synchronize: UUIDs differ for matched entry"
            );
        }

        let mut updated = current.clone();
        let mut touched = false;
        for field in fields.iter() {
            if other.field_value(field) != updated.field_value(field) {
                updated.copy_field_from(other, field)?;
                touched = true;
            }
        }
        if !touched {
            continue;
        }

        report.updated.push((current.uuid, current.gtu()));
        edits.push(Command::edit_record(current.clone(), updated));
    }

    if !report.updated.is_empty() {
        report.lines.push(format!(
            "The following {} entries were updated:",
            report.updated.len()
        ));
        report
            .lines
            .extend(report.updated.iter().map(|(_, gtu)| format!("\t{}", gtu)));
    }
    report.lines.push(format!(
        "Synchronize completed: {} entries updated",
        report.updated.len()
    ));
    for line in &report.lines {
        sink.write_line(line);
    }

    tracing::debug!(
        updated = report.updated.len(),
        protected_skipped = report.protected_skipped,
        fields = ?fields,
        "synchronize planned"
    );
    Ok(SyncPlan {
        command: Command::multi(edits),
        report,
    })
}
