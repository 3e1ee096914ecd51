//! Compare result types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{FieldSet, Gtu};

/// One row of a compare partition
///
/// `uuid_comp` and `diffs` are only meaningful for matched pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareItem {
    pub gtu: Gtu,
    pub uuid_current: Option<Uuid>,
    pub uuid_comp: Option<Uuid>,
    /// Tracked fields whose values differ
    pub diffs: FieldSet,
    /// The current-side entry carries fields this version does not model
    pub unknown_current: bool,
    pub unknown_comp: bool,
}

/// The four disjoint partitions, each ordered by normalized GTU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareResult {
    pub only_in_current: Vec<CompareItem>,
    pub only_in_comp: Vec<CompareItem>,
    pub conflicts: Vec<CompareItem>,
    pub identical: Vec<CompareItem>,
}

impl CompareResult {
    /// No entry is missing on either side and no pair conflicts
    pub fn is_identical(&self) -> bool {
        self.only_in_current.is_empty() && self.only_in_comp.is_empty() && self.conflicts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.only_in_current.len() + self.only_in_comp.len() + self.conflicts.len() + self.identical.len()
    }
}
