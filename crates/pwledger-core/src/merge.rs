//! One-way import of entries from another store
//!
//! `merge` only plans: it reads both stores and returns a single
//! `Command::Multi` that the caller runs through its `TransactionLog`, so the
//! whole import undoes in one step.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backends::ReportSink;
use crate::clock::{compact_timestamp, Clock};
use crate::commands::{Command, PolicyAction};
use crate::compare::{diff_fields, passes, SubgroupFilter};
use crate::config::CoreConfig;
use crate::errors::Result;
use crate::model::{DependentKind, Entry, FieldSet, FieldType, Gtu, GtuKey};
use crate::store::EntryStore;

/// Fields that must agree for a GTU match to count as the same entry
pub fn merge_fields() -> FieldSet {
    [
        FieldType::Password,
        FieldType::Notes,
        FieldType::Url,
        FieldType::Autotype,
        FieldType::PasswordHistory,
        FieldType::Policy,
        FieldType::XTime,
        FieldType::XTimeInterval,
        FieldType::RunCommand,
        FieldType::Dca,
        FieldType::Email,
        FieldType::Symbols,
        FieldType::ShiftDca,
        FieldType::PolicyName,
    ]
    .into_iter()
    .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Applied to source entries; dependents follow their base
    pub filter: Option<SubgroupFilter>,
}

/// Counts and report lines for one merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Non-dependents imported under their own title
    pub added: usize,
    /// Non-dependents imported under a disambiguated title
    pub renamed: usize,
    /// Entries already present with identical content (or already linked)
    pub identical: usize,
    pub aliases: usize,
    pub shortcuts: usize,
    /// Dependents that could not be imported
    pub skipped: usize,
    /// Named policies copied from the source under their own name
    #[serde(default)]
    pub policies_added: usize,
    /// Named policies copied under a new name because the target's differs
    #[serde(default)]
    pub policies_renamed: usize,
    /// Policy names that resolve in neither store, dropped from imports
    #[serde(default)]
    pub policies_cleared: usize,
    pub lines: Vec<String>,
}

impl MergeReport {
    pub fn total_imported(&self) -> usize {
        self.added + self.renamed + self.aliases + self.shortcuts
    }

    pub fn summary(&self) -> String {
        format!(
            "Merge completed: {} entries imported ({} renamed), {} aliases, {} shortcuts, {} identical, {} skipped",
            self.total_imported(),
            self.renamed,
            self.aliases,
            self.shortcuts,
            self.identical,
            self.skipped
        )
    }
}

/// The command to execute plus what it will do
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub command: Command,
    pub report: MergeReport,
}

/// Where a source base ended up in the target
#[derive(Debug, Clone, Copy)]
struct Placed {
    target_uuid: Uuid,
    renamed: bool,
}

/// Planning state threaded through both passes
struct Planner<'a> {
    target: &'a EntryStore,
    source: &'a EntryStore,
    title_suffix: String,
    taken_keys: HashSet<GtuKey>,
    taken_uuids: HashSet<Uuid>,
    /// Kind of dependents each target base will carry after the merge
    base_kinds: HashMap<Uuid, DependentKind>,
    commands: Vec<Command>,
    /// Policy name as referenced in the source → name used in the target
    policy_names: HashMap<String, String>,
    policy_commands: Vec<Command>,
    report: MergeReport,
    added_lines: Vec<(GtuKey, String)>,
    renamed_lines: Vec<(GtuKey, String)>,
    dependent_lines: Vec<(GtuKey, String)>,
    skipped_lines: Vec<(GtuKey, String)>,
    policy_lines: Vec<(String, String)>,
}

impl Planner<'_> {
    fn gtu_taken(&self, key: &GtuKey) -> bool {
        self.target.gtu_in_use(key) || self.taken_keys.contains(key)
    }

    fn fresh_uuid(&mut self, uuid: Uuid) -> Uuid {
        let mut chosen = uuid;
        while self.target.contains(chosen) || self.taken_uuids.contains(&chosen) {
            chosen = Uuid::new_v4();
        }
        self.taken_uuids.insert(chosen);
        chosen
    }

    fn policy_taken(&self, name: &str) -> bool {
        self.target.policy(name).is_some() || self.policy_names.values().any(|n| n == name)
    }

    /// Name an imported entry should carry for the source's `name`
    ///
    /// - only in the source, or in both with different settings: the source
    ///   policy is added to the target (under a suffixed name when the
    ///   target's own differs)
    /// - in both with the same settings, or only in the target: kept
    /// - in neither: cleared
    fn resolve_policy(&mut self, name: &str) -> String {
        if name.is_empty() {
            return String::new();
        }
        if let Some(resolved) = self.policy_names.get(name) {
            return resolved.clone();
        }

        let (target, source) = (self.target, self.source);
        let resolved = match (target.policy(name), source.policy(name)) {
            (Some(_), None) => name.to_string(),
            (Some(mine), Some(theirs)) if mine == theirs => name.to_string(),
            (None, None) => {
                self.report.policies_cleared += 1;
                self.policy_lines
                    .push((name.to_string(), format!("{} (reference cleared)", name)));
                String::new()
            }
            (None, Some(theirs)) => {
                self.report.policies_added += 1;
                self.policy_lines
                    .push((name.to_string(), format!("{} (added)", name)));
                self.policy_commands.push(Command::policy(PolicyAction::Add {
                    name: name.to_string(),
                    policy: theirs.to_string(),
                }));
                name.to_string()
            }
            (Some(_), Some(theirs)) => {
                let stamped = format!("{}{}", name, self.title_suffix);
                let mut candidate = stamped.clone();
                let mut n = 2usize;
                while self.policy_taken(&candidate) {
                    candidate = format!("{} ({})", stamped, n);
                    n += 1;
                }
                self.report.policies_renamed += 1;
                self.policy_lines.push((
                    name.to_string(),
                    format!("{} -> {} (renamed)", name, candidate),
                ));
                self.policy_commands.push(Command::policy(PolicyAction::Add {
                    name: candidate.clone(),
                    policy: theirs.to_string(),
                }));
                candidate
            }
        };
        self.policy_names.insert(name.to_string(), resolved.clone());
        resolved
    }

    fn import_copy(&mut self, source: &Entry, title: String) -> Entry {
        let mut copy = source.clone();
        copy.uuid = self.fresh_uuid(source.uuid);
        copy.title = title;
        copy.policy_name = self.resolve_policy(&source.policy_name);
        copy.base_uuid = None;
        copy.entry_type = Default::default();
        if copy.attachment_ref.take().is_some() {
            tracing::debug!(entry_uuid = %source.uuid, "attachment not carried by merge");
        }
        copy
    }

    fn place_base(&mut self, entry: &Entry) -> Placed {
        let target = self.target;
        let key = entry.gtu_key();
        let existing = target.find_by_key(&key);

        // A target alias or shortcut cannot stand in for a base
        if let Some(current) = existing.filter(|e| !e.is_dependent()) {
            let diffs = diff_fields(target, current, self.source, entry, merge_fields(), false);
            if diffs.is_empty() {
                self.report.identical += 1;
                return Placed {
                    target_uuid: current.uuid,
                    renamed: false,
                };
            }
        }

        if existing.is_none() && !self.taken_keys.contains(&key) {
            let copy = self.import_copy(entry, entry.title.clone());
            let placed = Placed {
                target_uuid: copy.uuid,
                renamed: false,
            };
            self.taken_keys.insert(key.clone());
            self.added_lines.push((key, copy.gtu().to_string()));
            self.commands.push(Command::add(copy));
            self.report.added += 1;
            return placed;
        }

        let stamped = format!("{}{}", entry.title, self.title_suffix);
        let title = target.unique_title(&entry.group, &stamped, &entry.user, &self.taken_keys);
        let copy = self.import_copy(entry, title);
        let placed = Placed {
            target_uuid: copy.uuid,
            renamed: true,
        };
        let new_key = copy.gtu_key();
        self.taken_keys.insert(new_key);
        tracing::debug!(from = %entry.gtu(), to = %copy.gtu(), "merge rename");
        self.renamed_lines
            .push((key, format!("{} -> {}", entry.gtu(), copy.gtu())));
        self.commands.push(Command::add(copy));
        self.report.renamed += 1;
        placed
    }

    fn skip_dependent(&mut self, dep: &Entry, reason: &str) {
        self.report.skipped += 1;
        self.skipped_lines
            .push((dep.gtu_key(), format!("{} ({})", dep.gtu(), reason)));
    }

    fn place_dependent(&mut self, dep: &Entry, kind: DependentKind, base: Placed) {
        let current_kind = self
            .base_kinds
            .get(&base.target_uuid)
            .copied()
            .or_else(|| {
                self.target
                    .find(base.target_uuid)
                    .and_then(|b| b.entry_type.carried_kind())
            });
        if current_kind.is_some_and(|k| k != kind) {
            self.skip_dependent(dep, "base already carries the other dependent kind");
            return;
        }

        let title = if base.renamed {
            format!("{}{}", dep.title, self.title_suffix)
        } else {
            dep.title.clone()
        };
        let key = Gtu::new(dep.group.clone(), title.clone(), dep.user.clone()).key();
        let already_linked = self.target.find_by_key(&key).is_some_and(|e| {
            e.base_uuid == Some(base.target_uuid) && e.entry_type == kind.dependent_type()
        });
        if already_linked {
            self.report.identical += 1;
            return;
        }
        if self.gtu_taken(&key) {
            self.skip_dependent(dep, "group/title/user already in use");
            return;
        }

        let copy = self
            .import_copy(dep, title)
            .into_dependent(base.target_uuid, kind);
        self.taken_keys.insert(key.clone());
        self.base_kinds.insert(base.target_uuid, kind);
        let label = match kind {
            DependentKind::Alias => {
                self.report.aliases += 1;
                "alias"
            }
            DependentKind::Shortcut => {
                self.report.shortcuts += 1;
                "shortcut"
            }
        };
        self.dependent_lines
            .push((key, format!("{} ({})", copy.gtu(), label)));
        self.commands.push(Command::add(copy));
    }

    fn finish(mut self, sink: &mut dyn ReportSink) -> MergePlan {
        let sections = [
            ("Added", std::mem::take(&mut self.added_lines)),
            ("Renamed on conflict", std::mem::take(&mut self.renamed_lines)),
            ("Dependents added", std::mem::take(&mut self.dependent_lines)),
            ("Skipped", std::mem::take(&mut self.skipped_lines)),
        ];
        for (heading, mut lines) in sections {
            if lines.is_empty() {
                continue;
            }
            lines.sort();
            self.report.lines.push(format!("{}:", heading));
            self.report
                .lines
                .extend(lines.into_iter().map(|(_, l)| format!("\t{}", l)));
        }
        let mut policy_lines = std::mem::take(&mut self.policy_lines);
        if !policy_lines.is_empty() {
            policy_lines.sort();
            self.report.lines.push("Password policies:".to_string());
            self.report
                .lines
                .extend(policy_lines.into_iter().map(|(_, l)| format!("\t{}", l)));
        }
        self.report.lines.push(self.report.summary());
        for line in &self.report.lines {
            sink.write_line(line);
        }

        // Policy adds precede the entries that refer to them
        let mut commands = std::mem::take(&mut self.policy_commands);
        commands.append(&mut self.commands);
        MergePlan {
            command: Command::multi(commands),
            report: self.report,
        }
    }
}

/// Plan an import of `source` entries into `target`
///
/// - GTU absent from target: imported as is (fresh UUID on a UUID clash).
/// - GTU present with identical content: skipped and counted.
/// - GTU present with different content, or held by a target alias or
///   shortcut: imported with the title suffixed
///   `<rename_suffix>-YYYYMMDD-HHMMSS`, then ` (N)` until free.
/// - A named policy an import refers to is copied ahead of it, under a
///   suffixed name when the target's policy of that name differs. A name
///   neither store defines is cleared.
/// - Dependents are planned right after their base, link to the base's
///   target UUID and take the same suffix when the base was renamed. One
///   whose GTU is still in use is skipped and reported.
///
/// # Errors
///
/// `GtuNotValidated` when either store is not GTU-validated. Nothing is
/// planned in that case.
pub fn merge(
    target: &EntryStore,
    source: &EntryStore,
    options: &MergeOptions,
    config: &CoreConfig,
    clock: &dyn Clock,
    sink: &mut dyn ReportSink,
) -> Result<MergePlan> {
    target.require_validated()?;
    source.require_validated()?;

    let mut planner = Planner {
        target,
        source,
        title_suffix: format!(
            "{}-{}",
            config.merge.rename_suffix,
            compact_timestamp(clock.now())
        ),
        taken_keys: HashSet::new(),
        taken_uuids: HashSet::new(),
        base_kinds: HashMap::new(),
        commands: Vec::new(),
        policy_names: HashMap::new(),
        policy_commands: Vec::new(),
        report: MergeReport::default(),
        added_lines: Vec::new(),
        renamed_lines: Vec::new(),
        dependent_lines: Vec::new(),
        skipped_lines: Vec::new(),
        policy_lines: Vec::new(),
    };

    let filter = options.filter.as_ref();
    let mut placed_bases: HashMap<Uuid, Placed> = HashMap::new();
    for entry in source
        .iter()
        .filter(|e| !e.is_dependent() && passes(filter, e))
    {
        let placed = planner.place_base(entry);
        placed_bases.insert(entry.uuid, placed);
        for kind in [DependentKind::Alias, DependentKind::Shortcut] {
            for dep_uuid in source.dependents(entry.uuid, kind) {
                planner.place_dependent(source.get(dep_uuid)?, kind, placed);
            }
        }
    }

    // Dependents whose base was filtered out
    for dep in source.iter().filter(|e| e.is_dependent() && passes(filter, e)) {
        let base_placed = dep.base_uuid.is_some_and(|b| placed_bases.contains_key(&b));
        if !base_placed {
            planner.skip_dependent(dep, "base not imported");
        }
    }

    let plan = planner.finish(sink);
    tracing::debug!(
        added = plan.report.added,
        renamed = plan.report.renamed,
        identical = plan.report.identical,
        skipped = plan.report.skipped,
        "merge planned"
    );
    Ok(plan)
}
