//! Field identities, field sets and typed field values
//!
//! `FieldType` discriminants follow the record type codes of the vault
//! format so a `FieldSet` bitset can be persisted or logged as a number and
//! still mean the same thing to other tools.

use pwledger_core_types::Sensitive;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::history::PasswordHistory;

/// Every addressable entry field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum FieldType {
    Group = 0x02,
    Title = 0x03,
    User = 0x04,
    Notes = 0x05,
    Password = 0x06,
    CTime = 0x07,
    PMTime = 0x08,
    ATime = 0x09,
    XTime = 0x0a,
    RMTime = 0x0c,
    Url = 0x0d,
    Autotype = 0x0e,
    PasswordHistory = 0x0f,
    Policy = 0x10,
    XTimeInterval = 0x11,
    RunCommand = 0x12,
    Dca = 0x13,
    Email = 0x14,
    Protected = 0x15,
    Symbols = 0x16,
    ShiftDca = 0x17,
    PolicyName = 0x18,
    AttachmentRef = 0x1a,
}

impl FieldType {
    /// All fields in code order
    pub const ALL: [FieldType; 23] = [
        FieldType::Group,
        FieldType::Title,
        FieldType::User,
        FieldType::Notes,
        FieldType::Password,
        FieldType::CTime,
        FieldType::PMTime,
        FieldType::ATime,
        FieldType::XTime,
        FieldType::RMTime,
        FieldType::Url,
        FieldType::Autotype,
        FieldType::PasswordHistory,
        FieldType::Policy,
        FieldType::XTimeInterval,
        FieldType::RunCommand,
        FieldType::Dca,
        FieldType::Email,
        FieldType::Protected,
        FieldType::Symbols,
        FieldType::ShiftDca,
        FieldType::PolicyName,
        FieldType::AttachmentRef,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Group, title and user identify an entry rather than describe it
    pub fn is_identity(self) -> bool {
        matches!(self, FieldType::Group | FieldType::Title | FieldType::User)
    }

    /// Free-text fields subject to whitespace-as-empty comparison
    pub fn is_whitespace_sensitive_text(self) -> bool {
        matches!(self, FieldType::Notes | FieldType::Url | FieldType::Autotype)
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::Group => "group",
            FieldType::Title => "title",
            FieldType::User => "user",
            FieldType::Notes => "notes",
            FieldType::Password => "password",
            FieldType::CTime => "ctime",
            FieldType::PMTime => "pmtime",
            FieldType::ATime => "atime",
            FieldType::XTime => "xtime",
            FieldType::RMTime => "rmtime",
            FieldType::Url => "url",
            FieldType::Autotype => "autotype",
            FieldType::PasswordHistory => "password_history",
            FieldType::Policy => "policy",
            FieldType::XTimeInterval => "xtime_interval",
            FieldType::RunCommand => "run_command",
            FieldType::Dca => "dca",
            FieldType::Email => "email",
            FieldType::Protected => "protected",
            FieldType::Symbols => "symbols",
            FieldType::ShiftDca => "shift_dca",
            FieldType::PolicyName => "policy_name",
            FieldType::AttachmentRef => "attachment_ref",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitset of `FieldType`s, bit position = field code
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(u32);

impl FieldSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every field except group/title/user
    pub fn all_content() -> Self {
        FieldType::ALL
            .iter()
            .filter(|f| !f.is_identity())
            .copied()
            .collect()
    }

    /// Every field
    pub fn all() -> Self {
        FieldType::ALL.iter().copied().collect()
    }

    pub fn with(mut self, field: FieldType) -> Self {
        self.insert(field);
        self
    }

    pub fn insert(&mut self, field: FieldType) {
        self.0 |= 1 << field.code();
    }

    pub fn remove(&mut self, field: FieldType) {
        self.0 &= !(1 << field.code());
    }

    pub fn contains(&self, field: FieldType) -> bool {
        self.0 & (1 << field.code()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Same set with group/title/user removed
    pub fn without_identity(mut self) -> Self {
        self.remove(FieldType::Group);
        self.remove(FieldType::Title);
        self.remove(FieldType::User);
        self
    }

    /// Members in code order
    pub fn iter(&self) -> impl Iterator<Item = FieldType> + '_ {
        FieldType::ALL.iter().copied().filter(|f| self.contains(*f))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl FromIterator<FieldType> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldType>>(iter: I) -> Self {
        let mut set = FieldSet::empty();
        for f in iter {
            set.insert(f);
        }
        set
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// A typed value for one field
///
/// `Secret` is used for the password so the value never prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Secret(Sensitive<String>),
    Time(i64),
    Days(i32),
    Number(i16),
    Flag(bool),
    History(Option<PasswordHistory>),
    Reference(Option<String>),
}

impl FieldValue {
    /// Text with whitespace-only collapsed to empty
    pub fn normalized_blank(&self) -> FieldValue {
        match self {
            FieldValue::Text(s) if s.trim().is_empty() => FieldValue::Text(String::new()),
            other => other.clone(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Secret(_) => "secret",
            FieldValue::Time(_) => "time",
            FieldValue::Days(_) => "days",
            FieldValue::Number(_) => "number",
            FieldValue::Flag(_) => "flag",
            FieldValue::History(_) => "history",
            FieldValue::Reference(_) => "reference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_set_membership() {
        let set = FieldSet::empty().with(FieldType::Password).with(FieldType::Url);
        assert!(set.contains(FieldType::Password));
        assert!(!set.contains(FieldType::Notes));
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![FieldType::Password, FieldType::Url]
        );
    }

    #[test]
    fn test_all_content_excludes_identity() {
        let set = FieldSet::all_content();
        assert!(!set.contains(FieldType::Group));
        assert!(!set.contains(FieldType::Title));
        assert!(!set.contains(FieldType::User));
        assert_eq!(set.len(), FieldType::ALL.len() - 3);
    }

    #[test]
    fn test_bits_follow_field_codes() {
        let set = FieldSet::empty().with(FieldType::Password);
        assert_eq!(set.bits(), 1 << 0x06);
    }

    #[test]
    fn test_normalized_blank() {
        assert_eq!(
            FieldValue::Text("  \t".into()).normalized_blank(),
            FieldValue::Text(String::new())
        );
        assert_eq!(FieldValue::Time(3).normalized_blank(), FieldValue::Time(3));
    }
}
