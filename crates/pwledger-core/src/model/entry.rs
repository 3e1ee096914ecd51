use pwledger_core_types::Sensitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::field::{FieldType, FieldValue};
use super::history::PasswordHistory;
use crate::errors::{Result, VaultError};

/// Structural role of an entry in the base/dependent graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntryType {
    #[default]
    Normal,
    AliasBase,
    Alias,
    ShortcutBase,
    Shortcut,
}

impl EntryType {
    pub fn is_dependent(self) -> bool {
        matches!(self, EntryType::Alias | EntryType::Shortcut)
    }

    pub fn is_base(self) -> bool {
        matches!(self, EntryType::AliasBase | EntryType::ShortcutBase)
    }

    /// Dependent kind for a dependent type
    pub fn dependent_kind(self) -> Option<DependentKind> {
        match self {
            EntryType::Alias => Some(DependentKind::Alias),
            EntryType::Shortcut => Some(DependentKind::Shortcut),
            _ => None,
        }
    }

    /// Kind of dependents a base type carries
    pub fn carried_kind(self) -> Option<DependentKind> {
        match self {
            EntryType::AliasBase => Some(DependentKind::Alias),
            EntryType::ShortcutBase => Some(DependentKind::Shortcut),
            _ => None,
        }
    }
}

/// The two flavours of dependent
///
/// An alias borrows only the password of its base; a shortcut borrows
/// everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DependentKind {
    Alias,
    Shortcut,
}

impl DependentKind {
    pub fn dependent_type(self) -> EntryType {
        match self {
            DependentKind::Alias => EntryType::Alias,
            DependentKind::Shortcut => EntryType::Shortcut,
        }
    }

    pub fn base_type(self) -> EntryType {
        match self {
            DependentKind::Alias => EntryType::AliasBase,
            DependentKind::Shortcut => EntryType::ShortcutBase,
        }
    }
}

/// A record field the backend did not recognise, preserved byte-for-byte
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownField {
    pub code: u8,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Group/title/user triple as stored
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gtu {
    pub group: String,
    pub title: String,
    pub user: String,
}

impl Gtu {
    pub fn new(group: impl Into<String>, title: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            title: title.into(),
            user: user.into(),
        }
    }

    /// Case-folded lookup key
    pub fn key(&self) -> GtuKey {
        GtuKey {
            group: self.group.to_lowercase(),
            title: self.title.to_lowercase(),
            user: self.user.to_lowercase(),
        }
    }
}

impl fmt::Display for Gtu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] [{}]", self.group, self.title, self.user)
    }
}

/// Normalized GTU used for case-insensitive matching and ordering
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GtuKey {
    pub group: String,
    pub title: String,
    pub user: String,
}

/// A credential record
///
/// `entry_type` of a non-dependent is owned by the store: it is derived from
/// the number of dependents attached, so any value set by the caller on a
/// base or normal entry is overwritten on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub uuid: Uuid,
    pub group: String,
    pub title: String,
    pub user: String,
    pub password: Sensitive<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub autotype: String,
    #[serde(default)]
    pub run_command: String,
    #[serde(default)]
    pub policy: String,
    #[serde(default)]
    pub policy_name: String,
    #[serde(default)]
    pub symbols: String,
    /// Double-click action, -1 = use default
    #[serde(default = "default_dca")]
    pub dca: i16,
    #[serde(default = "default_dca")]
    pub shift_dca: i16,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub ctime: i64,
    #[serde(default)]
    pub atime: i64,
    #[serde(default)]
    pub pmtime: i64,
    #[serde(default)]
    pub rmtime: i64,
    #[serde(default)]
    pub xtime: i64,
    /// Password lifetime in days, 0 = no automatic expiry
    #[serde(default)]
    pub xtime_interval: i32,
    #[serde(default)]
    pub entry_type: EntryType,
    #[serde(default)]
    pub base_uuid: Option<Uuid>,
    #[serde(default)]
    pub history: Option<PasswordHistory>,
    #[serde(default)]
    pub attachment_ref: Option<String>,
    #[serde(default)]
    pub unknown_fields: Vec<UnknownField>,
}

fn default_dca() -> i16 {
    -1
}

impl Entry {
    /// Create a normal entry with a fresh UUID
    pub fn new(
        group: impl Into<String>,
        title: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::with_uuid(Uuid::new_v4(), group, title, user, password)
    }

    pub fn with_uuid(
        uuid: Uuid,
        group: impl Into<String>,
        title: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            group: group.into(),
            title: title.into(),
            user: user.into(),
            password: Sensitive::new(password.into()),
            notes: String::new(),
            url: String::new(),
            email: String::new(),
            autotype: String::new(),
            run_command: String::new(),
            policy: String::new(),
            policy_name: String::new(),
            symbols: String::new(),
            dca: -1,
            shift_dca: -1,
            protected: false,
            ctime: 0,
            atime: 0,
            pmtime: 0,
            rmtime: 0,
            xtime: 0,
            xtime_interval: 0,
            entry_type: EntryType::Normal,
            base_uuid: None,
            history: None,
            attachment_ref: None,
            unknown_fields: Vec::new(),
        }
    }

    /// Turn this entry into a dependent of `base`
    pub fn into_dependent(mut self, base: Uuid, kind: DependentKind) -> Self {
        self.entry_type = kind.dependent_type();
        self.base_uuid = Some(base);
        self
    }

    pub fn gtu(&self) -> Gtu {
        Gtu::new(self.group.clone(), self.title.clone(), self.user.clone())
    }

    pub fn gtu_key(&self) -> GtuKey {
        self.gtu().key()
    }

    pub fn is_dependent(&self) -> bool {
        self.entry_type.is_dependent()
    }

    pub fn has_unknown_fields(&self) -> bool {
        !self.unknown_fields.is_empty()
    }

    /// Read one field as a typed value
    pub fn field_value(&self, field: FieldType) -> FieldValue {
        match field {
            FieldType::Group => FieldValue::Text(self.group.clone()),
            FieldType::Title => FieldValue::Text(self.title.clone()),
            FieldType::User => FieldValue::Text(self.user.clone()),
            FieldType::Notes => FieldValue::Text(self.notes.clone()),
            FieldType::Password => FieldValue::Secret(self.password.clone()),
            FieldType::CTime => FieldValue::Time(self.ctime),
            FieldType::PMTime => FieldValue::Time(self.pmtime),
            FieldType::ATime => FieldValue::Time(self.atime),
            FieldType::XTime => FieldValue::Time(self.xtime),
            FieldType::RMTime => FieldValue::Time(self.rmtime),
            FieldType::Url => FieldValue::Text(self.url.clone()),
            FieldType::Autotype => FieldValue::Text(self.autotype.clone()),
            FieldType::PasswordHistory => FieldValue::History(self.history.clone()),
            FieldType::Policy => FieldValue::Text(self.policy.clone()),
            FieldType::XTimeInterval => FieldValue::Days(self.xtime_interval),
            FieldType::RunCommand => FieldValue::Text(self.run_command.clone()),
            FieldType::Dca => FieldValue::Number(self.dca),
            FieldType::Email => FieldValue::Text(self.email.clone()),
            FieldType::Protected => FieldValue::Flag(self.protected),
            FieldType::Symbols => FieldValue::Text(self.symbols.clone()),
            FieldType::ShiftDca => FieldValue::Number(self.shift_dca),
            FieldType::PolicyName => FieldValue::Text(self.policy_name.clone()),
            FieldType::AttachmentRef => FieldValue::Reference(self.attachment_ref.clone()),
        }
    }

    /// Write one field from a typed value
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the value's kind does not fit the field.
    pub fn set_field(&mut self, field: FieldType, value: FieldValue) -> Result<()> {
        match (field, value) {
            (FieldType::Group, FieldValue::Text(v)) => self.group = v,
            (FieldType::Title, FieldValue::Text(v)) => self.title = v,
            (FieldType::User, FieldValue::Text(v)) => self.user = v,
            (FieldType::Notes, FieldValue::Text(v)) => self.notes = v,
            (FieldType::Password, FieldValue::Secret(v)) => self.password = v,
            (FieldType::CTime, FieldValue::Time(v)) => self.ctime = v,
            (FieldType::PMTime, FieldValue::Time(v)) => self.pmtime = v,
            (FieldType::ATime, FieldValue::Time(v)) => self.atime = v,
            (FieldType::XTime, FieldValue::Time(v)) => self.xtime = v,
            (FieldType::RMTime, FieldValue::Time(v)) => self.rmtime = v,
            (FieldType::Url, FieldValue::Text(v)) => self.url = v,
            (FieldType::Autotype, FieldValue::Text(v)) => self.autotype = v,
            (FieldType::PasswordHistory, FieldValue::History(v)) => self.history = v,
            (FieldType::Policy, FieldValue::Text(v)) => self.policy = v,
            (FieldType::XTimeInterval, FieldValue::Days(v)) => self.xtime_interval = v,
            (FieldType::RunCommand, FieldValue::Text(v)) => self.run_command = v,
            (FieldType::Dca, FieldValue::Number(v)) => self.dca = v,
            (FieldType::Email, FieldValue::Text(v)) => self.email = v,
            (FieldType::Protected, FieldValue::Flag(v)) => self.protected = v,
            (FieldType::Symbols, FieldValue::Text(v)) => self.symbols = v,
            (FieldType::ShiftDca, FieldValue::Number(v)) => self.shift_dca = v,
            (FieldType::PolicyName, FieldValue::Text(v)) => self.policy_name = v,
            (FieldType::AttachmentRef, FieldValue::Reference(v)) => self.attachment_ref = v,
            (field, value) => {
                return Err(VaultError::InvalidInput {
                    reason: format!(
                        "field '{}' cannot hold a {} value",
                        field,
                        value.kind_name()
                    ),
                })
            }
        }
        Ok(())
    }

    /// Copy one field from another entry
    pub fn copy_field_from(&mut self, other: &Entry, field: FieldType) -> Result<()> {
        self.set_field(field, other.field_value(field))
    }
}
