pub mod entry;
pub mod field;
pub mod history;

pub use entry::{DependentKind, Entry, EntryType, Gtu, GtuKey, UnknownField};
pub use field::{FieldSet, FieldType, FieldValue};
pub use history::{HistoryEntry, PasswordHistory};
