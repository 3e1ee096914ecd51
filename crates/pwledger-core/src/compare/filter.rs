//! Subgroup filter applied to entries before compare, merge or synchronize

use serde::{Deserialize, Serialize};

use crate::model::Entry;

/// Entry attribute a filter tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Group,
    Title,
    User,
    /// `group.title`, or just the title for entries at the root
    GroupTitle,
    Url,
    Notes,
    Password,
    Email,
    RunCommand,
    Symbols,
    PolicyName,
    Autotype,
}

/// How the field value is matched against the pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Equals,
    NotEquals,
    BeginsWith,
    NotBeginsWith,
    EndsWith,
    NotEndsWith,
    Contains,
    NotContains,
    /// Field is non-empty; the pattern is ignored
    Present,
    /// Field is empty; the pattern is ignored
    NotPresent,
}

impl MatchRule {
    pub fn matches(self, value: &str, pattern: &str) -> bool {
        match self {
            MatchRule::Equals => value == pattern,
            MatchRule::NotEquals => value != pattern,
            MatchRule::BeginsWith => value.starts_with(pattern),
            MatchRule::NotBeginsWith => !value.starts_with(pattern),
            MatchRule::EndsWith => value.ends_with(pattern),
            MatchRule::NotEndsWith => !value.ends_with(pattern),
            MatchRule::Contains => value.contains(pattern),
            MatchRule::NotContains => !value.contains(pattern),
            MatchRule::Present => !value.is_empty(),
            MatchRule::NotPresent => value.is_empty(),
        }
    }
}

/// Restricts an operation to entries whose field matches a pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgroupFilter {
    pub field: FilterField,
    pub rule: MatchRule,
    pub pattern: String,
    pub case_sensitive: bool,
}

impl SubgroupFilter {
    pub fn new(field: FilterField, rule: MatchRule, pattern: impl Into<String>) -> Self {
        Self {
            field,
            rule,
            pattern: pattern.into(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Test the entry's own value for the filtered field
    pub fn matches(&self, entry: &Entry) -> bool {
        let value = field_text(entry, self.field);
        if self.case_sensitive {
            self.rule.matches(&value, &self.pattern)
        } else {
            self.rule
                .matches(&value.to_lowercase(), &self.pattern.to_lowercase())
        }
    }
}

/// `true` when there is no filter or the filter matches
pub fn passes(filter: Option<&SubgroupFilter>, entry: &Entry) -> bool {
    filter.map_or(true, |f| f.matches(entry))
}

fn field_text(entry: &Entry, field: FilterField) -> String {
    match field {
        FilterField::Group => entry.group.clone(),
        FilterField::Title => entry.title.clone(),
        FilterField::User => entry.user.clone(),
        FilterField::GroupTitle if entry.group.is_empty() => entry.title.clone(),
        FilterField::GroupTitle => format!("{}.{}", entry.group, entry.title),
        FilterField::Url => entry.url.clone(),
        FilterField::Notes => entry.notes.clone(),
        FilterField::Password => entry.password.expose().clone(),
        FilterField::Email => entry.email.clone(),
        FilterField::RunCommand => entry.run_command.clone(),
        FilterField::Symbols => entry.symbols.clone(),
        FilterField::PolicyName => entry.policy_name.clone(),
        FilterField::Autotype => entry.autotype.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_rules() {
        assert!(MatchRule::BeginsWith.matches("Work.Mail", "Work"));
        assert!(MatchRule::NotEndsWith.matches("Work.Mail", "Work"));
        assert!(MatchRule::Contains.matches("Work.Mail", "k.M"));
        assert!(MatchRule::Present.matches("x", "ignored"));
        assert!(MatchRule::NotPresent.matches("", "ignored"));
        assert!(!MatchRule::NotEquals.matches("a", "a"));
    }

    #[test]
    fn test_group_title_filter_is_case_insensitive_by_default() {
        let e = Entry::new("Work", "Mail", "bob", "pw");
        let f = SubgroupFilter::new(FilterField::GroupTitle, MatchRule::Equals, "work.mail");
        assert!(f.matches(&e));
        assert!(!f.clone().case_sensitive(true).matches(&e));
    }

    #[test]
    fn test_no_filter_passes_everything() {
        let e = Entry::new("", "t", "", "");
        assert!(passes(None, &e));
    }
}
