//! Named password policy maintenance

use serde::{Deserialize, Serialize};

use super::Outcome;
use crate::errors::{Result, VaultError};
use crate::store::EntryStore;

/// Change to the store's named policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyAction {
    Add { name: String, policy: String },
    Update { name: String, policy: String },
    /// Refused while any entry still refers to the name
    Remove(String),
}

impl PolicyAction {
    fn name(&self) -> &str {
        match self {
            PolicyAction::Add { name, .. } | PolicyAction::Update { name, .. } => name,
            PolicyAction::Remove(name) => name,
        }
    }
}

/// Reversible edit of one named policy
#[derive(Debug, Clone, PartialEq)]
pub struct ManagePolicies {
    action: PolicyAction,
    /// Value held under the name before execute; `Some(None)` when absent
    prior: Option<Option<String>>,
}

impl ManagePolicies {
    pub fn new(action: PolicyAction) -> Self {
        Self {
            action,
            prior: None,
        }
    }

    pub fn action(&self) -> &PolicyAction {
        &self.action
    }

    pub(crate) fn execute(&mut self, store: &mut EntryStore) -> Result<Outcome> {
        let name = self.action.name().to_string();
        let invalid = |reason: String| VaultError::InvalidInput { reason };
        if name.is_empty() {
            return Err(invalid("empty policy name".to_string()));
        }
        let exists = store.policy(&name).is_some();

        let next = match &self.action {
            PolicyAction::Add { policy, .. } => {
                if exists {
                    return Err(invalid(format!("policy '{}' already exists", name)));
                }
                Some(policy.clone())
            }
            PolicyAction::Update { policy, .. } => {
                if !exists {
                    return Err(invalid(format!("no policy named '{}'", name)));
                }
                if store.policy(&name) == Some(policy.as_str()) {
                    self.prior = Some(Some(policy.clone()));
                    return Ok(Outcome::unchanged());
                }
                Some(policy.clone())
            }
            PolicyAction::Remove(_) => {
                if !exists {
                    return Err(invalid(format!("no policy named '{}'", name)));
                }
                let users = store.policy_users(&name);
                if users > 0 {
                    return Err(invalid(format!(
                        "policy '{}' is used by {} entries",
                        name, users
                    )));
                }
                None
            }
        };

        tracing::debug!(policy_name = %name, "manage policies");
        self.prior = Some(store.set_policy(&name, next));
        Ok(Outcome::touched(1))
    }

    pub(crate) fn undo(&mut self, store: &mut EntryStore) -> Result<()> {
        let prior = self.prior.take().ok_or_else(|| VaultError::Internal {
            message: "policy change undone before execute".to_string(),
        })?;
        store.set_policy(self.action.name(), prior);
        Ok(())
    }
}
