//! Request-scoped holder of computed filter variables

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Variable holding the performer's groups before any degroup
pub const USER_GROUPS_VAR: &str = "user_groups";

/// Value of a filter variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

/// Variables computed while evaluating filters for one request.
///
/// Clones share the same storage, so values a consequence writes are visible
/// to the caller that built the executor.
#[derive(Debug, Clone, Default)]
pub struct VariableHolder {
    vars: Arc<DashMap<String, VarValue>>,
}

impl VariableHolder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<VarValue> {
        self.vars.get(name).map(|entry| entry.value().clone())
    }

    pub fn set(&self, name: impl Into<String>, value: VarValue) {
        self.vars.insert(name.into(), value);
    }

    /// Captured groups of the performer, if they were computed
    #[must_use]
    pub fn user_groups(&self) -> Option<Vec<String>> {
        match self.get(USER_GROUPS_VAR) {
            Some(VarValue::List(groups)) => Some(groups),
            _ => None,
        }
    }

    pub fn set_user_groups(&self, groups: Vec<String>) {
        self.set(USER_GROUPS_VAR, VarValue::List(groups));
    }

    /// Copy of every variable, for logging alongside the executed actions
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, VarValue> {
        self.vars
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let vars = VariableHolder::new();
        let shared = vars.clone();

        assert!(vars.user_groups().is_none());
        shared.set_user_groups(vec!["sysop".to_string(), "*".to_string()]);
        assert_eq!(
            vars.user_groups(),
            Some(vec!["sysop".to_string(), "*".to_string()])
        );
    }

    #[test]
    fn test_user_groups_requires_list() {
        let vars = VariableHolder::new();
        vars.set(USER_GROUPS_VAR, VarValue::Str("sysop".to_string()));
        assert!(vars.user_groups().is_none());
    }

    #[test]
    fn test_snapshot_serialization() {
        let vars = VariableHolder::new();
        vars.set("user_editcount", VarValue::Int(12));
        vars.set_user_groups(vec!["autoconfirmed".to_string()]);

        let yaml = serde_yaml::to_string(&vars.snapshot()).expect("Failed to serialize");
        assert!(yaml.contains("user_editcount: 12"));
        assert!(yaml.contains("- autoconfirmed"));

        let restored: BTreeMap<String, VarValue> =
            serde_yaml::from_str(&yaml).expect("Failed to deserialize");
        assert_eq!(restored, vars.snapshot());
    }
}
