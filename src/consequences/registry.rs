//! Catalogue of action names and custom action factories

use crate::consequences::{ActionType, CustomConsequence, Parameters, RegistryError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

/// Builds a custom consequence from the filter's parameters and the stored
/// action parameters
pub type CustomFactory =
    Arc<dyn Fn(Arc<Parameters>, Vec<String>) -> Box<dyn CustomConsequence> + Send + Sync>;

/// Registry of built-in and extension-provided actions
#[derive(Clone)]
pub struct ConsequencesRegistry {
    configured_actions: BTreeMap<String, bool>,
    dangerous_actions: BTreeSet<String>,
    custom_actions: BTreeMap<String, CustomFactory>,
}

impl ConsequencesRegistry {
    /// Create a registry from the configured enabled/disabled map
    #[must_use]
    pub fn new(configured_actions: BTreeMap<String, bool>) -> Self {
        Self {
            configured_actions,
            dangerous_actions: ActionType::DANGEROUS
                .into_iter()
                .map(|action| action.as_str().to_string())
                .collect(),
            custom_actions: BTreeMap::new(),
        }
    }

    /// Register a custom action
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` if the name is empty, contains characters
    /// other than `[a-z0-9_-]`, is a built-in action or is already taken.
    pub fn register_custom_action(
        &mut self,
        name: &str,
        factory: CustomFactory,
    ) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if ActionType::from_name(name).is_some() {
            return Err(RegistryError::BuiltinName(name.to_string()));
        }
        if self.custom_actions.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        self.custom_actions.insert(name.to_string(), factory);
        info!(action = %name, "Registered custom action");
        Ok(())
    }

    /// Mark an action as dangerous, so that it suppresses `disallow`
    pub fn register_dangerous_action(&mut self, name: impl Into<String>) {
        self.dangerous_actions.insert(name.into());
    }

    /// Built-in and custom action names, enabled or not
    #[must_use]
    pub fn all_action_names(&self) -> BTreeSet<String> {
        ActionType::ALL
            .into_iter()
            .map(|action| action.as_str().to_string())
            .chain(self.custom_actions.keys().cloned())
            .collect()
    }

    /// Known action names minus the ones explicitly disabled in config
    #[must_use]
    pub fn all_enabled_action_names(&self) -> BTreeSet<String> {
        self.all_action_names()
            .into_iter()
            .filter(|name| self.configured_actions.get(name).copied().unwrap_or(true))
            .collect()
    }

    #[must_use]
    pub fn dangerous_action_names(&self) -> &BTreeSet<String> {
        &self.dangerous_actions
    }

    #[must_use]
    pub fn is_dangerous(&self, name: &str) -> bool {
        self.dangerous_actions.contains(name)
    }

    /// Factory of a registered custom action
    #[must_use]
    pub fn custom_action(&self, name: &str) -> Option<CustomFactory> {
        self.custom_actions.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consequences::ConsequenceResult;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl CustomConsequence for Noop {
        async fn execute(&mut self) -> ConsequenceResult<bool> {
            Ok(true)
        }
    }

    fn noop_factory() -> CustomFactory {
        Arc::new(
            |_: Arc<Parameters>, _: Vec<String>| -> Box<dyn CustomConsequence> { Box::new(Noop) },
        )
    }

    fn registry() -> ConsequencesRegistry {
        let configured = [("rangeblock", false), ("block", true)]
            .into_iter()
            .map(|(name, enabled)| (name.to_string(), enabled))
            .collect();
        ConsequencesRegistry::new(configured)
    }

    #[test]
    fn test_enabled_names() {
        let mut registry = registry();
        registry
            .register_custom_action("quarantine", noop_factory())
            .unwrap();

        let all = registry.all_action_names();
        assert!(all.contains("rangeblock"));
        assert!(all.contains("quarantine"));
        assert!(all.contains("tag"));

        let enabled = registry.all_enabled_action_names();
        assert!(!enabled.contains("rangeblock"));
        assert!(enabled.contains("block"));
        assert!(enabled.contains("quarantine"));
        assert!(registry.custom_action("quarantine").is_some());
        assert!(registry.custom_action("block").is_none());
    }

    #[test]
    fn test_configured_names_are_not_actions() {
        let configured = [("blok", true), ("haunt", false)]
            .into_iter()
            .map(|(name, enabled)| (name.to_string(), enabled))
            .collect();
        let registry = ConsequencesRegistry::new(configured);

        assert!(!registry.all_action_names().contains("blok"));
        assert!(!registry.all_enabled_action_names().contains("blok"));
        assert_eq!(
            registry.all_enabled_action_names().len(),
            ActionType::ALL.len()
        );
    }

    #[test]
    fn test_registration_validation() {
        let mut registry = registry();
        assert_eq!(
            registry.register_custom_action("", noop_factory()).unwrap_err(),
            RegistryError::EmptyName
        );
        assert_eq!(
            registry
                .register_custom_action("Quarantine!", noop_factory())
                .unwrap_err(),
            RegistryError::InvalidName("Quarantine!".to_string())
        );
        assert_eq!(
            registry
                .register_custom_action("block", noop_factory())
                .unwrap_err(),
            RegistryError::BuiltinName("block".to_string())
        );

        registry
            .register_custom_action("quarantine", noop_factory())
            .unwrap();
        assert_eq!(
            registry
                .register_custom_action("quarantine", noop_factory())
                .unwrap_err(),
            RegistryError::Duplicate("quarantine".to_string())
        );
    }

    #[test]
    fn test_dangerous_actions() {
        let mut registry = registry();
        for name in ["block", "blockautopromote", "degroup", "rangeblock"] {
            assert!(registry.is_dangerous(name));
        }
        assert!(!registry.is_dangerous("warn"));

        registry.register_dangerous_action("quarantine");
        assert!(registry.is_dangerous("quarantine"));
        assert_eq!(registry.dangerous_action_names().len(), 5);
    }
}
