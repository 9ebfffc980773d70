//! Undoing consequences after the fact

use crate::EXECUTOR_TARGET;
use crate::config::EngineConfig;
use crate::consequences::{
    ActionType, ConsequenceError, ConsequenceResult, ConsequencesFactory, Expiry, Parameters,
    Reversible, UserRef, VariableHolder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// What a reversible consequence needs to be undone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RevertInfo {
    Block,
    /// Groups the user had when the degroup ran
    Degroup { user_groups: Vec<String> },
    BlockAutopromote,
}

impl RevertInfo {
    /// Revert information for a stored action name
    ///
    /// # Errors
    ///
    /// Returns `NotReversible` for actions that cannot be undone.
    pub fn for_action(name: &str, user_groups: Option<Vec<String>>) -> ConsequenceResult<Self> {
        match ActionType::from_name(name) {
            Some(ActionType::Block) => Ok(Self::Block),
            Some(ActionType::Degroup) => Ok(Self::Degroup {
                user_groups: user_groups.unwrap_or_default(),
            }),
            Some(ActionType::BlockAutopromote) => Ok(Self::BlockAutopromote),
            _ => Err(ConsequenceError::NotReversible(name.to_string())),
        }
    }

    #[must_use]
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Block => ActionType::Block,
            Self::Degroup { .. } => ActionType::Degroup,
            Self::BlockAutopromote => ActionType::BlockAutopromote,
        }
    }
}

/// Rebuilds reversible consequences and reverts them
pub struct ConsequencesReverter {
    factory: ConsequencesFactory,
    config: Arc<EngineConfig>,
}

impl ConsequencesReverter {
    #[must_use]
    pub fn new(factory: ConsequencesFactory, config: Arc<EngineConfig>) -> Self {
        Self { factory, config }
    }

    /// Undo one consequence. Returns whether anything was undone.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn revert_consequence(
        &self,
        parameters: Arc<Parameters>,
        info: RevertInfo,
        performer: &UserRef,
        reason: &str,
    ) -> ConsequenceResult<bool> {
        let action = info.action_type();
        let filter = parameters.filter_ref();

        let reverted = match info {
            RevertInfo::Block => {
                self.factory
                    .new_block(parameters, Expiry::Infinite, false)
                    .revert((), performer, reason)
                    .await?
            }
            RevertInfo::Degroup { user_groups } => {
                self.factory
                    .new_degroup(parameters, VariableHolder::new())
                    .revert(user_groups, performer, reason)
                    .await?
            }
            RevertInfo::BlockAutopromote => {
                self.factory
                    .new_block_autopromote(parameters, self.config.block_autopromote_seconds())
                    .revert((), performer, reason)
                    .await?
            }
        };

        info!(
            target: EXECUTOR_TARGET,
            filter = %filter,
            action = %action,
            performer = %performer.name,
            reverted,
            "Consequence revert finished"
        );
        Ok(reverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consequences::test_support::{Harness, parameters_for, registered_specifier};
    use crate::consequences::{FilterRef, GroupManager};

    #[test]
    fn test_revert_info_for_action() {
        assert_eq!(RevertInfo::for_action("block", None).unwrap(), RevertInfo::Block);
        assert_eq!(
            RevertInfo::for_action("degroup", Some(vec!["sysop".to_string()])).unwrap(),
            RevertInfo::Degroup {
                user_groups: vec!["sysop".to_string()]
            }
        );
        assert!(matches!(
            RevertInfo::for_action("rangeblock", None),
            Err(ConsequenceError::NotReversible(name)) if name == "rangeblock"
        ));
        assert!(matches!(
            RevertInfo::for_action("warn", None),
            Err(ConsequenceError::NotReversible(_))
        ));
    }

    #[tokio::test]
    async fn test_degroup_round_trip() {
        let harness = Harness::new(EngineConfig::default());
        harness.groups.set_groups("Alice", &["sysop", "bureaucrat"]);
        harness.add_filter(FilterRef::local(1), &[("degroup", &[])]);

        let vars = VariableHolder::new();
        harness
            .executor_with(registered_specifier(), vars.clone())
            .execute_filter_actions(&[FilterRef::local(1)])
            .await
            .unwrap();

        let alice = UserRef::registered(5, "Alice");
        assert!(harness.groups.user_groups(&alice).await.unwrap().is_empty());

        let info = RevertInfo::for_action("degroup", vars.user_groups()).unwrap();
        let admin = UserRef::registered(9, "Admin");
        let reverted = harness
            .reverter()
            .revert_consequence(
                parameters_for(FilterRef::local(1), registered_specifier()),
                info,
                &admin,
                "false positive",
            )
            .await
            .unwrap();

        assert!(reverted);
        let mut groups = harness.groups.user_groups(&alice).await.unwrap();
        groups.sort();
        assert_eq!(groups, vec!["bureaucrat", "sysop"]);
    }

    #[tokio::test]
    async fn test_block_round_trip() {
        let harness = Harness::new(EngineConfig::default());
        harness.add_filter(FilterRef::local(1), &[("block", &[])]);

        harness
            .executor(registered_specifier())
            .execute_filter_actions(&[FilterRef::local(1)])
            .await
            .unwrap();

        let admin = UserRef::registered(9, "Admin");
        let reverter = harness.reverter();
        let parameters = parameters_for(FilterRef::local(1), registered_specifier());

        assert!(
            reverter
                .revert_consequence(parameters.clone(), RevertInfo::Block, &admin, "appeal")
                .await
                .unwrap()
        );
        assert!(
            !reverter
                .revert_consequence(parameters, RevertInfo::Block, &admin, "appeal")
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_revert_info_yaml() {
        let info: RevertInfo =
            serde_yaml::from_str("action: degroup\nuser_groups: [sysop]\n").unwrap();
        assert_eq!(
            info,
            RevertInfo::Degroup {
                user_groups: vec!["sysop".to_string()]
            }
        );
        assert_eq!(info.action_type(), ActionType::Degroup);
    }
}
