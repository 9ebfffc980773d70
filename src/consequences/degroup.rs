//! Degroup consequence: strip the performer's explicit group memberships

use crate::EXECUTOR_TARGET;
use crate::consequences::{
    ConsequenceResult, GroupManager, HookAborter, Message, Parameters, Reversible, UserRef,
    VariableHolder,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Remove every explicit group of a registered performer
pub struct Degroup {
    parameters: Arc<Parameters>,
    vars: VariableHolder,
    group_manager: Arc<dyn GroupManager>,
    filter_user: UserRef,
}

impl Degroup {
    pub(crate) fn new(
        parameters: Arc<Parameters>,
        vars: VariableHolder,
        group_manager: Arc<dyn GroupManager>,
        filter_user: UserRef,
    ) -> Self {
        Self {
            parameters,
            vars,
            group_manager,
            filter_user,
        }
    }

    /// Groups are read from the variable holder so the exact removed set can
    /// be captured by the caller; they are computed and stored if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the group backend fails.
    pub async fn execute(&self) -> ConsequenceResult<bool> {
        let user = self.parameters.user();
        if !user.is_registered() {
            return Ok(false);
        }

        let groups = match self.vars.user_groups() {
            Some(groups) => groups,
            None => self.group_manager.effective_groups(user).await?,
        };
        self.vars.set_user_groups(groups.clone());

        let implicit = self.group_manager.implicit_groups();
        let to_remove: Vec<String> = groups
            .into_iter()
            .filter(|group| !implicit.contains(group))
            .collect();
        if to_remove.is_empty() {
            return Ok(false);
        }

        for group in &to_remove {
            self.group_manager.remove_from_group(user, group).await?;
        }

        info!(
            target: EXECUTOR_TARGET,
            performer = %self.filter_user.name,
            user = %user.name,
            old_groups = ?to_remove,
            reason = %format!(
                "Rights automatically stripped by abuse filter. Rule description: {}",
                self.parameters.filter().name
            ),
            "User rights changed"
        );
        Ok(true)
    }
}

impl HookAborter for Degroup {
    fn message(&self) -> Message {
        Message::new("abusefilter-degrouped", self.parameters.message_params())
    }
}

#[async_trait]
impl Reversible for Degroup {
    /// Groups captured in `user_groups` when the degroup ran
    type Info = Vec<String>;

    async fn revert(
        &self,
        captured_groups: Vec<String>,
        performer: &UserRef,
        reason: &str,
    ) -> ConsequenceResult<bool> {
        let user = self.parameters.user();
        let current = self.group_manager.user_groups(user).await?;
        let implicit = self.group_manager.implicit_groups();

        let mut added = Vec::new();
        for group in captured_groups
            .into_iter()
            .filter(|group| !implicit.contains(group) && !current.contains(group))
        {
            if self.group_manager.add_to_group(user, &group).await? {
                added.push(group);
            }
        }

        if added.is_empty() {
            return Ok(false);
        }

        info!(
            target: EXECUTOR_TARGET,
            performer = %performer.name,
            user = %user.name,
            new_groups = ?added,
            reason = %reason,
            "User rights restored"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consequences::test_support::{
        anonymous_specifier, parameters_for, registered_specifier,
    };
    use crate::consequences::{FilterRef, MockGroupManager};

    fn implicit() -> Vec<String> {
        vec!["*".to_string(), "user".to_string(), "autoconfirmed".to_string()]
    }

    #[tokio::test]
    async fn test_anonymous_users_are_not_degrouped() {
        let mut groups = MockGroupManager::new();
        groups.expect_effective_groups().never();
        groups.expect_remove_from_group().never();

        let degroup = Degroup::new(
            parameters_for(FilterRef::local(1), anonymous_specifier()),
            VariableHolder::new(),
            Arc::new(groups),
            UserRef::registered(1, "Abuse filter"),
        );
        assert!(!degroup.execute().await.unwrap());
    }

    #[tokio::test]
    async fn test_removes_explicit_groups_and_captures_them() {
        let mut groups = MockGroupManager::new();
        groups.expect_effective_groups().times(1).returning(|_| {
            Ok(vec![
                "*".to_string(),
                "user".to_string(),
                "sysop".to_string(),
                "bureaucrat".to_string(),
            ])
        });
        groups.expect_implicit_groups().returning(implicit);
        groups
            .expect_remove_from_group()
            .withf(|_, group| group == "sysop" || group == "bureaucrat")
            .times(2)
            .returning(|_, _| Ok(true));

        let vars = VariableHolder::new();
        let degroup = Degroup::new(
            parameters_for(FilterRef::local(1), registered_specifier()),
            vars.clone(),
            Arc::new(groups),
            UserRef::registered(1, "Abuse filter"),
        );

        assert!(degroup.execute().await.unwrap());
        assert_eq!(
            vars.user_groups(),
            Some(vec![
                "*".to_string(),
                "user".to_string(),
                "sysop".to_string(),
                "bureaucrat".to_string(),
            ])
        );
        assert_eq!(degroup.message().key, "abusefilter-degrouped");
    }

    #[tokio::test]
    async fn test_only_implicit_groups_is_not_executed() {
        let mut groups = MockGroupManager::new();
        groups.expect_implicit_groups().returning(implicit);
        groups.expect_remove_from_group().never();

        let vars = VariableHolder::new();
        vars.set_user_groups(vec!["*".to_string(), "user".to_string()]);

        let degroup = Degroup::new(
            parameters_for(FilterRef::local(1), registered_specifier()),
            vars,
            Arc::new(groups),
            UserRef::registered(1, "Abuse filter"),
        );
        assert!(!degroup.execute().await.unwrap());
    }

    #[tokio::test]
    async fn test_revert_skips_current_and_implicit_groups() {
        let mut groups = MockGroupManager::new();
        groups
            .expect_user_groups()
            .returning(|_| Ok(vec!["rollbacker".to_string()]));
        groups.expect_implicit_groups().returning(implicit);
        groups
            .expect_add_to_group()
            .withf(|_, group| group == "sysop")
            .times(1)
            .returning(|_, _| Ok(true));

        let degroup = Degroup::new(
            parameters_for(FilterRef::local(1), registered_specifier()),
            VariableHolder::new(),
            Arc::new(groups),
            UserRef::registered(1, "Abuse filter"),
        );

        let captured = vec!["*".to_string(), "sysop".to_string(), "rollbacker".to_string()];
        let admin = UserRef::registered(9, "Admin");
        assert!(degroup.revert(captured, &admin, "false positive").await.unwrap());
    }

    #[tokio::test]
    async fn test_revert_with_nothing_to_add() {
        let mut groups = MockGroupManager::new();
        groups.expect_user_groups().returning(|_| Ok(vec!["sysop".to_string()]));
        groups.expect_implicit_groups().returning(implicit);
        groups.expect_add_to_group().never();

        let degroup = Degroup::new(
            parameters_for(FilterRef::local(1), registered_specifier()),
            VariableHolder::new(),
            Arc::new(groups),
            UserRef::registered(1, "Abuse filter"),
        );

        let admin = UserRef::registered(9, "Admin");
        assert!(!degroup.revert(vec!["sysop".to_string()], &admin, "").await.unwrap());
    }
}
