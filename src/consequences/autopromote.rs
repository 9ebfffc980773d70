use crate::EXECUTOR_TARGET;
use crate::consequences::{
    AutopromoteBlockStore, ConsequenceResult, HookAborter, Message, Parameters, Reversible,
    UserRef,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Suspend automatic promotion of the performer for a while
pub struct BlockAutopromote {
    parameters: Arc<Parameters>,
    duration_seconds: u64,
    store: Arc<dyn AutopromoteBlockStore>,
}

impl BlockAutopromote {
    pub(crate) fn new(
        parameters: Arc<Parameters>,
        duration_seconds: u64,
        store: Arc<dyn AutopromoteBlockStore>,
    ) -> Self {
        Self {
            parameters,
            duration_seconds,
            store,
        }
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// # Errors
    ///
    /// Returns an error if the autopromote store fails.
    pub async fn execute(&self) -> ConsequenceResult<bool> {
        let user = self.parameters.user();
        if !user.is_registered() {
            return Ok(false);
        }

        let reason = format!(
            "Autopromotion automatically delayed by abuse filter. Rule description: {}",
            self.parameters.filter().name
        );
        let blocked = self
            .store
            .block_autopromote(user, &reason, self.duration_seconds)
            .await?;
        if blocked {
            info!(
                target: EXECUTOR_TARGET,
                user = %user.name,
                filter = %self.parameters.filter_ref(),
                duration_seconds = self.duration_seconds,
                "Autopromotion blocked"
            );
        }
        Ok(blocked)
    }
}

impl HookAborter for BlockAutopromote {
    fn message(&self) -> Message {
        let [name, global_name] = self.parameters.message_params();
        Message::new(
            "abusefilter-autopromote-blocked",
            [name, global_name, self.duration_seconds.to_string()],
        )
    }
}

#[async_trait]
impl Reversible for BlockAutopromote {
    type Info = ();

    async fn revert(&self, _info: (), performer: &UserRef, reason: &str) -> ConsequenceResult<bool> {
        Ok(self
            .store
            .unblock_autopromote(self.parameters.user(), performer, reason)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consequences::test_support::{
        anonymous_specifier, parameters_for, registered_specifier,
    };
    use crate::consequences::{FilterRef, MockAutopromoteBlockStore};

    #[tokio::test]
    async fn test_execute_delegates_to_store() {
        let mut store = MockAutopromoteBlockStore::new();
        store
            .expect_block_autopromote()
            .withf(|user, reason, duration| {
                user.name == "Alice" && reason.ends_with("Filter 4") && *duration == 432_000
            })
            .times(1)
            .returning(|_, _, _| Ok(true));

        let consequence = BlockAutopromote::new(
            parameters_for(FilterRef::global(4), registered_specifier()),
            432_000,
            Arc::new(store),
        );

        assert!(consequence.execute().await.unwrap());
        assert_eq!(
            consequence.message(),
            Message::new(
                "abusefilter-autopromote-blocked",
                ["Filter 4", "global-4", "432000"]
            )
        );
    }

    #[tokio::test]
    async fn test_anonymous_is_not_executed() {
        let mut store = MockAutopromoteBlockStore::new();
        store.expect_block_autopromote().never();

        let consequence = BlockAutopromote::new(
            parameters_for(FilterRef::local(4), anonymous_specifier()),
            60,
            Arc::new(store),
        );
        assert!(!consequence.execute().await.unwrap());
    }

    #[tokio::test]
    async fn test_revert_unblocks() {
        let mut store = MockAutopromoteBlockStore::new();
        store
            .expect_unblock_autopromote()
            .withf(|user, performer, reason| {
                user.name == "Alice" && performer.name == "Admin" && reason == "appeal"
            })
            .times(1)
            .returning(|_, _, _| Ok(true));

        let consequence = BlockAutopromote::new(
            parameters_for(FilterRef::local(4), registered_specifier()),
            60,
            Arc::new(store),
        );
        let admin = UserRef::registered(9, "Admin");
        assert!(consequence.revert((), &admin, "appeal").await.unwrap());
    }
}
