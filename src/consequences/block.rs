//! Blocking consequences
//!
//! `Block` blocks the performer; `RangeBlock` blocks the network the request
//! came from. Both are placed on behalf of the filter system user.

use crate::EXECUTOR_TARGET;
use crate::config::CidrLimits;
use crate::consequences::{
    BlockIssuer, BlockOptions, ConsequenceResult, Expiry, HookAborter, Message, Parameters,
    Reversible, UserRef,
};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use tracing::{info, warn};

const BLOCKED_MESSAGE: &str = "abusefilter-blocked-display";

/// Places and lifts blocks as the filter system user
#[derive(Clone)]
pub(crate) struct BlockPlacer {
    issuer: Arc<dyn BlockIssuer>,
    filter_user: UserRef,
}

impl BlockPlacer {
    pub(crate) fn new(issuer: Arc<dyn BlockIssuer>, filter_user: UserRef) -> Self {
        Self {
            issuer,
            filter_user,
        }
    }

    /// Place a block; a rejected placement is logged and reported as `false`
    async fn place(
        &self,
        parameters: &Parameters,
        target: &str,
        expiry: Expiry,
        is_autoblocking: bool,
        prevents_talk_edit: bool,
    ) -> bool {
        let reason = format!(
            "Automatically blocked by abuse filter. Description of matched rule: {}",
            parameters.filter().name
        );
        let options = BlockOptions {
            is_hard_block: false,
            is_autoblocking,
            is_create_account_blocked: true,
            is_user_talk_edit_blocked: prevents_talk_edit,
        };

        match self
            .issuer
            .place_block(target, &self.filter_user, expiry, &reason, options)
            .await
        {
            Ok(block) => {
                info!(
                    target: EXECUTOR_TARGET,
                    block_id = %block.id,
                    block_target = %target,
                    filter = %parameters.filter_ref(),
                    expiry = %expiry,
                    "Block placed"
                );
                true
            }
            Err(e) => {
                warn!(
                    target: EXECUTOR_TARGET,
                    block_target = %target,
                    filter = %parameters.filter_ref(),
                    error = %e,
                    "Failed to place block"
                );
                false
            }
        }
    }
}

/// Block the performer
pub struct Block {
    parameters: Arc<Parameters>,
    expiry: Expiry,
    prevents_talk_edit: bool,
    placer: BlockPlacer,
}

impl Block {
    pub(crate) fn new(
        parameters: Arc<Parameters>,
        expiry: Expiry,
        prevents_talk_edit: bool,
        placer: BlockPlacer,
    ) -> Self {
        Self {
            parameters,
            expiry,
            prevents_talk_edit,
            placer,
        }
    }

    #[must_use]
    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    #[must_use]
    pub fn prevents_talk_edit(&self) -> bool {
        self.prevents_talk_edit
    }

    /// # Errors
    ///
    /// Never fails: a rejected placement is reported as `false`.
    pub async fn execute(&self) -> ConsequenceResult<bool> {
        let target = self.parameters.user().name.clone();
        Ok(self
            .placer
            .place(
                &self.parameters,
                &target,
                self.expiry,
                true,
                self.prevents_talk_edit,
            )
            .await)
    }
}

impl HookAborter for Block {
    fn message(&self) -> Message {
        Message::new(BLOCKED_MESSAGE, self.parameters.message_params())
    }
}

#[async_trait]
impl Reversible for Block {
    type Info = ();

    async fn revert(&self, _info: (), performer: &UserRef, reason: &str) -> ConsequenceResult<bool> {
        let target = &self.parameters.user().name;
        let blocks = self.placer.issuer.list_blocks_for_target(target).await?;

        let Some(block) = blocks
            .into_iter()
            .find(|block| block.by.name == self.placer.filter_user.name)
        else {
            info!(
                target: EXECUTOR_TARGET,
                block_target = %target,
                "No block by the abuse filter to lift"
            );
            return Ok(false);
        };

        match self.placer.issuer.remove_block(&block, performer, reason).await {
            Ok(()) => {
                info!(
                    target: EXECUTOR_TARGET,
                    block_id = %block.id,
                    block_target = %target,
                    performer = %performer.name,
                    "Block lifted"
                );
                Ok(true)
            }
            Err(e) => {
                warn!(
                    target: EXECUTOR_TARGET,
                    block_id = %block.id,
                    error = %e,
                    "Failed to lift block"
                );
                Ok(false)
            }
        }
    }
}

/// Block the IP range of the request
pub struct RangeBlock {
    parameters: Arc<Parameters>,
    expiry: Expiry,
    range_block_size: CidrLimits,
    block_cidr_limit: CidrLimits,
    placer: BlockPlacer,
}

impl RangeBlock {
    pub(crate) fn new(
        parameters: Arc<Parameters>,
        expiry: Expiry,
        range_block_size: CidrLimits,
        block_cidr_limit: CidrLimits,
        placer: BlockPlacer,
    ) -> Self {
        Self {
            parameters,
            expiry,
            range_block_size,
            block_cidr_limit,
            placer,
        }
    }

    /// CIDR range that will be blocked
    #[must_use]
    pub fn target_range(&self) -> String {
        let ip = self.parameters.specifier().request_ip;
        let limits = CidrLimits {
            ipv4: self.range_block_size.ipv4.max(self.block_cidr_limit.ipv4),
            ipv6: self.range_block_size.ipv6.max(self.block_cidr_limit.ipv6),
        };
        network_of(ip, limits)
    }

    /// # Errors
    ///
    /// Never fails: a rejected placement is reported as `false`.
    pub async fn execute(&self) -> ConsequenceResult<bool> {
        let target = self.target_range();
        Ok(self
            .placer
            .place(&self.parameters, &target, self.expiry, false, false)
            .await)
    }
}

impl HookAborter for RangeBlock {
    fn message(&self) -> Message {
        Message::new(BLOCKED_MESSAGE, self.parameters.message_params())
    }
}

/// Network containing `ip`, rendered as `address/prefix`
pub(crate) fn network_of(ip: IpAddr, prefixes: CidrLimits) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let prefix = prefixes.ipv4.min(32);
            let mask = match prefix {
                0 => 0,
                p => u32::MAX << (32 - u32::from(p)),
            };
            format!("{}/{prefix}", Ipv4Addr::from(u32::from(v4) & mask))
        }
        IpAddr::V6(v6) => {
            let prefix = prefixes.ipv6.min(128);
            let mask = match prefix {
                0 => 0,
                p => u128::MAX << (128 - u32::from(p)),
            };
            format!("{}/{prefix}", Ipv6Addr::from(u128::from(v6) & mask))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consequences::test_support::{parameters_for, registered_specifier};
    use crate::consequences::{BackendError, BlockRecord, FilterRef, MockBlockIssuer};

    fn filter_user() -> UserRef {
        UserRef::registered(1, "Abuse filter")
    }

    fn record(target: &str, by: UserRef) -> BlockRecord {
        BlockRecord {
            id: format!("block-{target}"),
            target: target.to_string(),
            by,
            expiry: Expiry::Infinite,
            reason: "test".to_string(),
            options: BlockOptions {
                is_hard_block: false,
                is_autoblocking: true,
                is_create_account_blocked: true,
                is_user_talk_edit_blocked: false,
            },
        }
    }

    #[test]
    fn test_network_of() {
        let limits = CidrLimits { ipv4: 16, ipv6: 19 };
        assert_eq!(network_of("192.0.2.77".parse().unwrap(), limits), "192.0.0.0/16");
        assert_eq!(
            network_of("2001:db8:abcd::1".parse().unwrap(), limits),
            "2001::/19"
        );

        let narrow = CidrLimits { ipv4: 32, ipv6: 128 };
        assert_eq!(network_of("192.0.2.77".parse().unwrap(), narrow), "192.0.2.77/32");

        let wide = CidrLimits { ipv4: 0, ipv6: 0 };
        assert_eq!(network_of("192.0.2.77".parse().unwrap(), wide), "0.0.0.0/0");
    }

    #[tokio::test]
    async fn test_block_places_autoblock_on_performer() {
        let mut issuer = MockBlockIssuer::new();
        issuer
            .expect_place_block()
            .withf(|target, performer, expiry, _reason, options| {
                target == "Alice"
                    && performer.name == "Abuse filter"
                    && *expiry == Expiry::Infinite
                    && options.is_autoblocking
                    && options.is_create_account_blocked
                    && options.is_user_talk_edit_blocked
                    && !options.is_hard_block
            })
            .times(1)
            .returning(|target, performer, _, _, _| Ok(record(target, performer.clone())));

        let params = parameters_for(FilterRef::local(3), registered_specifier());
        let block = Block::new(
            params,
            Expiry::Infinite,
            true,
            BlockPlacer::new(Arc::new(issuer), filter_user()),
        );

        assert!(block.execute().await.unwrap());
        assert_eq!(
            block.message(),
            Message::new(BLOCKED_MESSAGE, ["Filter 3", "3"])
        );
    }

    #[tokio::test]
    async fn test_failed_placement_is_not_executed() {
        let mut issuer = MockBlockIssuer::new();
        issuer
            .expect_place_block()
            .returning(|_, _, _, _, _| Err(BackendError::Storage("already blocked".to_string())));

        let params = parameters_for(FilterRef::local(3), registered_specifier());
        let block = Block::new(
            params,
            Expiry::Infinite,
            false,
            BlockPlacer::new(Arc::new(issuer), filter_user()),
        );

        assert!(!block.execute().await.unwrap());
    }

    #[tokio::test]
    async fn test_range_block_target() {
        let mut issuer = MockBlockIssuer::new();
        issuer
            .expect_place_block()
            .withf(|target, _, _, _, options| {
                target == "192.0.0.0/16" && !options.is_autoblocking && !options.is_user_talk_edit_blocked
            })
            .times(1)
            .returning(|target, performer, _, _, _| Ok(record(target, performer.clone())));

        let params = parameters_for(FilterRef::local(3), registered_specifier());
        let range_block = RangeBlock::new(
            params,
            Expiry::Infinite,
            CidrLimits { ipv4: 16, ipv6: 19 },
            CidrLimits { ipv4: 8, ipv6: 19 },
            BlockPlacer::new(Arc::new(issuer), filter_user()),
        );

        assert_eq!(range_block.target_range(), "192.0.0.0/16");
        assert!(range_block.execute().await.unwrap());
    }

    #[tokio::test]
    async fn test_revert_only_lifts_filter_blocks() {
        let mut issuer = MockBlockIssuer::new();
        issuer
            .expect_list_blocks_for_target()
            .withf(|target| target == "Alice")
            .returning(|target| Ok(vec![record(target, UserRef::registered(9, "Admin"))]));
        issuer.expect_remove_block().never();

        let params = parameters_for(FilterRef::local(3), registered_specifier());
        let block = Block::new(
            params,
            Expiry::Infinite,
            false,
            BlockPlacer::new(Arc::new(issuer), filter_user()),
        );

        let performer = UserRef::registered(9, "Admin");
        assert!(!block.revert((), &performer, "mistake").await.unwrap());
    }

    #[tokio::test]
    async fn test_revert_lifts_filter_block() {
        let mut issuer = MockBlockIssuer::new();
        issuer
            .expect_list_blocks_for_target()
            .returning(|target| Ok(vec![record(target, filter_user())]));
        issuer
            .expect_remove_block()
            .withf(|block, performer, reason| {
                block.id == "block-Alice" && performer.name == "Admin" && reason == "false positive"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let params = parameters_for(FilterRef::local(3), registered_specifier());
        let block = Block::new(
            params,
            Expiry::Infinite,
            false,
            BlockPlacer::new(Arc::new(issuer), filter_user()),
        );

        let performer = UserRef::registered(9, "Admin");
        assert!(block.revert((), &performer, "false positive").await.unwrap());
    }
}
