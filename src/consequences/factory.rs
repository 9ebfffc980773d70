//! Builds consequences wired to their collaborators

use crate::config::EngineConfig;
use crate::consequences::block::BlockPlacer;
use crate::consequences::{
    Block, BlockAutopromote, Collaborators, Degroup, Disallow, Expiry, Parameters, RangeBlock,
    SessionStore, Tag, Throttle, ThrottleParams, VariableHolder, Warn,
};
use std::sync::Arc;

/// Long-lived factory of consequence objects
#[derive(Clone)]
pub struct ConsequencesFactory {
    config: Arc<EngineConfig>,
    collaborators: Collaborators,
}

impl ConsequencesFactory {
    #[must_use]
    pub fn new(config: Arc<EngineConfig>, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    fn placer(&self) -> BlockPlacer {
        BlockPlacer::new(
            self.collaborators.block_issuer.clone(),
            self.config.filter_user.clone(),
        )
    }

    #[must_use]
    pub fn new_block(
        &self,
        parameters: Arc<Parameters>,
        expiry: Expiry,
        prevents_talk_edit: bool,
    ) -> Block {
        Block::new(parameters, expiry, prevents_talk_edit, self.placer())
    }

    #[must_use]
    pub fn new_range_block(&self, parameters: Arc<Parameters>, expiry: Expiry) -> RangeBlock {
        RangeBlock::new(
            parameters,
            expiry,
            self.config.range_block_size,
            self.config.block_cidr_limit,
            self.placer(),
        )
    }

    #[must_use]
    pub fn new_degroup(&self, parameters: Arc<Parameters>, vars: VariableHolder) -> Degroup {
        Degroup::new(
            parameters,
            vars,
            self.collaborators.group_manager.clone(),
            self.config.filter_user.clone(),
        )
    }

    #[must_use]
    pub fn new_block_autopromote(
        &self,
        parameters: Arc<Parameters>,
        duration_seconds: u64,
    ) -> BlockAutopromote {
        BlockAutopromote::new(
            parameters,
            duration_seconds,
            self.collaborators.autopromote_store.clone(),
        )
    }

    #[must_use]
    pub fn new_throttle(&self, parameters: Arc<Parameters>, params: ThrottleParams) -> Throttle {
        Throttle::new(
            parameters,
            params,
            self.collaborators.counters.clone(),
            self.collaborators.edit_tracker.clone(),
            self.config.is_central,
            self.config.central_db.clone(),
        )
    }

    /// The session is request state, so it is passed in rather than held
    #[must_use]
    pub fn new_warn(
        &self,
        parameters: Arc<Parameters>,
        message_key: String,
        session: Arc<dyn SessionStore>,
    ) -> Warn {
        Warn::new(parameters, message_key, session)
    }

    #[must_use]
    pub fn new_disallow(&self, parameters: Arc<Parameters>, message_key: String) -> Disallow {
        Disallow::new(parameters, message_key)
    }

    #[must_use]
    pub fn new_tag(&self, parameters: Arc<Parameters>, tags: Vec<String>) -> Tag {
        Tag::new(parameters, tags, self.collaborators.change_tagger.clone())
    }
}
