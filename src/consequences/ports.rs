//! Collaborator interfaces the engine consumes
//!
//! Storage of filters, blocks, groups, counters and sessions lives outside
//! this crate. Callers implement these traits over their backing stores; the
//! `memory` module provides in-process implementations.

use crate::consequences::{
    ActionSpecifier, BackendResult, Expiry, ExistingFilter, FilterRef, UserRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Filter storage
// =============================================================================

/// Resolves filter references to their metadata
#[async_trait]
pub trait FilterLookup: Send + Sync {
    async fn get_filter(&self, filter: FilterRef) -> BackendResult<Option<ExistingFilter>>;
}

/// One row of the filter/action join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRow {
    /// Id of the filter the row was fetched for
    pub filter_id: u64,
    /// Filter id recorded on the action; `None` when the filter has no actions
    pub action_filter_id: Option<u64>,
    pub action: Option<String>,
    /// Newline-separated parameter blob
    pub parameters: Option<String>,
    /// Whether the filter is throttled at the storage layer
    pub throttled: bool,
}

/// Stored actions of filters, local or central
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn fetch_actions(&self, filter_ids: &[u64]) -> BackendResult<Vec<ActionRow>>;
}

/// Hands out connections to the central (cross-wiki) action store
pub trait CentralStoreManager: Send + Sync {
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` when no central store is configured.
    fn connection(&self) -> BackendResult<Arc<dyn ActionStore>>;
}

// =============================================================================
// Blocks
// =============================================================================

/// Flags applied to a placed block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOptions {
    pub is_hard_block: bool,
    pub is_autoblocking: bool,
    pub is_create_account_blocked: bool,
    pub is_user_talk_edit_blocked: bool,
}

/// A block as stored by the blocking backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: String,
    /// User name, IP address or CIDR range
    pub target: String,
    pub by: UserRef,
    pub expiry: Expiry,
    pub reason: String,
    pub options: BlockOptions,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlockIssuer: Send + Sync {
    async fn place_block(
        &self,
        target: &str,
        performer: &UserRef,
        expiry: Expiry,
        reason: &str,
        options: BlockOptions,
    ) -> BackendResult<BlockRecord>;

    async fn list_blocks_for_target(&self, target: &str) -> BackendResult<Vec<BlockRecord>>;

    async fn remove_block(
        &self,
        block: &BlockRecord,
        performer: &UserRef,
        reason: &str,
    ) -> BackendResult<()>;
}

// =============================================================================
// Users
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupManager: Send + Sync {
    /// Explicit and implicit groups of the user
    async fn effective_groups(&self, user: &UserRef) -> BackendResult<Vec<String>>;

    /// Explicit group memberships only
    async fn user_groups(&self, user: &UserRef) -> BackendResult<Vec<String>>;

    /// Groups every user of a kind belongs to automatically (`*`, `user`, ...)
    fn implicit_groups(&self) -> Vec<String>;

    /// Returns whether the user was a member
    async fn remove_from_group(&self, user: &UserRef, group: &str) -> BackendResult<bool>;

    /// Returns whether the membership was added
    async fn add_to_group(&self, user: &UserRef, group: &str) -> BackendResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AutopromoteBlockStore: Send + Sync {
    async fn block_autopromote(
        &self,
        user: &UserRef,
        reason: &str,
        duration_seconds: u64,
    ) -> BackendResult<bool>;

    async fn unblock_autopromote(
        &self,
        user: &UserRef,
        performer: &UserRef,
        reason: &str,
    ) -> BackendResult<bool>;

    async fn is_autopromote_blocked(&self, user: &UserRef) -> BackendResult<bool>;
}

/// Account facts used by throttle groups
#[async_trait]
pub trait UserEditTracker: Send + Sync {
    async fn registration(&self, user: &UserRef) -> BackendResult<Option<DateTime<Utc>>>;

    async fn edit_count(&self, user: &UserRef) -> BackendResult<u64>;
}

// =============================================================================
// Request-scoped state
// =============================================================================

/// Shared counters with per-key expiry; increments are best-effort
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value, 0 when the key is missing or expired
    async fn get(&self, key: &str) -> BackendResult<u64>;

    /// Increment the key, creating it with the given TTL if missing
    async fn incr_with_init(&self, key: &str, ttl_seconds: u64) -> BackendResult<u64>;

    /// Key scoped to the local wiki
    fn make_key(&self, components: &[&str]) -> String;

    /// Key shared by every wiki of the farm
    fn make_global_key(&self, components: &[&str]) -> String;
}

/// The performer's session
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start the session if it was not started yet
    async fn persist(&self) -> BackendResult<()>;

    async fn get(&self, key: &str) -> BackendResult<Option<bool>>;

    async fn set(&self, key: &str, value: bool) -> BackendResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangeTagger: Send + Sync {
    async fn add_tags(&self, specifier: &ActionSpecifier, tags: &[String]) -> BackendResult<()>;
}

/// Long-lived collaborators a consequence factory is wired with
#[derive(Clone)]
pub struct Collaborators {
    pub block_issuer: Arc<dyn BlockIssuer>,
    pub group_manager: Arc<dyn GroupManager>,
    pub autopromote_store: Arc<dyn AutopromoteBlockStore>,
    pub edit_tracker: Arc<dyn UserEditTracker>,
    pub counters: Arc<dyn CounterStore>,
    pub change_tagger: Arc<dyn ChangeTagger>,
}
