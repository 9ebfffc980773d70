//! In-memory backends
//!
//! DashMap-backed implementations of every collaborator interface. They back
//! the dry-run binary and the scenario tests.

use crate::consequences::{
    ActionRow, ActionSpecifier, ActionStore, AutopromoteBlockStore, BackendError, BackendResult,
    BlockIssuer, BlockOptions, BlockRecord, CentralStoreManager, ChangeTagger, CounterStore,
    ExistingFilter, Expiry, FilterLookup, FilterRef, GroupManager, SessionStore, UserEditTracker,
    UserRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Groups every user belongs to automatically
const IMPLICIT_GROUPS: [&str; 3] = ["*", "user", "autoconfirmed"];

fn expires_at(now: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// =============================================================================
// Filters and actions
// =============================================================================

#[derive(Clone, Default)]
pub struct MemoryFilterStore {
    filters: Arc<DashMap<FilterRef, ExistingFilter>>,
}

impl MemoryFilterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, filter: FilterRef, existing: ExistingFilter) {
        self.filters.insert(filter, existing);
    }
}

#[async_trait]
impl FilterLookup for MemoryFilterStore {
    async fn get_filter(&self, filter: FilterRef) -> BackendResult<Option<ExistingFilter>> {
        Ok(self.filters.get(&filter).map(|entry| entry.value().clone()))
    }
}

/// Action rows keyed by filter id
#[derive(Clone, Default)]
pub struct MemoryActionStore {
    rows: Arc<DashMap<u64, Vec<ActionRow>>>,
}

impl MemoryActionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: ActionRow) {
        self.rows.entry(row.filter_id).or_default().push(row);
    }

    /// Store an action of a filter, encoding its parameters like the real store
    pub fn add_action(&self, filter_id: u64, action: &str, params: &[&str]) {
        self.insert(ActionRow {
            filter_id,
            action_filter_id: Some(filter_id),
            action: Some(action.to_string()),
            parameters: Some(params.join("\n")),
            throttled: false,
        });
    }

    /// Flag a filter as throttled at the storage layer
    pub fn set_throttled(&self, filter_id: u64, throttled: bool) {
        if let Some(mut rows) = self.rows.get_mut(&filter_id) {
            for row in rows.iter_mut() {
                row.throttled = throttled;
            }
        }
    }
}

#[async_trait]
impl ActionStore for MemoryActionStore {
    /// Filters without actions yield a single row with no action, like a
    /// left join would
    async fn fetch_actions(&self, filter_ids: &[u64]) -> BackendResult<Vec<ActionRow>> {
        let mut rows = Vec::new();
        for id in filter_ids {
            match self.rows.get(id) {
                Some(stored) if !stored.is_empty() => rows.extend(stored.iter().cloned()),
                _ => rows.push(ActionRow {
                    filter_id: *id,
                    action_filter_id: None,
                    action: None,
                    parameters: None,
                    throttled: false,
                }),
            }
        }
        Ok(rows)
    }
}

/// Central store manager with a fixed connection, or none at all
#[derive(Clone)]
pub struct StaticCentralStore {
    store: Option<Arc<dyn ActionStore>>,
}

impl StaticCentralStore {
    #[must_use]
    pub fn new(store: Arc<dyn ActionStore>) -> Self {
        Self { store: Some(store) }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self { store: None }
    }
}

impl CentralStoreManager for StaticCentralStore {
    fn connection(&self) -> BackendResult<Arc<dyn ActionStore>> {
        self.store
            .clone()
            .ok_or_else(|| BackendError::Unavailable("no central wiki configured".to_string()))
    }
}

// =============================================================================
// Blocks
// =============================================================================

#[derive(Clone, Default)]
pub struct MemoryBlockStore {
    blocks: Arc<DashMap<String, BlockRecord>>,
}

impl MemoryBlockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored block
    #[must_use]
    pub fn all(&self) -> Vec<BlockRecord> {
        self.blocks.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl BlockIssuer for MemoryBlockStore {
    async fn place_block(
        &self,
        target: &str,
        performer: &UserRef,
        expiry: Expiry,
        reason: &str,
        options: BlockOptions,
    ) -> BackendResult<BlockRecord> {
        let now = Utc::now();
        if self
            .blocks
            .iter()
            .any(|entry| entry.target == target && !entry.expiry.is_expired(now))
        {
            return Err(BackendError::Storage(format!("{target} is already blocked")));
        }

        let record = BlockRecord {
            id: Uuid::new_v4().to_string(),
            target: target.to_string(),
            by: performer.clone(),
            expiry,
            reason: reason.to_string(),
            options,
        };
        self.blocks.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn list_blocks_for_target(&self, target: &str) -> BackendResult<Vec<BlockRecord>> {
        Ok(self
            .blocks
            .iter()
            .filter(|entry| entry.target == target)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn remove_block(
        &self,
        block: &BlockRecord,
        _performer: &UserRef,
        _reason: &str,
    ) -> BackendResult<()> {
        self.blocks
            .remove(&block.id)
            .map(|_| ())
            .ok_or_else(|| BackendError::Storage(format!("Block {} not found", block.id)))
    }
}

// =============================================================================
// Users
// =============================================================================

/// Explicit group memberships keyed by user name
#[derive(Clone, Default)]
pub struct MemoryGroupManager {
    groups: Arc<DashMap<String, BTreeSet<String>>>,
}

impl MemoryGroupManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_groups(&self, user_name: &str, groups: &[&str]) {
        self.groups.insert(
            user_name.to_string(),
            groups.iter().map(ToString::to_string).collect(),
        );
    }
}

#[async_trait]
impl GroupManager for MemoryGroupManager {
    async fn effective_groups(&self, user: &UserRef) -> BackendResult<Vec<String>> {
        let mut groups = vec!["*".to_string()];
        if user.is_registered() {
            groups.push("user".to_string());
        }
        groups.extend(self.user_groups(user).await?);
        Ok(groups)
    }

    async fn user_groups(&self, user: &UserRef) -> BackendResult<Vec<String>> {
        Ok(self
            .groups
            .get(&user.name)
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn implicit_groups(&self) -> Vec<String> {
        IMPLICIT_GROUPS.iter().map(ToString::to_string).collect()
    }

    async fn remove_from_group(&self, user: &UserRef, group: &str) -> BackendResult<bool> {
        Ok(self
            .groups
            .get_mut(&user.name)
            .is_some_and(|mut groups| groups.remove(group)))
    }

    async fn add_to_group(&self, user: &UserRef, group: &str) -> BackendResult<bool> {
        Ok(self
            .groups
            .entry(user.name.clone())
            .or_default()
            .insert(group.to_string()))
    }
}

/// Autopromotion suspensions keyed by user name
#[derive(Clone, Default)]
pub struct MemoryAutopromoteStore {
    blocked_until: Arc<DashMap<String, DateTime<Utc>>>,
}

impl MemoryAutopromoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AutopromoteBlockStore for MemoryAutopromoteStore {
    async fn block_autopromote(
        &self,
        user: &UserRef,
        _reason: &str,
        duration_seconds: u64,
    ) -> BackendResult<bool> {
        let until = expires_at(Utc::now(), duration_seconds);
        self.blocked_until.insert(user.name.clone(), until);
        Ok(true)
    }

    async fn unblock_autopromote(
        &self,
        user: &UserRef,
        _performer: &UserRef,
        _reason: &str,
    ) -> BackendResult<bool> {
        Ok(self.blocked_until.remove(&user.name).is_some())
    }

    async fn is_autopromote_blocked(&self, user: &UserRef) -> BackendResult<bool> {
        Ok(self
            .blocked_until
            .get(&user.name)
            .is_some_and(|until| *until > Utc::now()))
    }
}

/// Registration dates and edit counts keyed by user id
#[derive(Clone, Default)]
pub struct MemoryEditTracker {
    users: Arc<DashMap<u64, (Option<DateTime<Utc>>, u64)>>,
}

impl MemoryEditTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user(&self, user_id: u64, registration: Option<DateTime<Utc>>, edit_count: u64) {
        self.users.insert(user_id, (registration, edit_count));
    }
}

#[async_trait]
impl UserEditTracker for MemoryEditTracker {
    async fn registration(&self, user: &UserRef) -> BackendResult<Option<DateTime<Utc>>> {
        Ok(self.users.get(&user.id).and_then(|entry| entry.0))
    }

    async fn edit_count(&self, user: &UserRef) -> BackendResult<u64> {
        Ok(self.users.get(&user.id).map_or(0, |entry| entry.1))
    }
}

// =============================================================================
// Request-scoped state
// =============================================================================

/// Counters with expiry; keys are prefixed with the wiki's keyspace
#[derive(Clone)]
pub struct MemoryCounterStore {
    keyspace: String,
    counters: Arc<DashMap<String, (u64, DateTime<Utc>)>>,
}

impl MemoryCounterStore {
    pub fn new(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            counters: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> BackendResult<u64> {
        let now = Utc::now();
        Ok(self
            .counters
            .get(key)
            .filter(|entry| entry.1 > now)
            .map_or(0, |entry| entry.0))
    }

    async fn incr_with_init(&self, key: &str, ttl_seconds: u64) -> BackendResult<u64> {
        let now = Utc::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert((0, now));
        if entry.1 <= now {
            *entry = (0, expires_at(now, ttl_seconds));
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    fn make_key(&self, components: &[&str]) -> String {
        format!("{}:{}", self.keyspace, components.join(":"))
    }

    fn make_global_key(&self, components: &[&str]) -> String {
        format!("global:{}", components.join(":"))
    }
}

/// A session that must be started before it is read or written
#[derive(Default)]
pub struct MemorySession {
    started: AtomicBool,
    values: DashMap<String, bool>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_started(&self) -> BackendResult<()> {
        if self.started.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("session not started".to_string()))
        }
    }
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn persist(&self) -> BackendResult<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> BackendResult<Option<bool>> {
        self.ensure_started()?;
        Ok(self.values.get(key).map(|value| *value))
    }

    async fn set(&self, key: &str, value: bool) -> BackendResult<()> {
        self.ensure_started()?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Tags applied to pending actions, keyed by page
#[derive(Clone, Default)]
pub struct MemoryChangeTagger {
    tags: Arc<DashMap<String, Vec<String>>>,
}

impl MemoryChangeTagger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tags_for(&self, page: &str) -> Vec<String> {
        self.tags
            .get(page)
            .map(|tags| tags.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChangeTagger for MemoryChangeTagger {
    async fn add_tags(&self, specifier: &ActionSpecifier, tags: &[String]) -> BackendResult<()> {
        let mut entry = self.tags.entry(specifier.target.prefixed_text()).or_default();
        for tag in tags {
            if !entry.contains(tag) {
                entry.push(tag.clone());
            }
        }
        Ok(())
    }
}
