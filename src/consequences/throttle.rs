//! Throttle consequence
//!
//! A throttle counts matching actions per group over a period. While the
//! count stays within budget it silences every other consequence of its
//! filter; once the budget is exceeded the other consequences run.

use crate::EXECUTOR_TARGET;
use crate::config::{CidrLimits, DAY_SECONDS};
use crate::consequences::block::network_of;
use crate::consequences::{
    ConsequenceError, ConsequenceResult, ConsequencesDisabler, CounterStore, Parameters,
    UserEditTracker,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix lengths used for the `range` throttle group
const THROTTLE_RANGE: CidrLimits = CidrLimits { ipv4: 16, ipv6: 64 };

/// Stored throttle configuration: `[id, "count,period", group...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleParams {
    pub id: String,
    pub count: u64,
    pub period: u64,
    /// Each group is one or more comma-joined group types
    pub groups: Vec<String>,
}

impl ThrottleParams {
    /// Parse stored throttle parameters, `None` if they are malformed
    #[must_use]
    pub fn from_raw(params: &[String]) -> Option<Self> {
        let (id, rest) = params.split_first()?;
        let (rate, groups) = rest.split_first()?;
        let (count, period) = rate.split_once(',')?;
        let groups: Vec<String> = groups
            .iter()
            .map(|group| group.trim().to_string())
            .filter(|group| !group.is_empty())
            .collect();
        if groups.is_empty() {
            return None;
        }

        Some(Self {
            id: id.trim().to_string(),
            count: count.trim().parse().ok()?,
            period: period.trim().parse().ok()?,
            groups,
        })
    }
}

/// Rate limiter for one filter
pub struct Throttle {
    parameters: Arc<Parameters>,
    params: ThrottleParams,
    counters: Arc<dyn CounterStore>,
    edit_tracker: Arc<dyn UserEditTracker>,
    is_central: bool,
    central_db: Option<String>,
    hit_throttle: Option<bool>,
    keys: Vec<String>,
}

impl Throttle {
    pub(crate) fn new(
        parameters: Arc<Parameters>,
        params: ThrottleParams,
        counters: Arc<dyn CounterStore>,
        edit_tracker: Arc<dyn UserEditTracker>,
        is_central: bool,
        central_db: Option<String>,
    ) -> Self {
        Self {
            parameters,
            params,
            counters,
            edit_tracker,
            is_central,
            central_db,
            hit_throttle: None,
            keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn params(&self) -> &ThrottleParams {
        &self.params
    }

    /// Counter key of every configured group
    ///
    /// # Errors
    ///
    /// Returns `InvalidThrottleGroup` for an unknown group type and
    /// propagates backend failures.
    pub async fn counter_keys(&self) -> ConsequenceResult<Vec<String>> {
        let mut keys = Vec::with_capacity(self.params.groups.len());
        for group in &self.params.groups {
            let mut identifiers = Vec::new();
            for kind in group.split(',') {
                identifiers.push(self.identifier(kind.trim()).await?);
            }
            let digest = hex::encode(Sha256::digest(identifiers.join(":").as_bytes()));
            keys.push(self.scoped_key(group, &digest));
        }
        Ok(keys)
    }

    /// Counters are shared across wikis for global filters evaluated away
    /// from the central wiki
    fn scoped_key(&self, group: &str, digest: &str) -> String {
        if self.parameters.is_global_filter() && !self.is_central {
            let central_db = self.central_db.as_deref().unwrap_or_default();
            self.counters.make_global_key(&[
                "abusefilter",
                "throttle",
                central_db,
                &self.params.id,
                group,
                digest,
            ])
        } else {
            self.counters
                .make_key(&["abusefilter", "throttle", &self.params.id, group, digest])
        }
    }

    async fn identifier(&self, kind: &str) -> ConsequenceResult<String> {
        let specifier = self.parameters.specifier();
        let user = self.parameters.user();
        let identifier = match kind {
            "ip" => specifier.request_ip.to_string(),
            "user" => user.id.to_string(),
            "range" => network_of(specifier.request_ip, THROTTLE_RANGE),
            "creationdate" => {
                let registered = if user.is_registered() {
                    self.edit_tracker.registration(user).await?
                } else {
                    None
                };
                registered
                    .map(|at| {
                        let ts = at.timestamp();
                        ts - ts.rem_euclid(DAY_SECONDS as i64)
                    })
                    .unwrap_or(0)
                    .to_string()
            }
            "editcount" => {
                let count = if user.is_registered() {
                    self.edit_tracker.edit_count(user).await?
                } else {
                    0
                };
                count.to_string()
            }
            "site" => "1".to_string(),
            "page" => self.parameters.target().prefixed_text(),
            other => return Err(ConsequenceError::InvalidThrottleGroup(other.to_string())),
        };
        Ok(format!("{kind}-{identifier}"))
    }

    /// Increment every group counter. Returns whether the action was within
    /// budget at check time.
    ///
    /// # Errors
    ///
    /// Returns `NotPrechecked` if the check did not run first.
    pub async fn execute(&self) -> ConsequenceResult<bool> {
        let hit_throttle = self
            .hit_throttle
            .ok_or(ConsequenceError::NotPrechecked("throttle"))?;

        for key in &self.keys {
            self.counters.incr_with_init(key, self.params.period).await?;
        }
        Ok(!hit_throttle)
    }
}

#[async_trait]
impl ConsequencesDisabler for Throttle {
    async fn should_disable_other_consequences(&mut self) -> ConsequenceResult<bool> {
        let keys = self.counter_keys().await?;

        let mut hit_throttle = false;
        for key in &keys {
            let current = self.counters.get(key).await?;
            if current + 1 > self.params.count {
                hit_throttle = true;
                info!(
                    target: EXECUTOR_TARGET,
                    filter = %self.parameters.filter_ref(),
                    throttle_id = %self.params.id,
                    count = current,
                    limit = self.params.count,
                    "Throttle limit exceeded"
                );
                break;
            }
        }

        debug!(
            target: EXECUTOR_TARGET,
            filter = %self.parameters.filter_ref(),
            hit_throttle,
            "Throttle checked"
        );
        self.keys = keys;
        self.hit_throttle = Some(hit_throttle);
        Ok(!hit_throttle)
    }

    fn sort(&self) -> u32 {
        0
    }
}
