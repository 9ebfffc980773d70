//! Fetches the raw stored actions of filters

use crate::LOOKUP_TARGET;
use crate::consequences::{
    ActionStore, BackendError, CentralStoreManager, ConsequenceError, ConsequenceResult,
    ConsequencesRegistry, FilterRef, RawAction, RawActions,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Reads raw actions from the local store and, for global filters, from the
/// central store
pub struct ConsequencesLookup {
    local_store: Arc<dyn ActionStore>,
    central: Arc<dyn CentralStoreManager>,
    registry: Arc<ConsequencesRegistry>,
}

impl ConsequencesLookup {
    #[must_use]
    pub fn new(
        local_store: Arc<dyn ActionStore>,
        central: Arc<dyn CentralStoreManager>,
        registry: Arc<ConsequencesRegistry>,
    ) -> Self {
        Self {
            local_store,
            central,
            registry,
        }
    }

    /// Raw actions of every requested filter; filters without actions map to
    /// an empty set.
    ///
    /// # Errors
    ///
    /// Returns `CentralStoreUnavailable` if global filters are requested and
    /// no central store is reachable, and propagates store failures.
    pub async fn get_consequences_for_filters(
        &self,
        filters: &[FilterRef],
    ) -> ConsequenceResult<BTreeMap<FilterRef, RawActions>> {
        let mut consequences: BTreeMap<FilterRef, RawActions> = filters
            .iter()
            .map(|filter| (*filter, RawActions::new()))
            .collect();

        let (global, local): (Vec<FilterRef>, Vec<FilterRef>) =
            filters.iter().partition(|filter| filter.global);

        if !local.is_empty() {
            let ids: Vec<u64> = local.iter().map(|filter| filter.id).collect();
            self.load_into(self.local_store.as_ref(), &ids, false, &mut consequences)
                .await?;
        }

        if !global.is_empty() {
            let store = self.central.connection().map_err(|e| match e {
                BackendError::Unavailable(_) => ConsequenceError::CentralStoreUnavailable,
                other => ConsequenceError::Backend(other),
            })?;
            let ids: Vec<u64> = global.iter().map(|filter| filter.id).collect();
            self.load_into(store.as_ref(), &ids, true, &mut consequences)
                .await?;
        }

        Ok(consequences)
    }

    async fn load_into(
        &self,
        store: &dyn ActionStore,
        ids: &[u64],
        global: bool,
        consequences: &mut BTreeMap<FilterRef, RawActions>,
    ) -> ConsequenceResult<()> {
        for row in store.fetch_actions(ids).await? {
            let Some(action) = row.action else {
                continue;
            };
            if row.action_filter_id != Some(row.filter_id) {
                continue;
            }

            let filter = FilterRef {
                global,
                id: row.filter_id,
            };
            if row.throttled && self.registry.is_dangerous(&action) {
                info!(
                    target: LOOKUP_TARGET,
                    filter = %filter,
                    action = %action,
                    "Skipping dangerous action of throttled filter"
                );
                continue;
            }

            let Some(actions) = consequences.get_mut(&filter) else {
                debug!(target: LOOKUP_TARGET, filter = %filter, "Ignoring row of unrequested filter");
                continue;
            };
            let raw = RawAction::new(action, RawAction::parse_params(row.parameters.as_deref()));
            actions.insert(raw.name, raw.params);
        }
        Ok(())
    }
}
