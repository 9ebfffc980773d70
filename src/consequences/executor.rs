//! Consequences executor
//!
//! Turns the stored actions of the filters that matched a request into
//! consequences, lets disabling consequences veto their siblings and runs
//! whatever survives. The outcome is an [`ExecutionStatus`]: the actions that
//! fired per filter and the messages to abort the user's action with.

use crate::EXECUTOR_TARGET;
use crate::config::EngineConfig;
use crate::consequences::{
    ActionSpecifier, ActionType, Consequence, ConsequenceError, ConsequenceResult,
    ConsequencesFactory, ConsequencesLookup, ConsequencesRegistry, DEFAULT_DISALLOW_MESSAGE,
    DEFAULT_WARNING_MESSAGE, Expiry, FilterLookup, FilterRef, Message, Parameters, RawActions,
    SessionStore, ThrottleParams, VariableHolder, parse_expiry,
};
use crate::logging::{log_execution_end, log_execution_error, log_execution_start};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Consequences of one filter, in execution order
type FilterConsequences = Vec<(String, Consequence)>;

/// Outcome of one executor run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStatus {
    /// Names of the actions that fired, for every requested filter
    pub actions_taken: BTreeMap<FilterRef, Vec<String>>,
    /// Messages to abort the triggering action with, in execution order
    pub messages: Vec<Message>,
}

impl ExecutionStatus {
    /// The triggering action may proceed
    #[must_use]
    pub fn is_good(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Block selected across all filters of a run
struct BlockCandidate {
    expiry: Expiry,
    prevents_talk_edit: bool,
    parameters: Arc<Parameters>,
}

/// Runs the consequences of matched filters for one request
pub struct ConsequencesExecutor {
    filter_lookup: Arc<dyn FilterLookup>,
    lookup: Arc<ConsequencesLookup>,
    factory: ConsequencesFactory,
    registry: Arc<ConsequencesRegistry>,
    config: Arc<EngineConfig>,
    specifier: ActionSpecifier,
    vars: VariableHolder,
    session: Arc<dyn SessionStore>,
}

impl ConsequencesExecutor {
    /// Execute the actions of the given filters
    ///
    /// # Errors
    ///
    /// Any error aborts the whole batch. Effects of consequences that already
    /// ran stay applied.
    pub async fn execute_filter_actions(
        &self,
        filters: &[FilterRef],
    ) -> ConsequenceResult<ExecutionStatus> {
        let started = log_execution_start(&self.specifier, filters);

        match self.run(filters).await {
            Ok(status) => {
                log_execution_end(&self.specifier, &status, started);
                Ok(status)
            }
            Err(e) => {
                log_execution_error(&self.specifier, &e);
                Err(e)
            }
        }
    }

    async fn run(&self, filters: &[FilterRef]) -> ConsequenceResult<ExecutionStatus> {
        let raw = self.lookup.get_consequences_for_filters(filters).await?;
        let consequences = self.replace_arrays_with_consequences(raw).await?;
        let consequences = self.get_filtered_consequences(consequences).await?;

        let mut status = ExecutionStatus {
            actions_taken: filters.iter().map(|filter| (*filter, Vec::new())).collect(),
            messages: Vec::new(),
        };

        for (filter, list) in consequences {
            for (name, mut consequence) in list {
                if !consequence.execute().await? {
                    debug!(
                        target: EXECUTOR_TARGET,
                        filter = %filter,
                        action = %name,
                        "Consequence did not fire"
                    );
                    continue;
                }
                if let Some(message) = consequence.abort_message() {
                    status.messages.push(message);
                }
                status.actions_taken.entry(filter).or_default().push(name);
            }
        }

        Ok(status)
    }

    /// Normalize raw actions and build consequences from them. Blocks are
    /// merged so that only the latest-expiring one is placed.
    async fn replace_arrays_with_consequences(
        &self,
        raw: BTreeMap<FilterRef, RawActions>,
    ) -> ConsequenceResult<BTreeMap<FilterRef, FilterConsequences>> {
        let now = Utc::now();
        let mut consequences = BTreeMap::new();
        let mut block: Option<BlockCandidate> = None;

        for (filter, mut actions) in raw {
            let list: &mut FilterConsequences = consequences.entry(filter).or_default();

            if filter.global {
                actions.retain(|name, _| !self.config.is_locally_disabled_for_global(name));
            }
            // Unknown names are left for `action_to_consequence` to report
            actions.retain(|name, _| {
                let is_enabled = self.config.is_action_enabled(name);
                if !is_enabled {
                    debug!(
                        target: EXECUTOR_TARGET,
                        filter = %filter,
                        action = %name,
                        "Dropping disabled action"
                    );
                }
                is_enabled
            });
            if actions.contains_key(ActionType::Disallow.as_str())
                && actions.keys().any(|name| self.registry.is_dangerous(name))
            {
                actions.remove(ActionType::Disallow.as_str());
            }
            if actions.is_empty() {
                continue;
            }

            let existing = self
                .filter_lookup
                .get_filter(filter)
                .await?
                .ok_or_else(|| ConsequenceError::FilterNotFound(filter.to_string()))?;
            let parameters = Parameters::new(existing, filter, self.specifier.clone());

            for (name, params) in actions {
                if name == ActionType::Block.as_str() {
                    let Some((expiry, prevents_talk_edit)) = self.block_expiry(&params, now) else {
                        warn!(
                            target: EXECUTOR_TARGET,
                            filter = %filter,
                            params = ?params,
                            "Invalid block expiry, dropping block"
                        );
                        continue;
                    };
                    if block.as_ref().is_none_or(|current| expiry >= current.expiry) {
                        block = Some(BlockCandidate {
                            expiry,
                            prevents_talk_edit,
                            parameters: parameters.clone(),
                        });
                    }
                    continue;
                }

                if let Some(consequence) =
                    self.action_to_consequence(&name, params, parameters.clone(), now)
                {
                    list.push((name, consequence));
                }
            }
        }

        if let Some(candidate) = block {
            let filter = candidate.parameters.filter_ref();
            let consequence = self.factory.new_block(
                candidate.parameters,
                candidate.expiry,
                candidate.prevents_talk_edit,
            );
            consequences
                .entry(filter)
                .or_default()
                .push((ActionType::Block.to_string(), Consequence::Block(consequence)));
        }

        Ok(consequences)
    }

    /// Expiry and talk-page flag of a block action for this performer
    fn block_expiry(&self, params: &[String], now: DateTime<Utc>) -> Option<(Expiry, bool)> {
        let is_anonymous = !self.specifier.user.is_registered();

        if params.len() == 3 {
            let mut prevents_talk_edit = false;
            let mut expiries = Vec::with_capacity(2);
            for param in params {
                match param.as_str() {
                    "blocktalk" => prevents_talk_edit = true,
                    "noTalkBlockSet" | "" => {}
                    expiry => expiries.push(expiry),
                }
            }
            let [anon_expiry, user_expiry] = expiries.as_slice() else {
                return None;
            };
            let input = if is_anonymous { anon_expiry } else { user_expiry };
            return parse_expiry(input, now).map(|expiry| (expiry, prevents_talk_edit));
        }

        let input = match &self.config.anon_block_duration {
            Some(anon_duration) if is_anonymous => anon_duration,
            _ => &self.config.block_duration,
        };
        parse_expiry(input, now).map(|expiry| (expiry, false))
    }

    fn action_to_consequence(
        &self,
        name: &str,
        params: Vec<String>,
        parameters: Arc<Parameters>,
        now: DateTime<Utc>,
    ) -> Option<Consequence> {
        let consequence = match ActionType::from_name(name) {
            Some(ActionType::Throttle) => {
                let Some(throttle) = ThrottleParams::from_raw(&params) else {
                    warn!(
                        target: EXECUTOR_TARGET,
                        filter = %parameters.filter_ref(),
                        params = ?params,
                        "Invalid throttle parameters"
                    );
                    return None;
                };
                Consequence::Throttle(self.factory.new_throttle(parameters, throttle))
            }
            Some(ActionType::Warn) => {
                let message_key = params
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| DEFAULT_WARNING_MESSAGE.to_string());
                Consequence::Warn(self.factory.new_warn(
                    parameters,
                    message_key,
                    self.session.clone(),
                ))
            }
            Some(ActionType::Disallow) => {
                let message_key = params
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| DEFAULT_DISALLOW_MESSAGE.to_string());
                Consequence::Disallow(self.factory.new_disallow(parameters, message_key))
            }
            Some(ActionType::BlockAutopromote) => Consequence::BlockAutopromote(
                self.factory
                    .new_block_autopromote(parameters, self.config.block_autopromote_seconds()),
            ),
            Some(ActionType::RangeBlock) => Consequence::RangeBlock(
                self.factory
                    .new_range_block(parameters, Expiry::At(now + Duration::weeks(1))),
            ),
            Some(ActionType::Degroup) => {
                Consequence::Degroup(self.factory.new_degroup(parameters, self.vars.clone()))
            }
            Some(ActionType::Tag) => Consequence::Tag(self.factory.new_tag(parameters, params)),
            // Merged across filters by the caller
            Some(ActionType::Block) => return None,
            None => {
                let Some(factory) = self.registry.custom_action(name) else {
                    warn!(
                        target: EXECUTOR_TARGET,
                        filter = %parameters.filter_ref(),
                        action = %name,
                        "Unknown action"
                    );
                    return None;
                };
                Consequence::Custom(factory(parameters, params))
            }
        };
        Some(consequence)
    }

    /// Let disabling consequences veto their siblings. The first disabler
    /// that fires, by ascending sort key, replaces its filter's consequences.
    async fn get_filtered_consequences(
        &self,
        consequences: BTreeMap<FilterRef, FilterConsequences>,
    ) -> ConsequenceResult<BTreeMap<FilterRef, FilterConsequences>> {
        let mut filtered = BTreeMap::new();

        for (filter, mut list) in consequences {
            let mut disablers: Vec<(u32, usize)> = list
                .iter_mut()
                .enumerate()
                .filter_map(|(index, (_, consequence))| {
                    consequence.disabler_sort().map(|sort| (sort, index))
                })
                .collect();
            disablers.sort_by_key(|(sort, _)| *sort);

            let mut winner = None;
            for (_, index) in disablers {
                let Some(disabler) = list[index].1.as_disabler() else {
                    continue;
                };
                if disabler.should_disable_other_consequences().await? {
                    winner = Some(index);
                    break;
                }
            }

            let list = match winner {
                Some(index) => {
                    debug!(
                        target: EXECUTOR_TARGET,
                        filter = %filter,
                        action = %list[index].0,
                        "Disabling other consequences"
                    );
                    vec![list.swap_remove(index)]
                }
                None => list,
            };
            filtered.insert(filter, list);
        }

        Ok(filtered)
    }
}

/// Builds one executor per request from long-lived services
#[derive(Clone)]
pub struct ConsequencesExecutorFactory {
    filter_lookup: Arc<dyn FilterLookup>,
    lookup: Arc<ConsequencesLookup>,
    factory: ConsequencesFactory,
    registry: Arc<ConsequencesRegistry>,
    config: Arc<EngineConfig>,
}

impl ConsequencesExecutorFactory {
    #[must_use]
    pub fn new(
        filter_lookup: Arc<dyn FilterLookup>,
        lookup: Arc<ConsequencesLookup>,
        factory: ConsequencesFactory,
        registry: Arc<ConsequencesRegistry>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            filter_lookup,
            lookup,
            factory,
            registry,
            config,
        }
    }

    /// Create the executor for one request
    #[must_use]
    pub fn new_executor(
        &self,
        specifier: ActionSpecifier,
        vars: VariableHolder,
        session: Arc<dyn SessionStore>,
    ) -> ConsequencesExecutor {
        ConsequencesExecutor {
            filter_lookup: self.filter_lookup.clone(),
            lookup: self.lookup.clone(),
            factory: self.factory.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            specifier,
            vars,
            session,
        }
    }
}
