use filter_consequences::config::EngineConfig;
use filter_consequences::consequences::{
    ActionSpecifier, ConsequencesExecutorFactory, ConsequencesFactory, ConsequencesLookup,
    ConsequencesRegistry, ExecutionStatus, ExistingFilter, FilterRef, RawActions, VarValue,
    VariableHolder,
};
use filter_consequences::memory::{
    MemoryActionStore, MemoryAutopromoteStore, MemoryBlockStore, MemoryChangeTagger,
    MemoryCounterStore, MemoryEditTracker, MemoryFilterStore, MemoryGroupManager, MemorySession,
    StaticCentralStore,
};
use filter_consequences::{ENGINE_NAME, consequences::Collaborators, logging};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;
use tracing::info;

type Error = Box<dyn std::error::Error + Send + Sync>;

/// A stored filter of the scenario
#[derive(Debug, Deserialize)]
struct ScenarioFilter {
    filter: FilterRef,
    name: String,
    #[serde(default)]
    throttled: bool,
    #[serde(default)]
    actions: RawActions,
}

/// Dry-run input: stored filters, the request and which filters matched
#[derive(Debug, Deserialize)]
struct Scenario {
    request: ActionSpecifier,
    #[serde(default)]
    filters: Vec<ScenarioFilter>,
    matched: Vec<FilterRef>,
    /// Explicit groups per user name
    #[serde(default)]
    user_groups: BTreeMap<String, Vec<String>>,
    /// How many times the same request is replayed
    #[serde(default = "default_repeat")]
    repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

#[derive(Debug, Serialize)]
struct RunReport {
    run: u32,
    status: ExecutionStatus,
    variables: BTreeMap<String, VarValue>,
}

fn store_filters(
    scenario: &Scenario,
    filters: &MemoryFilterStore,
    local: &MemoryActionStore,
    central: &MemoryActionStore,
) {
    for stored in &scenario.filters {
        filters.insert(
            stored.filter,
            ExistingFilter {
                id: stored.filter.id,
                name: stored.name.clone(),
                is_global_shared: stored.filter.global,
            },
        );
        let store = if stored.filter.global { central } else { local };
        for (action, params) in &stored.actions {
            let params: Vec<&str> = params.iter().map(String::as_str).collect();
            store.add_action(stored.filter.id, action, &params);
        }
        store.set_throttled(stored.filter.id, stored.throttled);
    }
}

/// Run a scenario against in-memory backends and print the outcome
async fn async_main() -> Result<(), Error> {
    let mut args = env::args().skip(1);
    let (Some(config_path), Some(scenario_path)) = (args.next(), args.next()) else {
        return Err("usage: filter-consequences <config.yaml> <scenario.yaml>".into());
    };

    logging::init(env::var("LOG_DIR").unwrap_or_else(|_| logging::LOG_DIR.to_string()))?;

    let config = Arc::new(EngineConfig::load(&config_path).await?);
    let scenario: Scenario =
        serde_yaml::from_str(&tokio::fs::read_to_string(&scenario_path).await?)?;
    info!(
        target: ENGINE_NAME,
        config = %config_path,
        scenario = %scenario_path,
        filters = scenario.filters.len(),
        "Loaded dry-run scenario"
    );

    let filters = MemoryFilterStore::new();
    let local = MemoryActionStore::new();
    let central = MemoryActionStore::new();
    store_filters(&scenario, &filters, &local, &central);

    let groups = Arc::new(MemoryGroupManager::new());
    for (user, user_groups) in &scenario.user_groups {
        let user_groups: Vec<&str> = user_groups.iter().map(String::as_str).collect();
        groups.set_groups(user, &user_groups);
    }

    let collaborators = Collaborators {
        block_issuer: Arc::new(MemoryBlockStore::new()),
        group_manager: groups,
        autopromote_store: Arc::new(MemoryAutopromoteStore::new()),
        edit_tracker: Arc::new(MemoryEditTracker::new()),
        counters: Arc::new(MemoryCounterStore::new(
            config.central_db.clone().unwrap_or_else(|| "local".to_string()),
        )),
        change_tagger: Arc::new(MemoryChangeTagger::new()),
    };

    let registry = Arc::new(ConsequencesRegistry::new(config.actions.clone()));
    let lookup = ConsequencesLookup::new(
        Arc::new(local),
        Arc::new(StaticCentralStore::new(Arc::new(central))),
        registry.clone(),
    );
    let executors = ConsequencesExecutorFactory::new(
        Arc::new(filters),
        Arc::new(lookup),
        ConsequencesFactory::new(config.clone(), collaborators),
        registry,
        config,
    );

    let session = Arc::new(MemorySession::new());
    let mut reports = Vec::new();
    for run in 1..=scenario.repeat.max(1) {
        let vars = VariableHolder::new();
        let executor =
            executors.new_executor(scenario.request.clone(), vars.clone(), session.clone());
        let status = executor.execute_filter_actions(&scenario.matched).await?;
        reports.push(RunReport {
            run,
            status,
            variables: vars.snapshot(),
        });
    }

    print!("{}", serde_yaml::to_string(&reports)?);
    logging::log_console(format!("Dry run finished after {} run(s)", reports.len()));
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(async_main()) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
