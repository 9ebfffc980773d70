//! Consequence engine
//!
//! Decides which effects to apply when abuse filters match a user's action,
//! resolves conflicts between them and executes them.

mod action;
mod autopromote;
mod block;
mod consequence;
mod degroup;
mod disallow;
mod error;
mod executor;
mod expiry;
mod factory;
mod lookup;
mod parameters;
mod ports;
mod registry;
mod revert;
mod tag;
mod throttle;
mod variables;
mod warn;

pub use action::{ActionType, Message, RawAction, RawActions};
pub use autopromote::BlockAutopromote;
pub use block::{Block, RangeBlock};
pub use consequence::{
    Consequence, ConsequencesDisabler, CustomConsequence, HookAborter, Reversible,
};
pub use degroup::Degroup;
pub use disallow::{DEFAULT_DISALLOW_MESSAGE, Disallow};
pub use error::{
    BackendError, BackendResult, ConfigError, ConsequenceError, ConsequenceResult, RegistryError,
};
pub use executor::{ConsequencesExecutor, ConsequencesExecutorFactory, ExecutionStatus};
pub use expiry::{Expiry, parse_expiry};
pub use factory::ConsequencesFactory;
pub use lookup::ConsequencesLookup;
pub use parameters::{
    ActionSpecifier, ExistingFilter, FilterRef, GLOBAL_FILTER_PREFIX, Parameters, ResourceRef,
    UserRef,
};
pub use ports::{
    ActionRow, ActionStore, AutopromoteBlockStore, BlockIssuer, BlockOptions, BlockRecord,
    CentralStoreManager, ChangeTagger, Collaborators, CounterStore, FilterLookup, GroupManager,
    SessionStore, UserEditTracker,
};
#[cfg(test)]
pub use ports::{MockAutopromoteBlockStore, MockBlockIssuer, MockChangeTagger, MockGroupManager};
pub use registry::{ConsequencesRegistry, CustomFactory};
pub use revert::{ConsequencesReverter, RevertInfo};
pub use tag::Tag;
pub use throttle::{Throttle, ThrottleParams};
pub use variables::{USER_GROUPS_VAR, VarValue, VariableHolder};
pub use warn::{DEFAULT_WARNING_MESSAGE, Warn};
