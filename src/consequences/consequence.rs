//! The consequence family and its capabilities
//!
//! Every built-in kind is a variant of [`Consequence`]. What a kind can do
//! beyond `execute` is expressed through capability traits:
//!
//! - [`ConsequencesDisabler`]: checked before anything runs; may silence all
//!   sibling consequences of the filter.
//! - [`HookAborter`]: supplies the message used to abort the user's action.
//! - [`Reversible`]: can be undone with information captured at execution.

use crate::consequences::{
    ActionType, Block, BlockAutopromote, ConsequenceResult, Degroup, Disallow, Message,
    RangeBlock, Tag, Throttle, UserRef, Warn,
};
use async_trait::async_trait;

/// A consequence that is evaluated before its siblings and may replace them
#[async_trait]
pub trait ConsequencesDisabler: Send + Sync {
    /// Run the check; `true` means every other consequence of the filter is
    /// dropped in favour of this one.
    async fn should_disable_other_consequences(&mut self) -> ConsequenceResult<bool>;

    /// Lower keys are checked first
    fn sort(&self) -> u32;
}

/// A consequence that aborts the triggering action when it fires
pub trait HookAborter {
    fn message(&self) -> Message;
}

/// A consequence whose effect can be undone
#[async_trait]
pub trait Reversible: Send + Sync {
    /// What the caller must have kept from execution time
    type Info: Send;

    /// Returns whether anything was undone
    async fn revert(
        &self,
        info: Self::Info,
        performer: &UserRef,
        reason: &str,
    ) -> ConsequenceResult<bool>;
}

/// Consequence supplied by an extension through the registry
#[async_trait]
pub trait CustomConsequence: Send + Sync {
    async fn execute(&mut self) -> ConsequenceResult<bool>;

    fn as_disabler(&mut self) -> Option<&mut dyn ConsequencesDisabler> {
        None
    }

    /// Message for hook-aborting custom consequences
    fn message(&self) -> Option<Message> {
        None
    }
}

/// One configured effect of a filter, ready to run
pub enum Consequence {
    Block(Block),
    RangeBlock(RangeBlock),
    Degroup(Degroup),
    BlockAutopromote(BlockAutopromote),
    Throttle(Throttle),
    Warn(Warn),
    Disallow(Disallow),
    Tag(Tag),
    Custom(Box<dyn CustomConsequence>),
}

impl Consequence {
    /// Built-in kind of this consequence, `None` for custom ones
    #[must_use]
    pub fn action_type(&self) -> Option<ActionType> {
        match self {
            Self::Block(_) => Some(ActionType::Block),
            Self::RangeBlock(_) => Some(ActionType::RangeBlock),
            Self::Degroup(_) => Some(ActionType::Degroup),
            Self::BlockAutopromote(_) => Some(ActionType::BlockAutopromote),
            Self::Throttle(_) => Some(ActionType::Throttle),
            Self::Warn(_) => Some(ActionType::Warn),
            Self::Disallow(_) => Some(ActionType::Disallow),
            Self::Tag(_) => Some(ActionType::Tag),
            Self::Custom(_) => None,
        }
    }

    /// Apply the effect. `false` means it did not fire, which is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error for unchecked disablers and failing backends.
    pub async fn execute(&mut self) -> ConsequenceResult<bool> {
        match self {
            Self::Block(c) => c.execute().await,
            Self::RangeBlock(c) => c.execute().await,
            Self::Degroup(c) => c.execute().await,
            Self::BlockAutopromote(c) => c.execute().await,
            Self::Throttle(c) => c.execute().await,
            Self::Warn(c) => c.execute().await,
            Self::Disallow(c) => c.execute().await,
            Self::Tag(c) => c.execute().await,
            Self::Custom(c) => c.execute().await,
        }
    }

    /// The disabling capability, if this consequence has it
    pub fn as_disabler(&mut self) -> Option<&mut dyn ConsequencesDisabler> {
        match self {
            Self::Throttle(c) => Some(c as &mut dyn ConsequencesDisabler),
            Self::Warn(c) => Some(c as &mut dyn ConsequencesDisabler),
            Self::Custom(c) => c.as_disabler(),
            _ => None,
        }
    }

    /// Sort key of the disabling capability
    pub fn disabler_sort(&mut self) -> Option<u32> {
        self.as_disabler().map(|disabler| disabler.sort())
    }

    /// Message shown when this consequence fires, `None` if it does not
    /// abort the action
    #[must_use]
    pub fn abort_message(&self) -> Option<Message> {
        match self {
            Self::Block(c) => Some(c.message()),
            Self::RangeBlock(c) => Some(c.message()),
            Self::Degroup(c) => Some(c.message()),
            Self::BlockAutopromote(c) => Some(c.message()),
            Self::Warn(c) => Some(c.message()),
            Self::Disallow(c) => Some(c.message()),
            Self::Throttle(_) | Self::Tag(_) => None,
            Self::Custom(c) => c.message(),
        }
    }
}

impl std::fmt::Debug for Consequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.action_type() {
            Some(action) => write!(f, "Consequence({action})"),
            None => write!(f, "Consequence(custom)"),
        }
    }
}
