//! Consequence action types
//!
//! This module defines the built-in action names, the raw stored form of a
//! filter's actions and the user-facing messages consequences produce.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in consequence kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Rate limiter that silences sibling consequences while under budget
    #[display("throttle")]
    Throttle,
    /// One-shot-per-session warning
    #[display("warn")]
    Warn,
    /// Abort the action with a message
    #[display("disallow")]
    Disallow,
    /// Suspend automatic promotion
    #[display("blockautopromote")]
    BlockAutopromote,
    /// Block the performer
    #[display("block")]
    Block,
    /// Block the performer's IP range
    #[display("rangeblock")]
    RangeBlock,
    /// Strip explicit group memberships
    #[display("degroup")]
    Degroup,
    /// Attach change tags
    #[display("tag")]
    Tag,
}

impl ActionType {
    /// Every built-in action, in registry order
    pub const ALL: [Self; 8] = [
        Self::Throttle,
        Self::Warn,
        Self::Disallow,
        Self::BlockAutopromote,
        Self::Block,
        Self::RangeBlock,
        Self::Degroup,
        Self::Tag,
    ];

    /// Built-in actions that restrict the user enough to make a plain
    /// disallow message redundant
    pub const DANGEROUS: [Self; 4] = [
        Self::Block,
        Self::BlockAutopromote,
        Self::Degroup,
        Self::RangeBlock,
    ];

    /// Stored name of this action
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Throttle => "throttle",
            Self::Warn => "warn",
            Self::Disallow => "disallow",
            Self::BlockAutopromote => "blockautopromote",
            Self::Block => "block",
            Self::RangeBlock => "rangeblock",
            Self::Degroup => "degroup",
            Self::Tag => "tag",
        }
    }

    /// Look up a built-in action by its stored name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }

    /// Check if this action can be undone after execution
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        matches!(self, Self::Block | Self::Degroup | Self::BlockAutopromote)
    }
}

/// Raw, unvalidated actions of one filter: action name -> ordered params
pub type RawActions = BTreeMap<String, Vec<String>>;

/// A single stored action of a filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAction {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl RawAction {
    /// Create a raw action from a name and its parameters
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Decode a stored parameter blob. Parameters are newline separated and
    /// empty lines carry no meaning; a missing blob means no parameters.
    #[must_use]
    pub fn parse_params(blob: Option<&str>) -> Vec<String> {
        blob.map(|blob| {
            blob.split('\n')
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
    }
}

/// User-facing message: a message key plus positional parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub key: String,
    pub params: Vec<String>,
}

impl Message {
    /// Create a new message
    pub fn new(key: impl Into<String>, params: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            key: key.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)?;
        if !self.params.is_empty() {
            write!(f, " [{}]", self.params.join(", "))?;
        }
        Ok(())
    }
}
