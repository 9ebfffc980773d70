//! Filter and request identities shared by every consequence of a filter

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

/// Prefix of the global name of filters defined on the central wiki
pub const GLOBAL_FILTER_PREFIX: &str = "global-";

/// Identifies a filter: a local id, or an id on the central wiki
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterRef {
    /// Local filters sort before global ones
    pub global: bool,
    pub id: u64,
}

impl FilterRef {
    #[must_use]
    pub fn local(id: u64) -> Self {
        Self { global: false, id }
    }

    #[must_use]
    pub fn global(id: u64) -> Self {
        Self { global: true, id }
    }

    /// Name used as map key, in messages and in warning keys
    #[must_use]
    pub fn global_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FilterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.global {
            write!(f, "{GLOBAL_FILTER_PREFIX}{}", self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

impl FromStr for FilterRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (global, id) = match s.strip_prefix(GLOBAL_FILTER_PREFIX) {
            Some(id) => (true, id),
            None => (false, s),
        };
        id.parse::<u64>()
            .map(|id| Self { global, id })
            .map_err(|_| format!("Invalid filter name: {s}"))
    }
}

impl Serialize for FilterRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FilterRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Metadata of a stored filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingFilter {
    pub id: u64,
    /// Public description of the rule
    pub name: String,
    /// Whether the filter is shared with the rest of the wiki farm
    #[serde(default)]
    pub is_global_shared: bool,
}

/// A user account, or an anonymous user identified by IP (`id == 0`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub id: u64,
    pub name: String,
}

impl UserRef {
    pub fn registered(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn anonymous(ip: IpAddr) -> Self {
        Self {
            id: 0,
            name: ip.to_string(),
        }
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.id != 0
    }
}

/// A page the action targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(default)]
    pub namespace: i32,
    pub text: String,
}

impl ResourceRef {
    pub fn new(namespace: i32, text: impl Into<String>) -> Self {
        Self {
            namespace,
            text: text.into(),
        }
    }

    /// Namespace-qualified text of the page
    #[must_use]
    pub fn prefixed_text(&self) -> String {
        if self.namespace == 0 {
            self.text.clone()
        } else {
            format!("{}:{}", self.namespace, self.text)
        }
    }
}

/// The action a user is attempting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpecifier {
    /// Action name, e.g. `edit`, `move`, `createaccount`
    pub action: String,
    pub target: ResourceRef,
    pub user: UserRef,
    pub request_ip: IpAddr,
    /// Name of the account being created, for account creations
    #[serde(default)]
    pub account_name: Option<String>,
}

/// Immutable inputs shared by all consequences derived from one filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    filter: ExistingFilter,
    filter_ref: FilterRef,
    is_global_filter: bool,
    specifier: ActionSpecifier,
}

impl Parameters {
    /// Create the shared parameters for one filter evaluation
    #[must_use]
    pub fn new(filter: ExistingFilter, filter_ref: FilterRef, specifier: ActionSpecifier) -> Arc<Self> {
        Arc::new(Self {
            filter,
            filter_ref,
            is_global_filter: filter_ref.global,
            specifier,
        })
    }

    #[must_use]
    pub fn filter(&self) -> &ExistingFilter {
        &self.filter
    }

    #[must_use]
    pub fn filter_ref(&self) -> FilterRef {
        self.filter_ref
    }

    #[must_use]
    pub fn is_global_filter(&self) -> bool {
        self.is_global_filter
    }

    #[must_use]
    pub fn specifier(&self) -> &ActionSpecifier {
        &self.specifier
    }

    /// The performer of the action
    #[must_use]
    pub fn user(&self) -> &UserRef {
        &self.specifier.user
    }

    #[must_use]
    pub fn target(&self) -> &ResourceRef {
        &self.specifier.target
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.specifier.action
    }

    /// Filter name and global name, the usual message parameters
    #[must_use]
    pub fn message_params(&self) -> [String; 2] {
        [self.filter.name.clone(), self.filter_ref.global_name()]
    }
}
