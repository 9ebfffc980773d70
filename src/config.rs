use crate::consequences::{ActionType, ConfigError, UserRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Seconds in a day, for durations configured in days
pub const DAY_SECONDS: u64 = 86_400;

/// CIDR prefix lengths per address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidrLimits {
    pub ipv4: u8,
    pub ipv6: u8,
}

impl Default for CidrLimits {
    fn default() -> Self {
        Self { ipv4: 16, ipv6: 19 }
    }
}

/// Engine configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // Which consequence kinds are enabled; `false` disables an action
    pub actions: BTreeMap<String, bool>,
    // Actions that global filters may not take on this wiki
    pub locally_disabled_global_actions: BTreeMap<String, bool>,
    // Block duration for legacy block actions
    pub block_duration: String,
    // Block duration for anonymous users on legacy block actions
    pub anon_block_duration: Option<String>,
    // Days automatic promotion stays suspended
    pub block_autopromote_duration: u64,
    // Prefix length used for range blocks
    pub range_block_size: CidrLimits,
    // Widest range the blocking backend accepts
    pub block_cidr_limit: CidrLimits,
    // Whether this wiki hosts the global filters
    pub is_central: bool,
    // Wiki id of the central wiki
    pub central_db: Option<String>,
    // Account recorded as performer of blocks and rights changes
    pub filter_user: UserRef,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let actions = ActionType::ALL
            .into_iter()
            .map(|action| (action.as_str().to_string(), action != ActionType::RangeBlock))
            .collect();
        let locally_disabled_global_actions = ActionType::ALL
            .into_iter()
            .map(|action| (action.as_str().to_string(), false))
            .collect();

        Self {
            actions,
            locally_disabled_global_actions,
            block_duration: "indefinite".to_string(),
            anon_block_duration: None,
            block_autopromote_duration: 5,
            range_block_size: CidrLimits::default(),
            block_cidr_limit: CidrLimits::default(),
            is_central: false,
            central_db: None,
            filter_user: UserRef::registered(1, "Abuse filter"),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from YAML. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Yaml` if the document is not a valid config.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load the configuration from a YAML file
    ///
    /// If the file doesn't exist, the default configuration is returned.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The file exists but cannot be read
    /// - The file content is not a valid config
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path.as_ref()).await {
            Ok(content) => Self::from_yaml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Save the configuration to a YAML file
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The parent directory cannot be created
    /// - The configuration cannot be serialized to YAML
    /// - The YAML data cannot be written to the file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let yaml = serde_yaml::to_string(self)?;
        tokio::fs::write(path, yaml).await?;
        Ok(())
    }

    /// Check if an action is enabled; unknown names are enabled
    #[must_use]
    pub fn is_action_enabled(&self, name: &str) -> bool {
        self.actions.get(name).copied().unwrap_or(true)
    }

    /// Check if global filters may not take this action locally
    #[must_use]
    pub fn is_locally_disabled_for_global(&self, name: &str) -> bool {
        self.locally_disabled_global_actions
            .get(name)
            .copied()
            .unwrap_or(false)
    }

    /// Block autopromote duration in seconds
    #[must_use]
    pub fn block_autopromote_seconds(&self) -> u64 {
        self.block_autopromote_duration * DAY_SECONDS
    }
}
