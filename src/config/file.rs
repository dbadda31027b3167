use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{ServerConfig, StalePolicy};
use crate::error::{Error, Result};
use crate::types::Role;

/// On-disk TOML configuration.
///
/// Every section is optional; missing values fall back to
/// [`ServerConfig::default`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub identity: IdentitySection,
    pub presence: PresenceSection,
    pub history: HistorySection,
    pub review: ReviewSection,
    pub users: Vec<UserEntry>,
    pub projects: Vec<ProjectSeed>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentitySection {
    pub lookup_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenceSection {
    pub idle_timeout_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistorySection {
    pub edit_capacity: Option<usize>,
    pub activity_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewSection {
    pub stale_policy: Option<StalePolicy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub token_lookup: Option<String>,
    #[serde(default)]
    pub token_hash: Option<String>,
}

/// A project created at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSeed {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub content: String,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: FileConfig =
            toml::from_str(raw).map_err(|e| Error::Config(format!("invalid config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for user in &self.users {
            if user.id.trim().is_empty() {
                return Err(Error::Config("user id cannot be empty".into()));
            }
            if !seen.insert(user.id.as_str()) {
                return Err(Error::Config(format!("duplicate user id '{}'", user.id)));
            }
            if user.token_lookup.is_some() != user.token_hash.is_some() {
                return Err(Error::Config(format!(
                    "user '{}' needs both token_lookup and token_hash",
                    user.id
                )));
            }
        }
        for project in &self.projects {
            if !seen.contains(project.owner_id.as_str()) {
                return Err(Error::Config(format!(
                    "project '{}' has unknown owner '{}'",
                    project.name, project.owner_id
                )));
            }
            if let Some(member) = project.members.iter().find(|m| !seen.contains(m.as_str())) {
                return Err(Error::Config(format!(
                    "project '{}' has unknown member '{member}'",
                    project.name
                )));
            }
        }
        if self.presence.sweep_interval_secs == Some(0) {
            return Err(Error::Config("presence.sweep_interval_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Builds the runtime configuration from this file.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: self.server.host.clone().unwrap_or(defaults.host),
            port: self.server.port.unwrap_or(defaults.port),
            lookup_timeout: self
                .identity
                .lookup_timeout_ms
                .map_or(defaults.lookup_timeout, Duration::from_millis),
            presence_idle_timeout: self
                .presence
                .idle_timeout_secs
                .map_or(defaults.presence_idle_timeout, Duration::from_secs),
            presence_sweep_interval: self
                .presence
                .sweep_interval_secs
                .map_or(defaults.presence_sweep_interval, Duration::from_secs),
            edit_history_capacity: self
                .history
                .edit_capacity
                .unwrap_or(defaults.edit_history_capacity),
            activity_history_capacity: self
                .history
                .activity_capacity
                .unwrap_or(defaults.activity_history_capacity),
            stale_policy: self.review.stale_policy.unwrap_or(defaults.stale_policy),
        }
    }
}
