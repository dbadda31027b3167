use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::{DEFAULT_ACTIVITY_CAPACITY, DEFAULT_EDIT_CAPACITY};
use crate::identity::DEFAULT_LOOKUP_TIMEOUT;

/// What an approval does when the project content moved on after the
/// proposal was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Apply the proposed content anyway; the last approval wins.
    #[default]
    Overwrite,
    /// Refuse the approval with `Conflict` and leave the change pending.
    Conflict,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single role-oracle lookup.
    pub lookup_timeout: Duration,
    /// Presence entries idle for longer than this are evicted.
    pub presence_idle_timeout: Duration,
    pub presence_sweep_interval: Duration,
    pub edit_history_capacity: usize,
    pub activity_history_capacity: usize,
    pub stale_policy: StalePolicy,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            presence_idle_timeout: Duration::from_secs(20),
            presence_sweep_interval: Duration::from_secs(5),
            edit_history_capacity: DEFAULT_EDIT_CAPACITY,
            activity_history_capacity: DEFAULT_ACTIVITY_CAPACITY,
            stale_policy: StalePolicy::Overwrite,
        }
    }
}
