//! Identity & role oracle: maps a user id to a display name and role.
//!
//! Credential storage lives outside the server. The [`Directory`] built from
//! the configuration file is the stock implementation; anything else can be
//! plugged in through [`RoleOracle`].

mod directory;

use std::time::Duration;

use async_trait::async_trait;

pub use directory::{Credential, Directory};

use crate::error::{Error, Result};
use crate::types::Identity;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait RoleOracle: Send + Sync {
    /// Returns `Ok(None)` for an unknown user and `Err(Unavailable)` when the
    /// oracle cannot answer.
    async fn resolve_user(&self, user_id: &str) -> Result<Option<Identity>>;
}

/// Resolves a user, failing with `Unavailable` once `timeout` elapses.
///
/// A timed-out lookup never falls back to a default role.
pub async fn resolve(
    oracle: &dyn RoleOracle,
    user_id: &str,
    timeout: Duration,
) -> Result<Identity> {
    match tokio::time::timeout(timeout, oracle.resolve_user(user_id)).await {
        Ok(Ok(Some(identity))) => Ok(identity),
        Ok(Ok(None)) => Err(Error::not_found(format!("user {user_id}"))),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            tracing::warn!("Role lookup for {user_id} timed out after {timeout:?}");
            Err(Error::Unavailable("role oracle timed out".into()))
        }
    }
}
