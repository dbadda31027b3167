use async_trait::async_trait;
use dashmap::DashMap;

use super::RoleOracle;
use crate::config::UserEntry;
use crate::error::Result;
use crate::types::{Identity, Role};

/// Hashed bearer token belonging to one user.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user_id: String,
    pub token_lookup: String,
    pub token_hash: String,
}

/// In-memory user directory loaded from the `[[users]]` table.
#[derive(Debug, Default)]
pub struct Directory {
    users: DashMap<String, Identity>,
    credentials: DashMap<String, Credential>,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: &[UserEntry]) -> Self {
        let dir = Self::new();
        for entry in entries {
            dir.insert_user(&entry.id, &entry.display_name, entry.role);
            if let (Some(lookup), Some(hash)) = (&entry.token_lookup, &entry.token_hash) {
                dir.insert_credential(Credential {
                    user_id: entry.id.clone(),
                    token_lookup: lookup.clone(),
                    token_hash: hash.clone(),
                });
            }
        }
        dir
    }

    pub fn insert_user(&self, id: &str, display_name: &str, role: Role) {
        self.users.insert(
            id.to_string(),
            Identity {
                id: id.to_string(),
                display_name: display_name.to_string(),
                role,
            },
        );
    }

    pub fn insert_credential(&self, credential: Credential) {
        self.credentials
            .insert(credential.token_lookup.clone(), credential);
    }

    #[must_use]
    pub fn credential_by_lookup(&self, lookup: &str) -> Option<Credential> {
        self.credentials.get(lookup).map(|c| c.clone())
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl RoleOracle for Directory {
    async fn resolve_user(&self, user_id: &str) -> Result<Option<Identity>> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }
}
