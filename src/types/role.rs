use std::fmt;

use serde::{Deserialize, Serialize};

/// Global permission tier resolved by the identity oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

/// How an actor relates to one particular project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Outsider,
    Member,
    Owner,
}

/// Something an actor may attempt on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Propose,
    CommitDirect,
    Review,
    ManageMembers,
    CreateProject,
}

impl Role {
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Capability table. Touching content always needs membership; privileged
    /// roles add commit rights inside a project and review, member management,
    /// and project creation everywhere.
    #[must_use]
    pub const fn allows(self, relation: Relation, capability: Capability) -> bool {
        match (relation, capability) {
            (_, Capability::CreateProject) => self.is_privileged(),
            (Relation::Outsider, Capability::Review | Capability::ManageMembers) => {
                self.is_privileged()
            }
            (Relation::Outsider, _) => false,
            (Relation::Owner, _) => true,
            (Relation::Member, Capability::View | Capability::Propose) => true,
            (Relation::Member, _) => self.is_privileged(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::View => "view",
            Capability::Propose => "propose",
            Capability::CommitDirect => "commit",
            Capability::Review => "review",
            Capability::ManageMembers => "manage members",
            Capability::CreateProject => "create projects",
        };
        f.write_str(name)
    }
}
