use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// `Role ∈ {viewer, developer, admin}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Developer,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Viewer => "viewer",
            Role::Developer => "developer",
            Role::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "developer" => Ok(Role::Developer),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// `Resource ∈ {tools, graph, system}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Tools,
    Graph,
    System,
}

/// `Action ∈ {read, lint, execute, test, generate, query, upsert, delete, admin}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Lint,
    Execute,
    Test,
    Generate,
    Query,
    Upsert,
    Delete,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission(pub Resource, pub Action);

impl Permission {
    pub const TOOLS_READ: Permission = Permission(Resource::Tools, Action::Read);
    pub const TOOLS_LINT: Permission = Permission(Resource::Tools, Action::Lint);
    pub const TOOLS_EXECUTE: Permission = Permission(Resource::Tools, Action::Execute);
    pub const TOOLS_TEST: Permission = Permission(Resource::Tools, Action::Test);
    pub const TOOLS_GENERATE: Permission = Permission(Resource::Tools, Action::Generate);
    pub const GRAPH_QUERY: Permission = Permission(Resource::Graph, Action::Query);
    pub const GRAPH_UPSERT: Permission = Permission(Resource::Graph, Action::Upsert);
    pub const SYSTEM_ADMIN: Permission = Permission(Resource::System, Action::Admin);
}

/// Literal, totally-enumerated permission table: higher roles are a strict
/// superset of lower roles.
const VIEWER_PERMS: &[Permission] = &[Permission::TOOLS_READ, Permission::TOOLS_LINT, Permission::GRAPH_QUERY];

const DEVELOPER_EXTRA: &[Permission] = &[
    Permission::TOOLS_EXECUTE,
    Permission::TOOLS_TEST,
    Permission::TOOLS_GENERATE,
];

const ADMIN_EXTRA: &[Permission] = &[Permission::GRAPH_UPSERT, Permission::SYSTEM_ADMIN];

fn permissions_for(role: Role) -> Vec<Permission> {
    match role {
        Role::Viewer => VIEWER_PERMS.to_vec(),
        Role::Developer => VIEWER_PERMS.iter().chain(DEVELOPER_EXTRA).copied().collect(),
        Role::Admin => VIEWER_PERMS
            .iter()
            .chain(DEVELOPER_EXTRA)
            .chain(ADMIN_EXTRA)
            .copied()
            .collect(),
    }
}

/// `(roles, permission) -> allow/deny`: true iff the union of permissions
/// across `roles` contains `permission`.
pub fn allow(roles: &[Role], permission: Permission) -> bool {
    roles.iter().any(|r| permissions_for(*r).contains(&permission))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_spec_matrix() {
        assert!(allow(&[Role::Viewer], Permission::TOOLS_READ));
        assert!(allow(&[Role::Viewer], Permission::TOOLS_LINT));
        assert!(!allow(&[Role::Viewer], Permission::TOOLS_EXECUTE));
        assert!(!allow(&[Role::Viewer], Permission::GRAPH_UPSERT));

        assert!(allow(&[Role::Developer], Permission::TOOLS_EXECUTE));
        assert!(allow(&[Role::Developer], Permission::TOOLS_TEST));
        assert!(allow(&[Role::Developer], Permission::TOOLS_GENERATE));
        assert!(!allow(&[Role::Developer], Permission::GRAPH_UPSERT));
        assert!(!allow(&[Role::Developer], Permission::SYSTEM_ADMIN));

        assert!(allow(&[Role::Admin], Permission::GRAPH_UPSERT));
        assert!(allow(&[Role::Admin], Permission::SYSTEM_ADMIN));
        assert!(allow(&[Role::Admin], Permission::TOOLS_EXECUTE));
    }

    #[test]
    fn higher_roles_are_strict_supersets() {
        for p in permissions_for(Role::Viewer) {
            assert!(permissions_for(Role::Developer).contains(&p));
        }
        for p in permissions_for(Role::Developer) {
            assert!(permissions_for(Role::Admin).contains(&p));
        }
    }

    #[test]
    fn multiple_roles_union() {
        assert!(allow(&[Role::Viewer, Role::Admin], Permission::GRAPH_UPSERT));
    }
}
