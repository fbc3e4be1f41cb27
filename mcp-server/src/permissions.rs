//! Maps a protected route to the single [`Permission`] it requires.
//! `/lint_code` and `/graph_query` are deliberately absent: both are public
//! routes that never reach the authentication/authorization stage in the
//! first place (see `middleware::auth`).

use mcp_auth::role::Permission;

pub fn permission_for_path(path: &str) -> Option<Permission> {
    match path {
        "/execute_code" => Some(Permission::TOOLS_EXECUTE),
        "/run_tests" => Some(Permission::TOOLS_TEST),
        "/generate_code" => Some(Permission::TOOLS_GENERATE),
        "/graph_upsert" => Some(Permission::GRAPH_UPSERT),
        "/auth/revoke" | "/auth/revoke_all" => Some(Permission::SYSTEM_ADMIN),
        _ => None,
    }
}
