pub mod auth;
pub mod rate_limit;

pub use auth::{auth_and_rbac, authenticate, authorize, AuthContext};
pub use rate_limit::rate_limit_layer;
