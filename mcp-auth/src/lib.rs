//! Token issuance/verification/revocation and RBAC.

pub mod revocation;
pub mod role;
pub mod token;

pub use revocation::RevocationStore;
pub use role::{allow, Action, Permission, Resource, Role};
pub use token::{Claims, TokenError, TokenService, VerifiedToken, ISSUER};
