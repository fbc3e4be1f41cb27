use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::revocation::RevocationStore;
use crate::role::Role;

pub const ISSUER: &str = "ultimate-mcp";

/// Signed, self-describing credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Verified claims with roles already parsed, handed to the RBAC layer.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub subject: String,
    pub roles: Vec<Role>,
    pub issued_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token expired")]
    Expired,
    #[error("wrong issuer")]
    WrongIssuer,
    #[error("token carries no roles")]
    EmptyRoles,
    #[error("token has been revoked")]
    Revoked,
}

/// Issues and verifies HS256 bearer tokens.
///
/// Verification never downgrades a failure into an implicit role — every
/// error variant means "grant nothing".
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    revocation: Arc<RevocationStore>,
}

impl TokenService {
    pub fn new(signing_key: &[u8], revocation: Arc<RevocationStore>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            algorithm: Algorithm::HS256,
            revocation,
        }
    }

    pub fn issue(&self, user_id: &str, roles: &[Role], ttl: Duration) -> Result<String, TokenError> {
        let now = now_epoch();
        let claims = Claims {
            sub: user_id.to_string(),
            roles: roles.iter().map(ToString::to_string).collect(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            iss: ISSUER.to_string(),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Malformed(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        if self.revocation.is_token_revoked(token) {
            return Err(TokenError::Revoked);
        }

        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind::*;
            match e.kind() {
                ExpiredSignature => TokenError::Expired,
                InvalidIssuer => TokenError::WrongIssuer,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;
        let claims = data.claims;

        if claims.iss != ISSUER {
            return Err(TokenError::WrongIssuer);
        }
        if claims.roles.is_empty() {
            return Err(TokenError::EmptyRoles);
        }
        if self
            .revocation
            .is_before_user_cutoff(&claims.sub, claims.iat)
        {
            return Err(TokenError::Revoked);
        }

        let roles: Vec<Role> = claims
            .roles
            .iter()
            .filter_map(|r| r.parse().ok())
            .collect();
        if roles.is_empty() {
            return Err(TokenError::EmptyRoles);
        }

        Ok(VerifiedToken {
            subject: claims.sub,
            roles,
            issued_at: claims.iat,
        })
    }

    pub fn revoke(&self, token: &str, ttl_remaining: Duration) {
        let expires_at = now_epoch() + ttl_remaining.as_secs() as i64;
        self.revocation.revoke_token(token, expires_at);
    }

    pub fn revoke_all_for_user(&self, user_id: &str) {
        self.revocation.revoke_all_for_user(user_id, now_epoch());
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            b"this-is-a-sufficiently-random-32byte-key",
            Arc::new(RevocationStore::new()),
        )
    }

    #[test]
    fn issue_then_verify_round_trips() {
        let svc = service();
        let token = svc
            .issue("u1", &[Role::Developer], Duration::from_secs(3600))
            .unwrap();
        let verified = svc.verify(&token).unwrap();
        assert_eq!(verified.subject, "u1");
        assert_eq!(verified.roles, vec![Role::Developer]);
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        let token = svc
            .issue("u1", &[Role::Viewer], Duration::from_secs(0))
            .unwrap();
        std::thread::sleep(Duration::from_secs(1));
        assert!(matches!(svc.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn revoked_token_is_rejected() {
        let svc = service();
        let token = svc
            .issue("u1", &[Role::Viewer], Duration::from_secs(3600))
            .unwrap();
        svc.revoke(&token, Duration::from_secs(3600));
        assert!(matches!(svc.verify(&token), Err(TokenError::Revoked)));
    }

    #[test]
    fn user_wide_revocation_rejects_previously_issued_tokens() {
        let svc = service();
        let token = svc
            .issue("u1", &[Role::Viewer], Duration::from_secs(3600))
            .unwrap();
        std::thread::sleep(Duration::from_secs(1));
        svc.revoke_all_for_user("u1");
        assert!(matches!(svc.verify(&token), Err(TokenError::Revoked)));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let svc = service();
        let token = svc
            .issue("u1", &[Role::Viewer], Duration::from_secs(3600))
            .unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(svc.verify(&tampered).is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let svc = service();
        let token = svc
            .issue("u1", &[Role::Viewer], Duration::from_secs(3600))
            .unwrap();
        let other = TokenService::new(b"a-completely-different-32byte-key", Arc::new(RevocationStore::new()));
        assert!(other.verify(&token).is_err());
    }
}
