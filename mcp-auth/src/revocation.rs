use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Append-mostly revocation store: token-level entries with an expiry,
/// plus a per-user cutoff timestamp. Reads are lock-free `DashMap`
/// snapshots.
#[derive(Default)]
pub struct RevocationStore {
    blacklist: DashMap<String, i64>,
    user_cutoffs: DashMap<String, i64>,
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

impl RevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blacklist one token by its hash until `expires_at` (unix seconds).
    pub fn revoke_token(&self, token: &str, expires_at: i64) {
        self.blacklist.insert(hash_token(token), expires_at);
    }

    /// Reject every token issued before `cutoff` (unix seconds) for `user_id`.
    pub fn revoke_all_for_user(&self, user_id: &str, cutoff: i64) {
        self.user_cutoffs
            .entry(user_id.to_string())
            .and_modify(|c| *c = (*c).max(cutoff))
            .or_insert(cutoff);
    }

    pub fn is_token_revoked(&self, token: &str) -> bool {
        let hash = hash_token(token);
        match self.blacklist.get(&hash) {
            Some(expires_at) => now_epoch() < *expires_at,
            None => false,
        }
    }

    pub fn is_before_user_cutoff(&self, user_id: &str, issued_at: i64) -> bool {
        self.user_cutoffs
            .get(user_id)
            .map(|cutoff| issued_at < *cutoff)
            .unwrap_or(false)
    }

    /// Periodic sweep removing blacklist rows past `expires_at`.
    pub fn sweep_expired(&self) {
        let now = now_epoch();
        self.blacklist.retain(|_, expires_at| *expires_at > now);
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_token_is_flagged_until_expiry() {
        let store = RevocationStore::new();
        assert!(!store.is_token_revoked("t1"));
        store.revoke_token("t1", now_epoch() + 60);
        assert!(store.is_token_revoked("t1"));
    }

    #[test]
    fn user_cutoff_rejects_older_iat() {
        let store = RevocationStore::new();
        let now = now_epoch();
        store.revoke_all_for_user("u1", now);
        assert!(store.is_before_user_cutoff("u1", now - 10));
        assert!(!store.is_before_user_cutoff("u1", now + 10));
    }

    #[test]
    fn sweep_drops_past_expiry_rows() {
        let store = RevocationStore::new();
        store.revoke_token("t1", now_epoch() - 1);
        store.sweep_expired();
        assert_eq!(store.blacklist_len(), 0);
    }
}
