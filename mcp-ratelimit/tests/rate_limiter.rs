use mcp_ratelimit::{limiter_key, Limits, RateLimiter};

#[test]
fn admits_up_to_burst_then_rejects() {
    let limiter = RateLimiter::new(Limits {
        per_minute: 1000,
        per_hour: 1000,
        per_day: 1000,
        burst: 3,
    });
    let key = limiter_key(Some("u1"), "127.0.0.1");
    for _ in 0..3 {
        assert!(limiter.charge(&key, &[]).is_ok());
    }
    let err = limiter.charge(&key, &[]).unwrap_err();
    assert!(err.retry_after_secs >= 1);
}

#[test]
fn per_key_isolation() {
    let limiter = RateLimiter::new(Limits {
        per_minute: 1000,
        per_hour: 1000,
        per_day: 1000,
        burst: 1,
    });
    assert!(limiter.charge("a", &[]).is_ok());
    assert!(limiter.charge("a", &[]).is_err());
    assert!(limiter.charge("b", &[]).is_ok());
}

#[test]
fn role_override_grants_higher_limit() {
    let limiter = RateLimiter::new(Limits {
        per_minute: 1000,
        per_hour: 1000,
        per_day: 1000,
        burst: 1,
    });
    limiter.set_role_override(
        "admin",
        Limits {
            per_minute: 1000,
            per_hour: 1000,
            per_day: 1000,
            burst: 5,
        },
    );
    let roles = vec!["admin".to_string()];
    for _ in 0..5 {
        assert!(limiter.charge("admin-user", &roles).is_ok());
    }
    assert!(limiter.charge("admin-user", &roles).is_err());
}

#[test]
fn ip_fallback_key_used_when_unauthenticated() {
    assert_eq!(limiter_key(None, "10.0.0.1"), "ip:10.0.0.1");
    assert_eq!(limiter_key(Some("u1"), "10.0.0.1"), "user:u1");
}
