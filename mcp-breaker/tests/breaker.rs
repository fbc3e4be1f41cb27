use std::time::Duration;

use mcp_breaker::{BreakerConfig, BreakerState, CircuitBreaker};

fn config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        success_threshold: 2,
        open_timeout: Duration::from_millis(50),
        half_open_max: 1,
    }
}

#[test]
fn opens_after_threshold_consecutive_failures() {
    let breaker = CircuitBreaker::new("db", config());
    for _ in 0..3 {
        let permit = breaker.try_acquire().unwrap();
        breaker.record_failure(permit);
    }
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(breaker.try_acquire().is_err());
}

#[test]
fn single_success_in_half_open_does_not_close_when_threshold_is_two() {
    let breaker = CircuitBreaker::new("db", config());
    for _ in 0..3 {
        let permit = breaker.try_acquire().unwrap();
        breaker.record_failure(permit);
    }
    std::thread::sleep(Duration::from_millis(60));
    let permit = breaker.try_acquire().expect("probe admitted after timeout");
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
    breaker.record_success(permit);
    assert_eq!(breaker.state(), BreakerState::HalfOpen);

    let permit = breaker.try_acquire().unwrap();
    breaker.record_success(permit);
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn failure_in_half_open_reopens_immediately() {
    let breaker = CircuitBreaker::new("db", config());
    for _ in 0..3 {
        let permit = breaker.try_acquire().unwrap();
        breaker.record_failure(permit);
    }
    std::thread::sleep(Duration::from_millis(60));
    let permit = breaker.try_acquire().unwrap();
    breaker.record_failure(permit);
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[tokio::test]
async fn call_excludes_validation_errors_from_tripping() {
    let breaker = CircuitBreaker::new("db", config());
    for _ in 0..5 {
        let result: Result<(), mcp_breaker::BreakerCallError<&str>> = breaker
            .call(|_: &&str| false, || async { Err("validation failed") })
            .await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state(), BreakerState::Closed);
}
