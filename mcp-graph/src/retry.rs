//! Exponential backoff and the retryable/non-retryable error split.

use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const BASE: Duration = Duration::from_secs(2);
const CAP: Duration = Duration::from_secs(10);

/// `base * 2^attempt`, capped, with up to 20% jitter so a thundering herd of
/// retries doesn't resynchronize.
pub fn backoff_for(attempt: u32) -> Duration {
    let exp = BASE.saturating_mul(1u32 << attempt.min(8));
    let capped = exp.min(CAP);
    let jitter_frac: f64 = rand::random::<f64>() * 0.2;
    capped.mul_f64(1.0 - jitter_frac)
}

pub fn max_attempts() -> u32 {
    MAX_ATTEMPTS
}

/// Transient driver errors worth retrying; validation, constraint,
/// authentication, and syntax errors are not.
pub fn is_retryable(err: &neo4rs::Error) -> bool {
    let text = err.to_string().to_lowercase();
    let non_retryable_markers = [
        "constraint",
        "syntax",
        "authentication",
        "unauthorized",
        "invalid",
    ];
    if non_retryable_markers.iter().any(|m| text.contains(m)) {
        return false;
    }
    let retryable_markers = ["unavailable", "session expired", "connection", "timed out", "timeout"];
    retryable_markers.iter().any(|m| text.contains(m))
}

/// Runs `attempt` up to [`max_attempts`] times, sleeping with [`backoff_for`]
/// between retryable failures.
pub async fn with_retry<F, Fut, T>(mut attempt: F) -> Result<T, neo4rs::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, neo4rs::Error>>,
{
    let mut last_err = None;
    for n in 0..max_attempts() {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) || n + 1 == max_attempts() {
                    return Err(err);
                }
                tracing::warn!(attempt = n, error = %err, "retrying graph operation");
                tokio::time::sleep(backoff_for(n)).await;
                last_err = Some(err);
            }
        }
    }
    Err(last_err.expect("loop always runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        for attempt in 0..10 {
            assert!(backoff_for(attempt) <= CAP);
        }
    }
}
