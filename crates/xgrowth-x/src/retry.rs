//! Retry with exponential back-off and jitter for the X API client.
//!
//! Only transient failures are retried. A 429 is never retried here: the
//! caller decides whether to abort its batch.

use std::future::Future;
use std::time::Duration;

use crate::error::XError;

/// Returns `true` for network failures and 5xx responses.
pub(crate) fn is_retriable(err: &XError) -> bool {
    match err {
        XError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        XError::UnexpectedStatus { status, .. } => *status >= 500,
        XError::Deserialize { .. }
        | XError::RateLimited { .. }
        | XError::NotFound { .. }
        | XError::Unauthorized { .. }
        | XError::StillFollowing { .. }
        | XError::InvalidBaseUrl { .. }
        | XError::MissingCredentials(_) => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient
/// errors. The delay doubles per attempt from `backoff_base_ms`, gets ±25 %
/// jitter, and is capped at 60 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, XError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, XError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "X API transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn server_error() -> XError {
        XError::UnexpectedStatus {
            status: 503,
            url: "https://api.twitter.com/2/users/1/tweets".to_owned(),
        }
    }

    #[test]
    fn rate_limit_is_not_retriable() {
        assert!(!is_retriable(&XError::RateLimited { reset_at: None }));
    }

    #[test]
    fn not_found_and_unauthorized_are_not_retriable() {
        assert!(!is_retriable(&XError::NotFound {
            resource: "user 1".to_owned(),
            rate_limit_remaining: None,
        }));
        assert!(!is_retriable(&XError::Unauthorized {
            resource: "user 1".to_owned(),
        }));
    }

    #[test]
    fn server_errors_are_retriable() {
        assert!(is_retriable(&server_error()));
        assert!(!is_retriable(&XError::UnexpectedStatus {
            status: 400,
            url: "u".to_owned(),
        }));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(server_error())
                } else {
                    Ok(7_u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(server_error())
            }
        })
        .await;
        assert!(matches!(result, Err(XError::UnexpectedStatus { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(XError::RateLimited { reset_at: None })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "429 must not be retried");
        assert!(matches!(result, Err(XError::RateLimited { .. })));
    }
}
