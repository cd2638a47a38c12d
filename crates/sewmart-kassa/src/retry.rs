//! Retry with exponential back-off and jitter for gateway calls.
//!
//! Mutating calls reuse one `Idempotence-Key` across attempts, so a
//! retried `create_payment` cannot create a second payment.

use std::future::Future;
use std::time::Duration;

use crate::error::KassaError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
pub(crate) fn is_retriable(err: &KassaError) -> bool {
    match err {
        KassaError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        KassaError::UnexpectedStatus { status, .. } => *status >= 500,
        KassaError::Deserialize { .. }
        | KassaError::Unauthorized
        | KassaError::Api { .. }
        | KassaError::PaymentNotFound(_) => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// The sleep before the n-th retry is `backoff_base_ms * 2^(n-1)` with
/// ±25% jitter, capped at 60s. Non-retriable errors are returned
/// immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, KassaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, KassaError>>,
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
                    "transient payment gateway error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retriable() {
        assert!(is_retriable(&KassaError::UnexpectedStatus {
            status: 502,
            url: "https://example".to_owned()
        }));
        assert!(!is_retriable(&KassaError::UnexpectedStatus {
            status: 400,
            url: "https://example".to_owned()
        }));
    }

    #[test]
    fn gateway_and_auth_errors_are_not_retriable() {
        assert!(!is_retriable(&KassaError::Unauthorized));
        assert!(!is_retriable(&KassaError::Api {
            code: "invalid_request".to_owned(),
            description: "amount too small".to_owned()
        }));
        assert!(!is_retriable(&KassaError::PaymentNotFound("gone".to_owned())));
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mut calls = 0u32;
        let result: Result<(), _> = retry_with_backoff(2, 0, || {
            calls += 1;
            let status = KassaError::UnexpectedStatus {
                status: 503,
                url: "https://example".to_owned(),
            };
            async move { Err(status) }
        })
        .await;
        assert!(result.is_err());
        // Initial attempt + 2 retries.
        assert_eq!(calls, 3);
    }
}
