//! Same-credential retry loop with cancellable backoff.

use std::future::Future;

use super::classify::classify;
use super::error::ClientError;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::RunControl;

/// Why a retried call gave up.
#[derive(Debug)]
pub enum RetryFailure {
    /// Retryable errors on every attempt; `last` is the final one.
    Exhausted { attempts: u32, last: ClientError },
    /// Error that is not retried (provider rejection, 4xx, malformed response).
    Fatal(ClientError),
    /// The run was cancelled during a backoff delay.
    Cancelled,
}

impl RetryFailure {
    /// Give-up outcome for `err` after `attempts` tries.
    pub fn give_up(attempts: u32, err: ClientError) -> Self {
        if classify(&err).is_retryable() {
            RetryFailure::Exhausted {
                attempts,
                last: err,
            }
        } else {
            RetryFailure::Fatal(err)
        }
    }
}

/// Repeat `call` with the same credential until it succeeds or the policy gives up.
///
/// Used for polling, which is bound to the credential that submitted. A
/// throttled answer here has no pool to go back to, so it backs off like a
/// transient error.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    control: &RunControl,
    mut call: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 1u32;
    loop {
        let err = match call().await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let delay = match policy.decide(attempt, classify(&err)) {
            RetryDecision::GiveUp => return Err(RetryFailure::give_up(attempt, err)),
            RetryDecision::Backoff(delay) => delay,
            RetryDecision::NextCredential => policy.backoff(attempt),
        };
        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "provider call failed, retrying"
        );
        if !control.sleep(delay).await {
            return Err(RetryFailure::Cancelled);
        }
        attempt += 1;
    }
}
